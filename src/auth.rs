//! Identity contract and the site's entire authorization model: exactly one
//! allow-listed email is the admin. Any other authenticated identity is
//! signed out on the spot — there are no roles and no per-resource ACLs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("sign-in failed: {0}")]
    SignIn(String),

    #[error("this account is not authorized to manage the site")]
    NotAuthorized,
}

/// The authentication capability consumed by the core; the concrete provider
/// lives outside this crate.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_identity(&self) -> Option<Identity>;
    async fn sign_in(&self) -> Result<Identity, AuthError>;
    async fn sign_out(&self);
}

pub struct AdminPolicy {
    admin_email: String,
}

impl AdminPolicy {
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into(),
        }
    }

    pub fn is_admin(&self, identity: &Identity) -> bool {
        identity.email.eq_ignore_ascii_case(&self.admin_email)
    }

    /// Run the provider's sign-in and enforce the allow-list: a non-admin
    /// identity is signed out immediately and rejected.
    pub async fn sign_in_admin(
        &self,
        provider: &dyn AuthProvider,
    ) -> Result<Identity, AuthError> {
        let identity = provider.sign_in().await?;
        if self.is_admin(&identity) {
            return Ok(identity);
        }
        warn!(email = %identity.email, "rejected non-admin sign-in");
        provider.sign_out().await;
        Err(AuthError::NotAuthorized)
    }

    /// The identity to render an admin-guarded view for, if any. A non-admin
    /// session yields `None`; the guard never exposes partial admin state.
    pub async fn current_admin(&self, provider: &dyn AuthProvider) -> Option<Identity> {
        let identity = provider.current_identity().await?;
        self.is_admin(&identity).then_some(identity)
    }
}
