//! Series/post consistency. A series and its member posts are independent
//! documents, but every mutation here treats them as one aggregate: the
//! series' ordered `postIds` list and each member's back-reference fields are
//! rewritten together in a single atomic batch, so readers never observe one
//! side without the other.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::content::{Post, Series, POSTS, SERIES};
use crate::store::{BatchOp, ContentStore, Filter, StoreError};

#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("a series needs a name before it can be saved")]
    MissingName,

    #[error("a series needs a slug before it can be saved")]
    MissingSlug,

    #[error("series {0} not found")]
    NotFound(String),

    #[error("malformed document {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SeriesError>;

fn decode<T: DeserializeOwned>(doc: Value) -> Result<T> {
    let id = doc
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    serde_json::from_value(doc).map_err(|err| SeriesError::Decode {
        id,
        reason: err.to_string(),
    })
}

/// Draft edit state for one series. All list operations are local; nothing
/// touches the store until [`commit`](SeriesEditor::commit), which either
/// lands completely or not at all.
pub struct SeriesEditor {
    series: Series,
    members: Vec<Post>,
    /// Ids that were members when the draft was loaded; whoever drops out of
    /// the member list by commit time gets its back-reference cleared.
    baseline: Vec<String>,
    catalog: Vec<Post>,
}

impl SeriesEditor {
    /// Start a draft for a new series.
    pub async fn create(store: &dyn ContentStore) -> Result<Self> {
        let catalog = load_catalog(store).await?;
        Ok(Self {
            series: Series::new("", ""),
            members: Vec::new(),
            baseline: Vec::new(),
            catalog,
        })
    }

    /// Load an existing series for editing: the full post catalog is read
    /// once, members are filtered out of it and sorted by their stored order
    /// (missing order sorts last).
    pub async fn load(store: &dyn ContentStore, series_id: &str) -> Result<Self> {
        let catalog = load_catalog(store).await?;
        let doc = store
            .get(SERIES, series_id)
            .await?
            .ok_or_else(|| SeriesError::NotFound(series_id.to_string()))?;
        let series: Series = decode(doc)?;

        let mut members: Vec<Post> = catalog
            .iter()
            .filter(|post| post.series_id.as_deref() == Some(series_id))
            .cloned()
            .collect();
        members.sort_by_key(|post| post.series_order.unwrap_or(u32::MAX));
        let baseline = members.iter().map(|post| post.id.clone()).collect();

        Ok(Self {
            series,
            members,
            baseline,
            catalog,
        })
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Metadata fields (name, slug, description, visibility) are edited
    /// directly on the draft.
    pub fn series_mut(&mut self) -> &mut Series {
        &mut self.series
    }

    pub fn members(&self) -> &[Post] {
        &self.members
    }

    /// The unfiltered post catalog, for picking additional members.
    pub fn catalog(&self) -> &[Post] {
        &self.catalog
    }

    /// Append the given posts to the member list, ordered by their publish
    /// date ascending regardless of selection order; posts that are already
    /// members are skipped. Returns how many were added.
    pub fn add_members(&mut self, candidate_ids: &[&str]) -> usize {
        let mut additions: Vec<Post> = Vec::new();
        for id in candidate_ids {
            if self.members.iter().any(|member| member.id == *id) {
                continue;
            }
            if additions.iter().any(|addition| addition.id == *id) {
                continue;
            }
            if let Some(post) = self.catalog.iter().find(|post| post.id == *id) {
                additions.push(post.clone());
            }
        }
        additions.sort_by(|a, b| match (&a.published_at, &b.published_at) {
            (Some(left), Some(right)) => left.cmp(right),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        let added = additions.len();
        self.members.extend(additions);
        added
    }

    /// Apply a new ordering. The caller is trusted to pass a permutation of
    /// the current member ids; ids it omits keep their relative order at the
    /// end, unknown ids are ignored.
    pub fn reorder(&mut self, ordered_ids: &[&str]) {
        let mut rest = std::mem::take(&mut self.members);
        for id in ordered_ids {
            if let Some(position) = rest.iter().position(|post| post.id == *id) {
                self.members.push(rest.remove(position));
            }
        }
        self.members.append(&mut rest);
    }

    /// Drop a post from the draft member list. Storage is untouched until
    /// commit, where the post's back-reference gets cleared.
    pub fn remove_member(&mut self, post_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|post| post.id != post_id);
        before != self.members.len()
    }

    /// Write the draft: one atomic batch carrying the series upsert, a
    /// back-reference update for every current member (1-based dense order),
    /// and a clear for every post that was a member at load time but no
    /// longer is. On failure the draft is left untouched for retry.
    pub async fn commit(&mut self, store: &dyn ContentStore) -> Result<()> {
        if self.series.name.trim().is_empty() {
            return Err(SeriesError::MissingName);
        }
        if self.series.slug.trim().is_empty() {
            return Err(SeriesError::MissingSlug);
        }

        let mut series_doc = self.series.clone();
        series_doc.post_ids = self.members.iter().map(|post| post.id.clone()).collect();
        series_doc.post_count = self.members.len() as u32;
        series_doc.updated_at = Utc::now();

        let mut ops = vec![BatchOp::upsert(
            SERIES,
            series_doc.id.clone(),
            serde_json::to_value(&series_doc).map_err(StoreError::from)?,
        )];

        for (index, post) in self.members.iter().enumerate() {
            let mut fields = Map::new();
            fields.insert("seriesId".into(), json!(series_doc.id));
            fields.insert("seriesOrder".into(), json!(index as u32 + 1));
            ops.push(BatchOp::update(POSTS, post.id.clone(), fields));
        }

        for stale in self
            .baseline
            .iter()
            .filter(|id| !self.members.iter().any(|post| post.id == **id))
        {
            let mut fields = Map::new();
            fields.insert("seriesId".into(), Value::Null);
            fields.insert("seriesOrder".into(), Value::Null);
            ops.push(BatchOp::update(POSTS, stale.clone(), fields));
        }

        debug!(series = %series_doc.id, ops = ops.len(), "committing series batch");
        store.batch_write(ops).await?;

        // The batch landed; fold the written state back into the draft.
        for (index, post) in self.members.iter_mut().enumerate() {
            post.series_id = Some(series_doc.id.clone());
            post.series_order = Some(index as u32 + 1);
        }
        self.baseline = self.members.iter().map(|post| post.id.clone()).collect();
        self.series = series_doc;
        info!(series = %self.series.id, members = self.members.len(), "series saved");
        Ok(())
    }
}

/// Delete a series: clear the back-reference of every member post and remove
/// the series document, atomically. Posts themselves are never deleted here.
pub async fn delete_series(store: &dyn ContentStore, series_id: &str) -> Result<()> {
    let members = store
        .query(POSTS, &[Filter::eq("seriesId", series_id)], None, None)
        .await?;

    let mut ops = Vec::with_capacity(members.len() + 1);
    for doc in &members {
        let Some(post_id) = doc.get("id").and_then(Value::as_str) else {
            continue;
        };
        let mut fields = Map::new();
        fields.insert("seriesId".into(), Value::Null);
        fields.insert("seriesOrder".into(), Value::Null);
        ops.push(BatchOp::update(POSTS, post_id, fields));
    }
    ops.push(BatchOp::delete(SERIES, series_id));

    store.batch_write(ops).await?;
    info!(series = series_id, cleared = members.len(), "series deleted");
    Ok(())
}

async fn load_catalog(store: &dyn ContentStore) -> Result<Vec<Post>> {
    let docs = store.query(POSTS, &[], None, None).await?;
    docs.into_iter().map(decode).collect()
}

#[cfg(test)]
#[path = "series_tests.rs"]
mod series_tests;
