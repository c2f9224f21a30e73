//! Stored document shapes and the derived-metadata estimators. Field names
//! mirror the persisted camelCase documents; ids are ulids minted client-side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ulid::Ulid;

use crate::store::{ContentStore, Filter};

/// Collection names in the content store.
pub const POSTS: &str = "posts";
pub const SERIES: &str = "series";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub series_order: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Canonical display order of member posts.
    #[serde(default)]
    pub post_ids: Vec<String>,
    /// Cached count; equals `post_ids.len()` after every successful commit.
    #[serde(default)]
    pub post_count: u32,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub order: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Series {
    /// A fresh, empty series draft.
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_document_id(),
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            cover_image: None,
            post_ids: Vec::new(),
            post_count: 0,
            is_public: false,
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn new_document_id() -> String {
    Ulid::new().to_string()
}

// ============================================================================
// Derived metadata
// ============================================================================

const WORDS_PER_MINUTE: usize = 200;

pub fn word_count(markdown: &str) -> usize {
    markdown
        .split_whitespace()
        .filter(|token| !token.chars().all(|ch| "#>*-`~!()[]".contains(ch)))
        .count()
}

/// Reading time in whole minutes, never less than one.
pub fn reading_time_minutes(markdown: &str) -> u32 {
    let words = word_count(markdown);
    (words.div_ceil(WORDS_PER_MINUTE)).max(1) as u32
}

/// Score candidates against `target`: shared tags weigh 2, membership in the
/// same series 3, shared title words 1. Unpublished posts and the post itself
/// never qualify; ties break towards the more recent publish date.
pub fn related_posts<'a>(target: &Post, candidates: &'a [Post], limit: usize) -> Vec<&'a Post> {
    let target_tags: Vec<String> = target.tags.iter().map(|tag| tag.to_lowercase()).collect();
    let target_title = title_words(&target.title);

    let mut scored: Vec<(u32, &Post)> = candidates
        .iter()
        .filter(|candidate| candidate.id != target.id && candidate.published)
        .filter_map(|candidate| {
            let mut score = 0;
            for tag in &candidate.tags {
                if target_tags.contains(&tag.to_lowercase()) {
                    score += 2;
                }
            }
            if target.series_id.is_some() && candidate.series_id == target.series_id {
                score += 3;
            }
            for word in title_words(&candidate.title) {
                if target_title.contains(&word) {
                    score += 1;
                }
            }
            (score > 0).then_some((score, candidate))
        })
        .collect();

    scored.sort_by(|(score_a, post_a), (score_b, post_b)| {
        score_b
            .cmp(score_a)
            .then_with(|| post_b.published_at.cmp(&post_a.published_at))
    });
    scored.into_iter().take(limit).map(|(_, post)| post).collect()
}

/// Fetch the published candidates and score them. A failed read degrades to
/// an empty list rather than blocking the page that wanted suggestions.
pub async fn related_posts_from_store(
    store: &dyn ContentStore,
    target: &Post,
    limit: usize,
) -> Vec<Post> {
    let docs = match store
        .query(POSTS, &[Filter::eq("published", true)], None, None)
        .await
    {
        Ok(docs) => docs,
        Err(err) => {
            warn!(error = %err, "related-post lookup failed");
            return Vec::new();
        }
    };
    let candidates: Vec<Post> = docs
        .into_iter()
        .filter_map(|doc| serde_json::from_value(doc).ok())
        .collect();
    related_posts(target, &candidates, limit)
        .into_iter()
        .cloned()
        .collect()
}

fn title_words(title: &str) -> Vec<String> {
    title
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|ch: char| !ch.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.chars().count() > 3)
        .collect()
}
