use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use super::{delete_series, SeriesEditor, SeriesError};
use crate::content::{Post, Series, POSTS, SERIES};
use crate::store::{
    BatchOp, ContentStore, Filter, MemoryStore, OrderBy, Result as StoreResult, StoreError,
};

fn post(id: &str, published_month: u32) -> Post {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Post {
        id: id.into(),
        title: format!("Post {id}"),
        slug: id.into(),
        body: String::new(),
        tags: Vec::new(),
        published: true,
        published_at: Utc.with_ymd_and_hms(2024, published_month, 1, 12, 0, 0).single(),
        cover_image: None,
        series_id: None,
        series_order: None,
        created_at: at,
        updated_at: at,
    }
}

fn seed_post(store: &MemoryStore, post: &Post) {
    store.put(POSTS, &post.id, serde_json::to_value(post).unwrap());
}

fn seed_member(store: &MemoryStore, id: &str, series_id: &str, order: Option<u32>) {
    let mut member = post(id, 1);
    member.series_id = Some(series_id.into());
    member.series_order = order;
    seed_post(store, &member);
}

async fn stored_post(store: &MemoryStore, id: &str) -> Post {
    let doc = store.get(POSTS, id).await.unwrap().unwrap();
    serde_json::from_value(doc).unwrap()
}

async fn stored_series(store: &MemoryStore, id: &str) -> Series {
    let doc = store.get(SERIES, id).await.unwrap().unwrap();
    serde_json::from_value(doc).unwrap()
}

/// The referential invariant: every post pointing at the series appears in
/// `postIds` exactly at `seriesOrder - 1`, and the cached count matches.
async fn assert_consistent(store: &MemoryStore, series_id: &str) {
    let series = stored_series(store, series_id).await;
    assert_eq!(series.post_count as usize, series.post_ids.len());

    let members = store
        .query(POSTS, &[Filter::eq("seriesId", series_id)], None, None)
        .await
        .unwrap();
    assert_eq!(members.len(), series.post_ids.len());
    for doc in members {
        let member: Post = serde_json::from_value(doc).unwrap();
        let order = member.series_order.expect("member has an order") as usize;
        assert_eq!(series.post_ids[order - 1], member.id);
    }
}

#[tokio::test]
async fn commit_writes_series_and_back_references_consistently() {
    let store = MemoryStore::new();
    for id in ["a", "b", "c"] {
        seed_post(&store, &post(id, 1));
    }

    let mut editor = SeriesEditor::create(&store).await.unwrap();
    editor.series_mut().name = "Learning Rust".into();
    editor.series_mut().slug = "learning-rust".into();
    assert_eq!(editor.add_members(&["a", "b"]), 2);
    editor.commit(&store).await.unwrap();

    let series_id = editor.series().id.clone();
    assert_consistent(&store, &series_id).await;

    let a = stored_post(&store, "a").await;
    assert_eq!(a.series_id.as_deref(), Some(series_id.as_str()));
    assert_eq!(a.series_order, Some(1));
    let c = stored_post(&store, "c").await;
    assert_eq!(c.series_id, None);
}

#[tokio::test]
async fn add_members_orders_by_publish_date_not_selection_order() {
    let store = MemoryStore::new();
    seed_post(&store, &post("march", 3));
    seed_post(&store, &post("january", 1));
    seed_post(&store, &post("february", 2));

    let mut editor = SeriesEditor::create(&store).await.unwrap();
    editor.add_members(&["march", "january", "february"]);

    let ids: Vec<&str> = editor.members().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["january", "february", "march"]);
}

#[tokio::test]
async fn add_members_is_idempotent() {
    let store = MemoryStore::new();
    seed_post(&store, &post("a", 1));

    let mut editor = SeriesEditor::create(&store).await.unwrap();
    assert_eq!(editor.add_members(&["a"]), 1);
    assert_eq!(editor.add_members(&["a"]), 0);
    assert_eq!(editor.add_members(&["a", "a"]), 0);
    assert_eq!(editor.members().len(), 1);
}

#[tokio::test]
async fn undated_candidates_sort_after_dated_ones() {
    let store = MemoryStore::new();
    let mut undated = post("undated", 1);
    undated.published_at = None;
    seed_post(&store, &undated);
    seed_post(&store, &post("dated", 6));

    let mut editor = SeriesEditor::create(&store).await.unwrap();
    editor.add_members(&["undated", "dated"]);
    let ids: Vec<&str> = editor.members().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["dated", "undated"]);
}

#[tokio::test]
async fn load_sorts_members_by_stored_order_with_missing_last() {
    let store = MemoryStore::new();
    seed_member(&store, "second", "s1", Some(2));
    seed_member(&store, "first", "s1", Some(1));
    seed_member(&store, "unordered", "s1", None);
    seed_post(&store, &post("outsider", 1));

    let mut series = Series::new("Essays", "essays");
    series.id = "s1".into();
    store.put(SERIES, "s1", serde_json::to_value(&series).unwrap());

    let editor = SeriesEditor::load(&store, "s1").await.unwrap();
    let ids: Vec<&str> = editor.members().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["first", "second", "unordered"]);
    assert_eq!(editor.catalog().len(), 4);
}

#[tokio::test]
async fn removing_a_member_clears_its_back_reference_on_commit() {
    let store = MemoryStore::new();
    seed_member(&store, "keep", "s1", Some(1));
    seed_member(&store, "drop", "s1", Some(2));
    let mut series = Series::new("Essays", "essays");
    series.id = "s1".into();
    store.put(SERIES, "s1", serde_json::to_value(&series).unwrap());

    let mut editor = SeriesEditor::load(&store, "s1").await.unwrap();
    assert!(editor.remove_member("drop"));
    editor.commit(&store).await.unwrap();

    let dropped = stored_post(&store, "drop").await;
    assert_eq!(dropped.series_id, None);
    assert_eq!(dropped.series_order, None);
    assert_consistent(&store, "s1").await;
}

#[tokio::test]
async fn reorder_then_commit_produces_dense_one_based_order() {
    let store = MemoryStore::new();
    for id in ["a", "b", "c"] {
        seed_member(&store, id, "s1", None);
    }
    let mut series = Series::new("Essays", "essays");
    series.id = "s1".into();
    store.put(SERIES, "s1", serde_json::to_value(&series).unwrap());

    let mut editor = SeriesEditor::load(&store, "s1").await.unwrap();
    editor.reorder(&["c", "a", "b"]);
    editor.commit(&store).await.unwrap();

    let series = stored_series(&store, "s1").await;
    assert_eq!(series.post_ids, ["c", "a", "b"]);
    assert_eq!(stored_post(&store, "c").await.series_order, Some(1));
    assert_eq!(stored_post(&store, "a").await.series_order, Some(2));
    assert_eq!(stored_post(&store, "b").await.series_order, Some(3));
    assert_consistent(&store, "s1").await;
}

#[tokio::test]
async fn commit_without_name_or_slug_is_rejected_before_any_write() {
    let store = MemoryStore::new();
    seed_post(&store, &post("a", 1));

    let mut editor = SeriesEditor::create(&store).await.unwrap();
    editor.add_members(&["a"]);
    let err = editor.commit(&store).await.unwrap_err();
    assert!(matches!(err, SeriesError::MissingName));

    editor.series_mut().name = "Named".into();
    let err = editor.commit(&store).await.unwrap_err();
    assert!(matches!(err, SeriesError::MissingSlug));

    assert_eq!(store.len(SERIES), 0);
    assert_eq!(stored_post(&store, "a").await.series_id, None);
}

#[tokio::test]
async fn delete_series_clears_members_and_removes_the_document() {
    let store = MemoryStore::new();
    seed_member(&store, "p1", "s1", Some(1));
    seed_member(&store, "p2", "s1", Some(2));
    let mut series = Series::new("Essays", "essays");
    series.id = "s1".into();
    store.put(SERIES, "s1", serde_json::to_value(&series).unwrap());

    delete_series(&store, "s1").await.unwrap();

    assert!(store.get(SERIES, "s1").await.unwrap().is_none());
    for id in ["p1", "p2"] {
        let cleared = stored_post(&store, id).await;
        assert_eq!(cleared.series_id, None);
        assert_eq!(cleared.series_order, None);
    }
    // The posts themselves survive.
    assert_eq!(store.len(POSTS), 2);
}

// ============================================================================
// Failure semantics
// ============================================================================

/// Store whose batches always fail, for exercising the retry contract.
struct FailingStore {
    inner: MemoryStore,
}

#[async_trait]
impl ContentStore for FailingStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.inner.get(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>> {
        self.inner.query(collection, filters, order_by, limit).await
    }

    async fn batch_write(&self, _ops: Vec<BatchOp>) -> StoreResult<()> {
        Err(StoreError::Backend("network unreachable".into()))
    }

    async fn upload_blob(&self, _: &str, _: &[u8], _: &str) -> StoreResult<String> {
        Err(StoreError::Backend("network unreachable".into()))
    }
}

#[tokio::test]
async fn failed_commit_leaves_the_draft_intact_for_retry() {
    let failing = FailingStore {
        inner: MemoryStore::new(),
    };
    seed_post(&failing.inner, &post("a", 1));

    let mut editor = SeriesEditor::create(&failing.inner).await.unwrap();
    editor.series_mut().name = "Essays".into();
    editor.series_mut().slug = "essays".into();
    editor.add_members(&["a"]);

    let err = editor.commit(&failing).await.unwrap_err();
    assert!(matches!(err, SeriesError::Store(StoreError::Backend(_))));

    // Draft unchanged: the member is still listed and still unsaved.
    assert_eq!(editor.members().len(), 1);
    assert_eq!(editor.members()[0].series_id, None);
    assert_eq!(editor.series().post_ids.len(), 0);

    // Retrying against a working store succeeds with the same draft.
    editor.commit(&failing.inner).await.unwrap();
    assert_consistent(&failing.inner, &editor.series().id.clone()).await;
}
