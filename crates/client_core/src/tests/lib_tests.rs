use super::*;
use crate::test_support::{context, display, org};
use shared::domain::View;
use storage::{MemorySessionStore, WriteOp};

#[tokio::test]
async fn write_reports_success_and_records_patch() {
    let store = Arc::new(MemorySessionStore::new());
    let ctx = context("Anna", &store);
    let patch = SessionPatch {
        view: Some(View::Menu),
        ..SessionPatch::default()
    };

    assert!(ctx.write(&display(), patch.clone(), "test").await);
    assert_eq!(store.writes_for(&display()).await, vec![WriteOp::Patch(patch)]);
    assert_eq!(ctx.organization_id, org());
}

#[tokio::test]
async fn write_swallows_store_failures() {
    let store = Arc::new(MemorySessionStore::new());
    store.set_unavailable(true);
    let ctx = context("Anna", &store);

    let written = ctx
        .write(&display(), SessionPatch::default(), "test")
        .await;
    assert!(!written);
    assert!(store.write_log().await.is_empty());
}
