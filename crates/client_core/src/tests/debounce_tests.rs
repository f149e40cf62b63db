use super::*;

use crate::test_support::{context, display, DEBOUNCE};
use storage::{MemorySessionStore, WriteOp};

fn debouncer(store: &Arc<MemorySessionStore>) -> SettingsDebouncer {
    SettingsDebouncer::new(context("Anna", store), DEBOUNCE)
}

async fn settings_writes(store: &MemorySessionStore) -> Vec<ViewerSettings> {
    store
        .writes_for(&display())
        .await
        .into_iter()
        .filter_map(|op| match op {
            WriteOp::Patch(patch) => patch.viewer_settings,
            WriteOp::Clear => None,
        })
        .collect()
}

fn scales(text_scale: f64, reps_scale: f64) -> ViewerSettings {
    ViewerSettings {
        text_scale,
        reps_scale,
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_updates_produce_one_write_with_the_last_value() {
    let store = Arc::new(MemorySessionStore::new());
    let debouncer = debouncer(&store);

    for value in [1.1, 1.2, 1.3, 1.4, 1.5] {
        debouncer
            .update_setting(&display(), SettingKey::Text, value)
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(settings_writes(&store).await.is_empty());
    assert_eq!(debouncer.local_settings().await.text_scale, 1.5);

    tokio::time::sleep(DEBOUNCE).await;
    assert_eq!(settings_writes(&store).await, vec![scales(1.5, 1.0)]);
    assert!(!debouncer.has_pending().await);
}

#[tokio::test(start_paused = true)]
async fn both_fields_in_one_window_share_a_write() {
    let store = Arc::new(MemorySessionStore::new());
    let debouncer = debouncer(&store);

    debouncer
        .update_setting(&display(), SettingKey::Text, 1.3)
        .await;
    debouncer
        .update_setting(&display(), SettingKey::Reps, 0.8)
        .await;
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(settings_writes(&store).await, vec![scales(1.3, 0.8)]);
}

#[tokio::test(start_paused = true)]
async fn untouched_field_comes_from_the_last_remote_settings() {
    let store = Arc::new(MemorySessionStore::new());
    let debouncer = debouncer(&store);
    debouncer.observe_remote(scales(1.0, 2.0)).await;

    debouncer
        .update_setting(&display(), SettingKey::Text, 1.5)
        .await;
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(settings_writes(&store).await, vec![scales(1.5, 2.0)]);
}

#[tokio::test(start_paused = true)]
async fn remote_snapshot_does_not_override_a_pending_local_value() {
    let store = Arc::new(MemorySessionStore::new());
    let debouncer = debouncer(&store);

    debouncer
        .update_setting(&display(), SettingKey::Text, 1.5)
        .await;
    debouncer.observe_remote(scales(1.0, 2.0)).await;

    assert_eq!(debouncer.local_settings().await, scales(1.5, 2.0));
}

#[tokio::test(start_paused = true)]
async fn separate_windows_write_separately() {
    let store = Arc::new(MemorySessionStore::new());
    let debouncer = debouncer(&store);

    debouncer
        .update_setting(&display(), SettingKey::Text, 1.2)
        .await;
    tokio::time::sleep(DEBOUNCE * 2).await;
    debouncer
        .update_setting(&display(), SettingKey::Reps, 1.4)
        .await;
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(
        settings_writes(&store).await,
        vec![scales(1.2, 1.0), scales(1.2, 1.4)]
    );
}

#[tokio::test(start_paused = true)]
async fn flush_writes_now_and_discard_drops() {
    let store = Arc::new(MemorySessionStore::new());
    let debouncer = debouncer(&store);

    debouncer
        .update_setting(&display(), SettingKey::Text, 1.4)
        .await;
    assert!(debouncer.flush().await);
    assert_eq!(settings_writes(&store).await, vec![scales(1.4, 1.0)]);
    assert!(!debouncer.flush().await);

    debouncer
        .update_setting(&display(), SettingKey::Reps, 0.5)
        .await;
    assert_eq!(debouncer.discard().await, 1);
    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(settings_writes(&store).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_not_retried() {
    let store = Arc::new(MemorySessionStore::new());
    let debouncer = debouncer(&store);
    store.set_unavailable(true);

    debouncer
        .update_setting(&display(), SettingKey::Text, 1.9)
        .await;
    tokio::time::sleep(DEBOUNCE * 2).await;
    store.set_unavailable(false);
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert!(store.write_log().await.is_empty());
    assert!(!debouncer.has_pending().await);
    assert_eq!(debouncer.local_settings().await.text_scale, 1.9);
}

#[tokio::test(start_paused = true)]
async fn switching_display_drops_values_for_the_old_one() {
    let store = Arc::new(MemorySessionStore::new());
    let debouncer = debouncer(&store);
    let other = DisplayId::new("S2");

    debouncer
        .update_setting(&display(), SettingKey::Reps, 0.7)
        .await;
    debouncer.update_setting(&other, SettingKey::Text, 1.1).await;
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert!(settings_writes(&store).await.is_empty());
    let other_writes = store.writes_for(&other).await;
    assert_eq!(other_writes.len(), 1);
    let WriteOp::Patch(patch) = &other_writes[0] else {
        panic!("expected a patch");
    };
    assert_eq!(patch.viewer_settings, Some(scales(1.1, 1.0)));
}
