use super::*;
use shared::domain::{View, WorkoutId};

fn key() -> (OrganizationId, DisplayId) {
    (OrganizationId::new("gym"), DisplayId::new("S1"))
}

fn claim(name: &str) -> SessionPatch {
    SessionPatch {
        controller_name: Some(name.to_string()),
        ..SessionPatch::default()
    }
}

#[tokio::test]
async fn patch_creates_document_and_merges_fields() {
    let store = MemorySessionStore::new();
    let (org, display) = key();

    assert!(store.read(&org, &display).await.expect("read").is_none());

    store.patch(&org, &display, claim("Anna")).await.expect("claim");
    store
        .patch(
            &org,
            &display,
            SessionPatch {
                view: Some(View::Preview),
                active_workout_id: Some(Some(WorkoutId::new("w1"))),
                ..SessionPatch::default()
            },
        )
        .await
        .expect("cast");

    let state = store.read(&org, &display).await.expect("read").expect("doc");
    assert!(state.is_controlled_by("Anna"));
    assert_eq!(state.view, View::Preview);
    assert_eq!(state.active_workout_id, Some(WorkoutId::new("w1")));
}

#[tokio::test]
async fn subscription_replays_current_document_then_changes() {
    let store = MemorySessionStore::new();
    let (org, display) = key();
    store.patch(&org, &display, claim("Anna")).await.expect("claim");

    let mut stream = store.subscribe(&org, &display).await.expect("subscribe");
    let first = stream.next().await.expect("initial").expect("doc");
    assert!(first.is_controlled_by("Anna"));

    store.patch(&org, &display, claim("Bertil")).await.expect("takeover");
    let second = stream.next().await.expect("change").expect("doc");
    assert!(second.is_controlled_by("Bertil"));

    store.clear(&org, &display).await.expect("clear");
    assert_eq!(stream.next().await.expect("clear event"), None);
}

#[tokio::test]
async fn displays_are_isolated() {
    let store = MemorySessionStore::new();
    let org = OrganizationId::new("gym");
    store
        .patch(&org, &DisplayId::new("S1"), claim("Anna"))
        .await
        .expect("claim");
    assert!(store
        .read(&org, &DisplayId::new("S2"))
        .await
        .expect("read")
        .is_none());
    assert!(store
        .read(&OrganizationId::new("other"), &DisplayId::new("S1"))
        .await
        .expect("read")
        .is_none());
}

#[tokio::test]
async fn unavailable_store_rejects_writes_without_logging_them() {
    let store = MemorySessionStore::new();
    let (org, display) = key();
    store.set_unavailable(true);

    let err = store.patch(&org, &display, claim("Anna")).await.expect_err("offline");
    assert!(err.to_string().contains("unavailable"));
    assert!(store.write_log().await.is_empty());

    store.set_unavailable(false);
    store.clear(&org, &display).await.expect("clear");
    assert_eq!(store.writes_for(&display).await, vec![WriteOp::Clear]);
}

#[tokio::test]
async fn workout_store_round_trips_and_fails_when_offline() {
    let store = MemoryWorkoutStore::new();
    let workout = Workout {
        id: WorkoutId::new("w1"),
        organization_id: OrganizationId::new("gym"),
        title: "Leg day".into(),
        blocks: Vec::new(),
    };
    store.save(&workout).await.expect("save");
    assert!(store.contains(&workout.id).await);
    assert_eq!(store.load(&workout.id).await.expect("load"), Some(workout.clone()));

    store.set_unavailable(true);
    assert!(store.save(&workout).await.is_err());
    assert_eq!(store.len().await, 1);
}
