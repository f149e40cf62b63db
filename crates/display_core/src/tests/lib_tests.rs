use super::*;
use shared::domain::Point;

fn receiver() -> DisplayReceiver {
    DisplayReceiver::new(DisplayId::new("S1"))
}

fn loaded(block: &str) -> SessionState {
    SessionState {
        active_workout_id: Some(WorkoutId::new("w1")),
        active_block_id: Some(BlockId::new(block)),
        view: View::Timer,
        controller_name: Some("Anna".into()),
        last_update: Timestamp(10),
        ..SessionState::default()
    }
}

fn with_command(mut state: SessionState, command: Command, at: i64) -> SessionState {
    state.command = Some(command);
    state.command_timestamp = Some(Timestamp(at));
    state.last_update = Timestamp(at);
    state
}

fn stroke(at: i64) -> Stroke {
    Stroke {
        color: "#ff3b30".into(),
        points: vec![Point { x: 0.1, y: 0.2 }, Point { x: 0.3, y: 0.4 }],
        timestamp: Timestamp(at),
        is_clear: false,
    }
}

fn with_stroke(mut state: SessionState, stroke: Stroke) -> SessionState {
    state.last_update = stroke.timestamp;
    state.latest_stroke = Some(stroke);
    state
}

#[test]
fn loading_a_block_makes_playback_ready() {
    let mut display = receiver();
    let events = display.observe(Some(&loaded("b1")));

    assert!(events.contains(&DisplayEvent::ControllerChanged("Anna".into())));
    assert!(events.contains(&DisplayEvent::ViewChanged(View::Timer)));
    assert!(events.contains(&DisplayEvent::PlaybackChanged(PlaybackStatus::Ready)));
    assert_eq!(display.active_block_id(), Some(&BlockId::new("b1")));
    assert_eq!(display.playback(), PlaybackStatus::Ready);
}

#[test]
fn each_command_pulse_is_applied_once() {
    let mut display = receiver();
    let start = with_command(loaded("b1"), Command::Start, 20);

    let first = display.observe(Some(&start));
    assert!(first.contains(&DisplayEvent::CommandApplied {
        command: Command::Start,
        timestamp: Timestamp(20),
    }));
    assert_eq!(display.playback(), PlaybackStatus::Running);

    assert!(display.observe(Some(&start)).is_empty());
    assert_eq!(display.playback(), PlaybackStatus::Running);
}

#[test]
fn older_pulse_arriving_late_is_ignored() {
    let mut display = receiver();
    display.observe(Some(&with_command(loaded("b1"), Command::Pause, 30)));
    display.observe(Some(&with_command(loaded("b1"), Command::Start, 20)));

    assert_eq!(display.playback(), PlaybackStatus::Ready);
}

#[test]
fn playback_transitions_are_idempotent() {
    for status in [
        PlaybackStatus::Idle,
        PlaybackStatus::Ready,
        PlaybackStatus::Running,
        PlaybackStatus::Paused,
        PlaybackStatus::Finished,
    ] {
        for command in [
            Command::Start,
            Command::Pause,
            Command::Resume,
            Command::Reset,
            Command::Finish,
            Command::StartHyrox,
        ] {
            let once = status.after(command);
            assert_eq!(once.after(command), once, "{status:?} then {command:?}");
        }
    }
    assert_eq!(PlaybackStatus::Running.after(Command::Pause), PlaybackStatus::Paused);
    assert_eq!(PlaybackStatus::Paused.after(Command::Resume), PlaybackStatus::Running);
    assert_eq!(PlaybackStatus::Ready.after(Command::Pause), PlaybackStatus::Ready);
    assert_eq!(PlaybackStatus::Idle.after(Command::Start), PlaybackStatus::Idle);
}

#[test]
fn switching_blocks_resets_playback() {
    let mut display = receiver();
    display.observe(Some(&with_command(loaded("b1"), Command::Start, 20)));
    let mut next = with_command(loaded("b2"), Command::Start, 20);
    next.last_update = Timestamp(25);

    display.observe(Some(&next));
    assert_eq!(display.playback(), PlaybackStatus::Ready);
}

#[test]
fn strokes_accumulate_and_undo_pops_the_newest() {
    let mut display = receiver();
    let board = SessionState {
        view: View::Ideaboard,
        ..SessionState::default()
    };
    display.observe(Some(&with_stroke(board.clone(), stroke(10))));
    display.observe(Some(&with_stroke(board.clone(), stroke(11))));
    assert_eq!(display.strokes().len(), 2);

    let undo = with_command(with_stroke(board.clone(), stroke(11)), Command::UndoNote, 12);
    let events = display.observe(Some(&undo));
    assert!(events.contains(&DisplayEvent::StrokeUndone));
    assert_eq!(display.strokes().strokes(), &[stroke(10)]);
    assert_eq!(display.view(), View::Ideaboard);

    assert!(display.observe(Some(&undo)).is_empty());
    assert_eq!(display.strokes().len(), 1);
}

#[test]
fn clear_marker_wipes_the_board_and_save_snapshots_it() {
    let mut display = receiver();
    let board = SessionState {
        view: View::Ideaboard,
        ..SessionState::default()
    };
    display.observe(Some(&with_stroke(board.clone(), stroke(10))));

    let saved = with_command(with_stroke(board.clone(), stroke(10)), Command::SaveNote, 11);
    let events = display.observe(Some(&saved));
    assert!(events.contains(&DisplayEvent::NoteSaved(SavedNote {
        saved_at: Timestamp(11),
        strokes: vec![stroke(10)],
    })));

    let events = display.observe(Some(&with_stroke(board, Stroke::clear(Timestamp(12)))));
    assert_eq!(events, vec![DisplayEvent::DrawingCleared]);
    assert!(display.strokes().is_empty());
    assert_eq!(display.strokes().saved().len(), 1);
}

#[test]
fn clear_marker_from_a_lagging_clock_still_wipes_the_board() {
    let mut display = receiver();
    let board = SessionState {
        view: View::Ideaboard,
        ..SessionState::default()
    };
    display.observe(Some(&with_stroke(board.clone(), stroke(100))));

    let cleared = with_stroke(board.clone(), Stroke::clear(Timestamp(90)));
    assert_eq!(
        display.observe(Some(&cleared)),
        vec![DisplayEvent::DrawingCleared]
    );
    assert!(display.strokes().is_empty());

    assert!(display.observe(Some(&cleared)).is_empty());

    let events = display.observe(Some(&with_stroke(board, stroke(101))));
    assert_eq!(events, vec![DisplayEvent::StrokeAdded(stroke(101))]);
    assert_eq!(display.strokes().len(), 1);
}

#[test]
fn cleared_document_resets_everything_once() {
    let mut display = receiver();
    display.observe(Some(&with_stroke(
        with_command(loaded("b1"), Command::Start, 20),
        stroke(21),
    )));

    assert_eq!(display.observe(None), vec![DisplayEvent::SessionEnded]);
    assert_eq!(display.view(), View::Idle);
    assert_eq!(display.playback(), PlaybackStatus::Idle);
    assert_eq!(display.controller_name(), None);
    assert!(display.strokes().is_empty());
    assert!(display.observe(None).is_empty());
}

#[test]
fn viewer_settings_follow_the_document() {
    let mut display = receiver();
    let scaled = SessionState {
        viewer_settings: ViewerSettings {
            text_scale: 1.4,
            reps_scale: 0.8,
        },
        ..SessionState::default()
    };
    let events = display.observe(Some(&scaled));
    assert_eq!(
        events,
        vec![DisplayEvent::SettingsChanged(ViewerSettings {
            text_scale: 1.4,
            reps_scale: 0.8,
        })]
    );
}
