use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    load_settings, ControllerAction, ControllerContext, ControllerEvent, FreestandingTimer,
    SessionViewMachine,
};
use display_core::{DisplayEvent, DisplayReceiver};
use futures::StreamExt;
use shared::{
    domain::{Command, DisplayId, OrganizationId, SettingKey},
    protocol::DiscoveryPayload,
    workout::{CountDirection, TimerMode, TimerSettings},
};
use storage::{MemorySessionStore, MemoryWorkoutStore, SessionStore, SessionStream, Storage, WorkoutStore};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Drives one scripted control session against an in-process session store
/// and prints what the controller and the display see.
#[derive(Parser, Debug)]
struct Args {
    /// Discovery payload as scanned from the display, e.g. {"sid":"S1","action":"control"}.
    #[arg(long)]
    payload: Option<String>,
    /// Display to control when no payload is given.
    #[arg(long, default_value = "S1")]
    display: String,
    #[arg(long)]
    identity: Option<String>,
    /// EMOM length in minutes for the freestanding timer.
    #[arg(long, default_value_t = 10)]
    minutes: u32,
    /// Keep workouts in memory instead of the SQLite catalog.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(identity) = args.identity {
        settings.identity = identity;
    }
    let organization_id = OrganizationId::new(settings.organization_id.clone());
    let payload = match args.payload {
        Some(raw) => raw,
        None => serde_json::to_string(&DiscoveryPayload::control(&DisplayId::new(args.display)))?,
    };
    let display_id = DiscoveryPayload::parse(&payload).context("discovery payload")?;

    let workouts: Arc<dyn WorkoutStore> = if args.in_memory {
        Arc::new(MemoryWorkoutStore::new())
    } else {
        let storage = Storage::new(&settings.database_url)
            .await
            .with_context(|| format!("open workout catalog at {}", settings.database_url))?;
        storage.health_check().await?;
        Arc::new(storage)
    };

    let store = Arc::new(MemorySessionStore::new());
    let feed = store
        .subscribe(&organization_id, &display_id)
        .await
        .context("subscribe display")?;
    let display = tokio::spawn(watch_display(feed, display_id.clone()));

    let ctx = ControllerContext::new(organization_id, settings.identity.clone(), store.clone());
    let machine = SessionViewMachine::new(ctx, &settings, workouts);
    let printer = tokio::spawn(print_controller_events(machine.subscribe_events()));

    let (actions, receiver) = mpsc::channel(32);
    let controller = tokio::spawn(machine.run(receiver));

    let timer = FreestandingTimer::new(
        "",
        TimerSettings {
            mode: TimerMode::Emom,
            work_time_secs: 60,
            rest_time_secs: 0,
            rounds: args.minutes,
            prepare_time_secs: 10,
            direction: CountDirection::Down,
        },
    );
    let settle = settings.debounce_delay() + Duration::from_millis(100);
    let script = [
        ControllerAction::Start,
        ControllerAction::ScanDiscovery(payload),
        ControllerAction::OpenTimerSetup,
        ControllerAction::StartFreestanding(timer),
        ControllerAction::SendCommand(Command::Start),
        ControllerAction::UpdateSetting {
            key: SettingKey::Text,
            value: 1.25,
        },
        ControllerAction::UpdateSetting {
            key: SettingKey::Text,
            value: 1.5,
        },
        ControllerAction::SendCommand(Command::Pause),
        ControllerAction::SendCommand(Command::Resume),
        ControllerAction::SendCommand(Command::Finish),
        ControllerAction::ExitSession,
    ];
    for action in script {
        let exiting = matches!(action, ControllerAction::ExitSession);
        if exiting {
            // Let the debounced slider value land before the session ends.
            tokio::time::sleep(settle).await;
        }
        actions.send(action).await?;
    }
    drop(actions);
    controller.await?;

    match tokio::time::timeout(Duration::from_secs(5), display).await {
        Ok(joined) => joined?,
        Err(_) => info!(%display_id, "display did not see the session end"),
    }
    printer.await?;
    Ok(())
}

/// Plays the display: folds every snapshot into a receiver until the session ends.
async fn watch_display(mut feed: SessionStream, display_id: DisplayId) {
    let mut receiver = DisplayReceiver::new(display_id);
    while let Some(state) = feed.next().await {
        for event in receiver.observe(state.as_ref()) {
            println!("display:    {}", describe_display_event(&event));
            if event == DisplayEvent::SessionEnded {
                return;
            }
        }
    }
}

/// Prints controller events until the machine goes away. Returns how many were printed.
async fn print_controller_events(mut events: broadcast::Receiver<ControllerEvent>) -> usize {
    let mut printed = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                print_controller_event(&event);
                printed += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "controller events dropped, printer fell behind");
            }
            Err(RecvError::Closed) => return printed,
        }
    }
}

fn print_controller_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::ViewChanged(view) => println!("controller: view -> {}", view.name()),
        ControllerEvent::TakeoverConfirmationRequired { prompt, .. } => {
            println!("controller: {prompt}")
        }
        ControllerEvent::KickedOff { message, .. } => println!("controller: {message}"),
        ControllerEvent::CommandSent { command, timestamp } => {
            println!("controller: sent {} at {timestamp}", command.as_str())
        }
        ControllerEvent::Error(report) => match serde_json::to_string(report) {
            Ok(json) => println!("controller: error {json}"),
            Err(_) => println!("controller: error {}", report.message),
        },
    }
}

fn describe_display_event(event: &DisplayEvent) -> String {
    match event {
        DisplayEvent::SessionEnded => "session ended".to_string(),
        DisplayEvent::ControllerChanged(name) => format!("controlled by {name}"),
        DisplayEvent::ViewChanged(view) => format!("view {view:?}"),
        DisplayEvent::BlockLoaded {
            workout_id,
            block_id,
        } => format!(
            "loaded workout={} block={}",
            workout_id.as_ref().map_or("-", |id| id.as_str()),
            block_id.as_ref().map_or("-", |id| id.as_str())
        ),
        DisplayEvent::CommandApplied { command, timestamp } => {
            format!("command {} ({timestamp})", command.as_str())
        }
        DisplayEvent::PlaybackChanged(status) => format!("playback {status:?}"),
        DisplayEvent::SettingsChanged(settings) => format!(
            "text x{:.2}, reps x{:.2}",
            settings.text_scale, settings.reps_scale
        ),
        DisplayEvent::StrokeAdded(stroke) => format!("stroke with {} points", stroke.points.len()),
        DisplayEvent::DrawingCleared => "board cleared".to_string(),
        DisplayEvent::StrokeUndone => "stroke undone".to_string(),
        DisplayEvent::NoteSaved(note) => format!("note saved with {} strokes", note.strokes.len()),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
