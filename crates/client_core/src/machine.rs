//! Controller-side state machine. Local actions and remote snapshots are fed
//! through one task, one at a time, so no two transitions interleave.

use std::sync::Arc;

use futures::StreamExt;
use shared::{
    domain::{
        BlockId, Command, DisplayId, Point, SettingKey, Timestamp, View, ViewerSettings, WorkoutId,
    },
    error::{ErrorCode, ErrorReport, SyncError},
    protocol::{DiscoveryPayload, SessionState},
};
use storage::{SessionStream, WorkoutStore};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    config::ControllerSettings,
    dispatcher::{CommandDispatcher, PendingCommand},
    ownership::{ConnectOutcome, OwnershipArbiter, PendingTakeover, Takeover},
    ControllerContext, DrawingStrokeBroadcaster, FreestandingTimer, SettingsDebouncer,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerView {
    Disconnected,
    SelectingDisplay,
    PendingTakeoverConfirmation(PendingTakeover),
    Dashboard,
    CategoryList { category: String },
    WorkoutPreview { workout_id: WorkoutId },
    BlockControls { workout_id: WorkoutId, block_id: BlockId },
    TimerSetup,
    Ideaboard,
}

impl ControllerView {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerView::Disconnected => "disconnected",
            ControllerView::SelectingDisplay => "selecting_display",
            ControllerView::PendingTakeoverConfirmation(_) => "pending_takeover_confirmation",
            ControllerView::Dashboard => "dashboard",
            ControllerView::CategoryList { .. } => "category_list",
            ControllerView::WorkoutPreview { .. } => "workout_preview",
            ControllerView::BlockControls { .. } => "block_controls",
            ControllerView::TimerSetup => "timer_setup",
            ControllerView::Ideaboard => "ideaboard",
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(
            self,
            ControllerView::Disconnected
                | ControllerView::SelectingDisplay
                | ControllerView::PendingTakeoverConfirmation(_)
        )
    }
}

/// Local selection mirrored from what this controller last put on the display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub category: Option<String>,
    pub workout_id: Option<WorkoutId>,
    pub block_id: Option<BlockId>,
}

#[derive(Debug, Clone)]
pub enum ControllerAction {
    Start,
    ScanDiscovery(String),
    Connect(DisplayId),
    ConfirmTakeover,
    DeclineTakeover,
    OpenCategory(String),
    SelectWorkout(WorkoutId),
    CastWorkout,
    OpenBlock(BlockId),
    SendCommand(Command),
    UpdateSetting { key: SettingKey, value: f64 },
    CloseBlock,
    OpenTimerSetup,
    StartFreestanding(FreestandingTimer),
    OpenIdeaboard,
    LeaveIdeaboard,
    SetStrokeColor(String),
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    ClearDrawing,
    UndoStroke,
    SaveDrawing,
    BackToDashboard,
    ExitSession,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    ViewChanged(ControllerView),
    TakeoverConfirmationRequired {
        display_id: DisplayId,
        current_controller: String,
        prompt: String,
    },
    KickedOff {
        by: String,
        message: String,
    },
    CommandSent {
        command: Command,
        timestamp: Timestamp,
    },
    Error(ErrorReport),
}

enum Step {
    Local(Option<ControllerAction>),
    Remote(Option<Option<SessionState>>),
}

pub struct SessionViewMachine {
    ctx: ControllerContext,
    workouts: Arc<dyn WorkoutStore>,
    arbiter: OwnershipArbiter,
    dispatcher: Arc<CommandDispatcher>,
    debouncer: SettingsDebouncer,
    strokes: DrawingStrokeBroadcaster,
    flush_settings_on_leave: bool,
    view: ControllerView,
    display_id: Option<DisplayId>,
    selection: Selection,
    remote: Option<SessionStream>,
    events: broadcast::Sender<ControllerEvent>,
}

impl SessionViewMachine {
    pub fn new(
        ctx: ControllerContext,
        settings: &ControllerSettings,
        workouts: Arc<dyn WorkoutStore>,
    ) -> Self {
        let dispatcher = Arc::new(CommandDispatcher::new(ctx.clone(), settings.command_ack()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            arbiter: OwnershipArbiter::new(ctx.clone(), settings.grace_window()),
            debouncer: SettingsDebouncer::new(ctx.clone(), settings.debounce_delay()),
            strokes: DrawingStrokeBroadcaster::new(ctx.clone(), Arc::clone(&dispatcher)),
            dispatcher,
            flush_settings_on_leave: settings.flush_settings_on_leave,
            ctx,
            workouts,
            view: ControllerView::Disconnected,
            display_id: None,
            selection: Selection::default(),
            remote: None,
            events,
        }
    }

    pub fn view(&self) -> &ControllerView {
        &self.view
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn display_id(&self) -> Option<&DisplayId> {
        self.display_id.as_ref()
    }

    pub fn identity(&self) -> &str {
        &self.ctx.identity
    }

    pub fn pending_command(&self) -> Option<PendingCommand> {
        self.dispatcher.pending_command()
    }

    pub async fn local_settings(&self) -> ViewerSettings {
        self.debouncer.local_settings().await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Processes local actions and remote snapshots until the action queue closes.
    pub async fn run(mut self, mut actions: mpsc::Receiver<ControllerAction>) {
        loop {
            let step = tokio::select! {
                action = actions.recv() => Step::Local(action),
                state = next_remote(&mut self.remote) => Step::Remote(state),
            };
            match step {
                Step::Local(None) => break,
                Step::Local(Some(action)) => {
                    if let Err(err) = self.handle_action(action).await {
                        self.report(&err);
                    }
                }
                Step::Remote(Some(state)) => self.handle_remote(state).await,
                Step::Remote(None) => {
                    warn!(controller = %self.ctx.identity, "session subscription ended");
                    self.remote = None;
                }
            }
        }
        info!(controller = %self.ctx.identity, "controller loop stopped");
    }

    pub async fn handle_action(&mut self, action: ControllerAction) -> Result<(), SyncError> {
        match action {
            ControllerAction::Start => self.start(),
            ControllerAction::ScanDiscovery(raw) => self.scan_discovery(&raw).await,
            ControllerAction::Connect(display_id) => self.connect(display_id).await,
            ControllerAction::ConfirmTakeover => self.confirm_takeover().await,
            ControllerAction::DeclineTakeover => self.decline_takeover(),
            ControllerAction::OpenCategory(category) => self.open_category(category),
            ControllerAction::SelectWorkout(workout_id) => self.select_workout(workout_id),
            ControllerAction::CastWorkout => self.cast_workout().await,
            ControllerAction::OpenBlock(block_id) => self.open_block(block_id).await,
            ControllerAction::SendCommand(command) => self.send_command(command).await.map(|_| ()),
            ControllerAction::UpdateSetting { key, value } => {
                self.update_setting(key, value).await
            }
            ControllerAction::CloseBlock => self.close_block().await,
            ControllerAction::OpenTimerSetup => self.open_timer_setup(),
            ControllerAction::StartFreestanding(timer) => {
                self.start_freestanding(&timer).await.map(|_| ())
            }
            ControllerAction::OpenIdeaboard => self.open_ideaboard().await,
            ControllerAction::LeaveIdeaboard => self.leave_ideaboard().await,
            ControllerAction::SetStrokeColor(color) => {
                self.require_ideaboard("set stroke color")?;
                self.strokes.set_color(color).await;
                Ok(())
            }
            ControllerAction::PointerDown(point) => {
                self.require_ideaboard("draw")?;
                self.strokes.pointer_down(point).await;
                Ok(())
            }
            ControllerAction::PointerMove(point) => {
                self.require_ideaboard("draw")?;
                self.strokes.pointer_move(point).await;
                Ok(())
            }
            ControllerAction::PointerUp => {
                let display_id = self.require_ideaboard("draw")?;
                self.strokes.pointer_up(&display_id).await;
                Ok(())
            }
            ControllerAction::ClearDrawing => self.clear_drawing().await,
            ControllerAction::UndoStroke => self.undo_stroke().await,
            ControllerAction::SaveDrawing => self.save_drawing().await,
            ControllerAction::BackToDashboard => self.back_to_dashboard(),
            ControllerAction::ExitSession => self.exit_session().await,
            ControllerAction::Disconnect => {
                self.disconnect().await;
                Ok(())
            }
        }
    }

    pub fn start(&mut self) -> Result<(), SyncError> {
        self.expect_view("start", |view| matches!(view, ControllerView::Disconnected))?;
        self.set_view(ControllerView::SelectingDisplay);
        Ok(())
    }

    /// Malformed payloads are logged and otherwise ignored.
    pub async fn scan_discovery(&mut self, raw: &str) -> Result<(), SyncError> {
        self.expect_view("scan a display code", |view| {
            matches!(view, ControllerView::SelectingDisplay)
        })?;
        let display_id = DiscoveryPayload::parse(raw).inspect_err(|err| {
            warn!(controller = %self.ctx.identity, error = %err, "rejected discovery payload");
        })?;
        self.connect(display_id).await
    }

    pub async fn connect(&mut self, display_id: DisplayId) -> Result<(), SyncError> {
        self.expect_view("connect", |view| {
            matches!(view, ControllerView::SelectingDisplay)
        })?;
        match self.arbiter.connect(&display_id).await {
            Ok(ConnectOutcome::Connected) => {
                self.enter_connected(display_id).await;
                Ok(())
            }
            Ok(ConnectOutcome::ConfirmationRequired(pending)) => {
                let _ = self.events.send(ControllerEvent::TakeoverConfirmationRequired {
                    display_id: pending.display_id.clone(),
                    current_controller: pending.current_controller.clone(),
                    prompt: pending.prompt(),
                });
                self.set_view(ControllerView::PendingTakeoverConfirmation(pending));
                Ok(())
            }
            Err(err) => {
                error!(%display_id, controller = %self.ctx.identity, error = %err, "connect failed");
                Err(err)
            }
        }
    }

    pub async fn confirm_takeover(&mut self) -> Result<(), SyncError> {
        let ControllerView::PendingTakeoverConfirmation(pending) = self.view.clone() else {
            return Err(self.invalid("confirm a takeover"));
        };
        match self.arbiter.confirm_takeover(&pending).await {
            Ok(()) => {
                self.enter_connected(pending.display_id).await;
                Ok(())
            }
            Err(err) => {
                error!(display_id = %pending.display_id, error = %err, "takeover write failed");
                self.set_view(ControllerView::SelectingDisplay);
                Err(err)
            }
        }
    }

    pub fn decline_takeover(&mut self) -> Result<(), SyncError> {
        let ControllerView::PendingTakeoverConfirmation(pending) = self.view.clone() else {
            return Err(self.invalid("decline a takeover"));
        };
        self.arbiter.decline_takeover(&pending);
        self.set_view(ControllerView::SelectingDisplay);
        Ok(())
    }

    pub fn open_category(&mut self, category: String) -> Result<(), SyncError> {
        self.expect_view("open a category", |view| {
            matches!(view, ControllerView::Dashboard)
        })?;
        self.selection.category = Some(category.clone());
        self.set_view(ControllerView::CategoryList { category });
        Ok(())
    }

    pub fn select_workout(&mut self, workout_id: WorkoutId) -> Result<(), SyncError> {
        self.expect_view("select a workout", |view| {
            matches!(view, ControllerView::CategoryList { .. })
        })?;
        self.set_view(ControllerView::WorkoutPreview { workout_id });
        Ok(())
    }

    /// Puts the previewed workout on the display without loading a block.
    pub async fn cast_workout(&mut self) -> Result<(), SyncError> {
        let ControllerView::WorkoutPreview { workout_id } = self.view.clone() else {
            return Err(self.invalid("cast a workout"));
        };
        let display_id = self.connected_display()?;
        self.dispatcher.cast_workout(&display_id, &workout_id).await;
        self.selection.workout_id = Some(workout_id);
        self.selection.block_id = None;
        Ok(())
    }

    pub async fn open_block(&mut self, block_id: BlockId) -> Result<(), SyncError> {
        let ControllerView::WorkoutPreview { workout_id } = self.view.clone() else {
            return Err(self.invalid("open a block"));
        };
        let display_id = self.connected_display()?;
        self.dispatcher
            .load_block(&display_id, &workout_id, &block_id)
            .await;
        self.selection.workout_id = Some(workout_id.clone());
        self.selection.block_id = Some(block_id.clone());
        self.set_view(ControllerView::BlockControls {
            workout_id,
            block_id,
        });
        Ok(())
    }

    pub async fn send_command(&mut self, command: Command) -> Result<Timestamp, SyncError> {
        let ControllerView::BlockControls {
            workout_id,
            block_id,
        } = self.view.clone()
        else {
            return Err(self.invalid("send a command"));
        };
        let display_id = self.connected_display()?;
        let timestamp = self
            .dispatcher
            .send_command(&display_id, Some(&workout_id), command, Some(&block_id))
            .await;
        let _ = self.events.send(ControllerEvent::CommandSent { command, timestamp });
        Ok(timestamp)
    }

    pub async fn update_setting(&mut self, key: SettingKey, value: f64) -> Result<(), SyncError> {
        let display_id = self.connected_display()?;
        self.debouncer.update_setting(&display_id, key, value).await;
        Ok(())
    }

    pub async fn close_block(&mut self) -> Result<(), SyncError> {
        let ControllerView::BlockControls { workout_id, .. } = self.view.clone() else {
            return Err(self.invalid("close a block"));
        };
        let display_id = self.connected_display()?;
        if self.flush_settings_on_leave {
            self.debouncer.flush().await;
        } else {
            self.debouncer.discard().await;
        }
        self.dispatcher
            .close_block(&display_id, Some(&workout_id))
            .await;
        self.selection.block_id = None;
        self.set_view(ControllerView::Dashboard);
        Ok(())
    }

    pub fn open_timer_setup(&mut self) -> Result<(), SyncError> {
        self.expect_view("set up a timer", |view| {
            matches!(view, ControllerView::Dashboard)
        })?;
        self.set_view(ControllerView::TimerSetup);
        Ok(())
    }

    /// Persists the synthesized workout first and only then names it in the
    /// session document, so the display never sees a dangling id.
    pub async fn start_freestanding(
        &mut self,
        timer: &FreestandingTimer,
    ) -> Result<WorkoutId, SyncError> {
        self.expect_view("start a freestanding timer", |view| {
            matches!(view, ControllerView::TimerSetup)
        })?;
        let display_id = self.connected_display()?;
        let workout = timer.synthesize(&self.ctx.organization_id);
        let Some(block_id) = workout.blocks.first().map(|block| block.id.clone()) else {
            return Err(self.invalid("start a timer without blocks"));
        };

        self.workouts
            .save(&workout)
            .await
            .map_err(|source| SyncError::WorkoutPersist {
                workout_id: workout.id.clone(),
                source,
            })
            .inspect_err(|err| {
                error!(%display_id, error = %err, "freestanding workout not stored; display left untouched");
            })?;
        info!(%display_id, workout_id = %workout.id, title = %workout.title, "stored freestanding workout");

        self.dispatcher
            .load_block(&display_id, &workout.id, &block_id)
            .await;
        self.selection.workout_id = Some(workout.id.clone());
        self.selection.block_id = Some(block_id.clone());
        self.set_view(ControllerView::BlockControls {
            workout_id: workout.id.clone(),
            block_id,
        });
        Ok(workout.id)
    }

    pub async fn open_ideaboard(&mut self) -> Result<(), SyncError> {
        self.expect_view("open the idea board", |view| {
            matches!(view, ControllerView::Dashboard)
        })?;
        let display_id = self.connected_display()?;
        self.dispatcher.set_view(&display_id, View::Ideaboard).await;
        self.set_view(ControllerView::Ideaboard);
        Ok(())
    }

    pub async fn leave_ideaboard(&mut self) -> Result<(), SyncError> {
        let display_id = self.require_ideaboard("leave the idea board")?;
        self.dispatcher.set_view(&display_id, View::Menu).await;
        self.set_view(ControllerView::Dashboard);
        Ok(())
    }

    pub async fn clear_drawing(&mut self) -> Result<(), SyncError> {
        let display_id = self.require_ideaboard("clear the drawing")?;
        self.strokes.clear(&display_id).await;
        Ok(())
    }

    pub async fn undo_stroke(&mut self) -> Result<(), SyncError> {
        let display_id = self.require_ideaboard("undo a stroke")?;
        let timestamp = self.strokes.undo(&display_id).await;
        let _ = self.events.send(ControllerEvent::CommandSent {
            command: Command::UndoNote,
            timestamp,
        });
        Ok(())
    }

    pub async fn save_drawing(&mut self) -> Result<(), SyncError> {
        let display_id = self.require_ideaboard("save the drawing")?;
        let timestamp = self.strokes.save(&display_id).await;
        let _ = self.events.send(ControllerEvent::CommandSent {
            command: Command::SaveNote,
            timestamp,
        });
        Ok(())
    }

    pub fn back_to_dashboard(&mut self) -> Result<(), SyncError> {
        self.expect_view("go back", |view| {
            matches!(
                view,
                ControllerView::CategoryList { .. }
                    | ControllerView::WorkoutPreview { .. }
                    | ControllerView::TimerSetup
            )
        })?;
        self.set_view(ControllerView::Dashboard);
        Ok(())
    }

    /// Ends the display session for everyone: the document is cleared.
    pub async fn exit_session(&mut self) -> Result<(), SyncError> {
        let display_id = self.connected_display()?;
        self.debouncer.discard().await;
        match self
            .ctx
            .store
            .clear(&self.ctx.organization_id, &display_id)
            .await
        {
            Ok(()) => info!(%display_id, controller = %self.ctx.identity, "session exited"),
            Err(error) => warn!(%display_id, %error, "dropping failed session clear"),
        }
        self.selection = Selection::default();
        self.set_view(ControllerView::Dashboard);
        Ok(())
    }

    /// Leaves the display as it is and stops controlling it.
    pub async fn disconnect(&mut self) {
        self.debouncer.discard().await;
        self.arbiter.release().await;
        self.remote = None;
        self.display_id = None;
        self.selection = Selection::default();
        self.set_view(ControllerView::Disconnected);
    }

    /// Reacts to a snapshot of the session document pushed by the store.
    pub async fn handle_remote(&mut self, state: Option<SessionState>) {
        let Some(display_id) = self.display_id.clone() else {
            return;
        };

        if let Some(takeover) = self.arbiter.observe(&display_id, state.as_ref()).await {
            self.kicked_off(takeover).await;
            return;
        }

        if let Some(state) = &state {
            if self.is_stale(state) {
                return;
            }
            self.debouncer.observe_remote(state.viewer_settings).await;
        }

        if self.is_remote_exit(state.as_ref()) {
            let was_freestanding = self
                .selection
                .workout_id
                .as_ref()
                .is_some_and(WorkoutId::is_freestanding);
            info!(%display_id, was_freestanding, "display left the active session remotely");
            self.selection.workout_id = None;
            self.selection.block_id = None;
            self.set_view(if was_freestanding {
                ControllerView::TimerSetup
            } else {
                ControllerView::Dashboard
            });
        }
    }

    /// A snapshot taken before our latest write says nothing about the present.
    fn is_stale(&self, state: &SessionState) -> bool {
        let Some(last_write) = self.ctx.clock.last_issued() else {
            return false;
        };
        if state.last_update < last_write {
            debug!(
                snapshot = %state.last_update,
                %last_write,
                "ignoring snapshot older than our latest write"
            );
            return true;
        }
        false
    }

    fn is_remote_exit(&self, state: Option<&SessionState>) -> bool {
        let Some(state) = state else {
            return match &self.view {
                ControllerView::BlockControls { .. } | ControllerView::Ideaboard => true,
                ControllerView::WorkoutPreview { workout_id } => self.is_cast(workout_id),
                _ => false,
            };
        };
        match &self.view {
            ControllerView::BlockControls { .. } => {
                state.view.is_resting() || state.active_workout_id.is_none()
            }
            ControllerView::WorkoutPreview { workout_id } if self.is_cast(workout_id) => {
                state.view.is_resting() || state.active_workout_id.is_none()
            }
            ControllerView::Ideaboard => state.view.is_resting(),
            _ => false,
        }
    }

    fn is_cast(&self, workout_id: &WorkoutId) -> bool {
        self.selection.workout_id.as_ref() == Some(workout_id)
    }

    async fn kicked_off(&mut self, takeover: Takeover) {
        let message = takeover.message();
        warn!(display_id = %takeover.display_id, controller = %self.ctx.identity, by = %takeover.by, "kicked off display");
        self.debouncer.discard().await;
        self.remote = None;
        self.display_id = None;
        self.selection = Selection::default();
        let _ = self.events.send(ControllerEvent::KickedOff {
            by: takeover.by,
            message,
        });
        self.set_view(ControllerView::Disconnected);
    }

    async fn enter_connected(&mut self, display_id: DisplayId) {
        match self
            .ctx
            .store
            .subscribe(&self.ctx.organization_id, &display_id)
            .await
        {
            Ok(stream) => self.remote = Some(stream),
            Err(error) => {
                warn!(%display_id, %error, "session subscription failed; remote changes will not be seen");
                self.remote = None;
            }
        }
        info!(%display_id, controller = %self.ctx.identity, "connected to display");
        self.display_id = Some(display_id);
        self.selection = Selection::default();
        self.set_view(ControllerView::Dashboard);
    }

    fn set_view(&mut self, view: ControllerView) {
        if self.view == view {
            return;
        }
        debug!(from = self.view.name(), to = view.name(), "controller view changed");
        self.view = view.clone();
        let _ = self.events.send(ControllerEvent::ViewChanged(view));
    }

    fn report(&self, err: &SyncError) {
        if err.code() == ErrorCode::MalformedDiscovery {
            return;
        }
        let _ = self.events.send(ControllerEvent::Error(ErrorReport::from(err)));
    }

    fn connected_display(&self) -> Result<DisplayId, SyncError> {
        match (&self.display_id, self.view.is_connected()) {
            (Some(display_id), true) => Ok(display_id.clone()),
            _ => Err(SyncError::NotConnected),
        }
    }

    fn require_ideaboard(&self, action: &'static str) -> Result<DisplayId, SyncError> {
        self.expect_view(action, |view| matches!(view, ControllerView::Ideaboard))?;
        self.connected_display()
    }

    fn expect_view(
        &self,
        action: &'static str,
        allowed: impl Fn(&ControllerView) -> bool,
    ) -> Result<(), SyncError> {
        if allowed(&self.view) {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> SyncError {
        SyncError::InvalidTransition {
            action,
            state: self.view.name().to_string(),
        }
    }
}

async fn next_remote(remote: &mut Option<SessionStream>) -> Option<Option<SessionState>> {
    match remote {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
