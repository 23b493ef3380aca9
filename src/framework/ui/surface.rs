use super::command::{UserCommand, HELP_TEXT};
use super::presenter::Presenter;
use super::status::Status;
use super::visualizer::EvalBar;
use super::{UiMessage, UiReceiver};
use crate::framework::analyzers::FileLogger;
use crate::framework::config::{EngineSettings, SettingsChange, SettingsError};
use crate::framework::core::LogRecord;
use crate::framework::supervisor::{ProcessSupervisor, SupervisorError};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

/// How long to wait for a stopped engine's exit report on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Whether the UI loop keeps going after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Owner of all user-visible state; lives on the UI task
pub struct ControlSurface<P: Presenter> {
    supervisor: ProcessSupervisor,
    settings: EngineSettings,
    eval_bar: EvalBar,
    status: Status,
    presenter: P,
    journal: FileLogger,
}

impl<P: Presenter> ControlSurface<P> {
    pub fn new(
        supervisor: ProcessSupervisor,
        settings: EngineSettings,
        eval_bar: EvalBar,
        presenter: P,
        journal: FileLogger,
    ) -> Self {
        Self {
            supervisor,
            settings,
            eval_bar,
            status: Status::Off,
            presenter,
            journal,
        }
    }

    #[allow(dead_code)]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[allow(dead_code)]
    pub fn eval_bar(&self) -> &EvalBar {
        &self.eval_bar
    }

    #[allow(dead_code)]
    pub fn status(&self) -> Status {
        self.status
    }

    #[allow(dead_code)]
    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    #[allow(dead_code)]
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Launch the engine with the current settings
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        let result = self.supervisor.start(&self.settings);
        match &result {
            Ok(()) => self.eval_bar.reset(),
            Err(e) => self.presenter.show_error(&format!("Could not start engine: {}", e)),
        }
        self.refresh_status();
        result
    }

    pub fn stop(&mut self) -> Result<(), SupervisorError> {
        let result = self.supervisor.stop();
        if let Err(e) = &result {
            self.presenter.show_error(&format!("Could not stop engine: {}", e));
        }
        self.refresh_status();
        result
    }

    /// Apply a settings change. While the engine runs the settings file is
    /// rewritten so it takes effect without a restart.
    pub fn apply_change(&mut self, change: SettingsChange) -> Result<bool, SettingsError> {
        let changed = match self.settings.apply(change) {
            Ok(changed) => changed,
            Err(e) => {
                self.record(format!("Rejected settings change: {}", e));
                self.presenter.show_error(&e.to_string());
                return Err(e);
            }
        };

        if changed && self.supervisor.is_running() {
            if let Err(e) = self.supervisor.sync_settings(&self.settings) {
                self.presenter.show_error(&e.to_string());
            }
        }
        self.refresh_status();
        Ok(changed)
    }

    /// Process one queued message
    pub fn handle(&mut self, message: UiMessage) -> Flow {
        match message {
            UiMessage::Evaluation { run_id, raw } => self.on_evaluation(run_id, &raw),
            UiMessage::ChildExited { run_id, exit_code } => self.on_child_exited(run_id, exit_code),
            UiMessage::Command(command) => return self.execute(command),
            UiMessage::Shutdown => {
                info!("Shutdown requested");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    /// Drive the UI until shutdown, then stop the engine and wait briefly
    /// for its exit to be recorded
    pub async fn run(mut self, rx: UiReceiver) {
        let mut messages = UnboundedReceiverStream::new(rx);

        while let Some(message) = messages.next().await {
            if self.handle(message) == Flow::Exit {
                break;
            }
        }

        if let Err(e) = self.stop() {
            warn!("Stop on shutdown failed: {}", e);
        }
        if !self.supervisor.has_pending_exits() {
            return;
        }

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while let Some(message) = messages.next().await {
                if let UiMessage::ChildExited { run_id, exit_code } = message {
                    self.supervisor.handle_exit(run_id, exit_code);
                    if !self.supervisor.has_pending_exits() {
                        break;
                    }
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("Engine did not report its exit within {:?}", SHUTDOWN_GRACE);
        }
    }

    /// Apply an evaluation, unless it was produced by a run other than the
    /// active one (already stopped, or replaced by a restart)
    fn on_evaluation(&mut self, run_id: Uuid, raw: &str) {
        if self.supervisor.run_id() != Some(run_id) {
            debug!("Ignoring evaluation {:?} from inactive run {}", raw, run_id);
            return;
        }
        match self.eval_bar.on_evaluation(raw) {
            Ok(_) => self.presenter.show_evaluation(&self.eval_bar),
            Err(e) => self.record(format!("Discarded evaluation {:?}: {}", raw, e)),
        }
    }

    fn on_child_exited(&mut self, run_id: Uuid, exit_code: Option<i32>) {
        if let Some(report) = self.supervisor.handle_exit(run_id, exit_code) {
            self.refresh_status();
            self.presenter.show_crash(&report);
            self.supervisor.acknowledge_crash();
        }
        self.refresh_status();
    }

    fn execute(&mut self, command: UserCommand) -> Flow {
        debug!("Command: {:?}", command);
        match command {
            UserCommand::Start => {
                if let Err(e) = self.start() {
                    debug!("Start failed: {}", e);
                }
            }
            UserCommand::Stop => {
                if let Err(e) = self.stop() {
                    debug!("Stop failed: {}", e);
                }
            }
            UserCommand::Status => {
                let process = match (self.supervisor.pid(), self.supervisor.started_at()) {
                    (Some(pid), Some(since)) => format!("pid {} since {}", pid, since.format("%H:%M:%S")),
                    _ => "no engine".to_string(),
                };
                let line = format!(
                    "status: {} | {} | {} | eval {}",
                    self.status,
                    process,
                    self.settings.summary(),
                    self.eval_bar.render()
                );
                self.presenter.show_info(&line);
            }
            UserCommand::Help => self.presenter.show_info(HELP_TEXT),
            UserCommand::Quit => return Flow::Exit,
            UserCommand::Change(change) => {
                if let Ok(true) = self.apply_change(change) {
                    self.presenter.show_info(&format!("settings: {}", self.settings.summary()));
                }
            }
        }
        Flow::Continue
    }

    fn refresh_status(&mut self) {
        let status = Status::from_state(self.supervisor.state(), self.settings.enabled);
        if status != self.status {
            self.status = status;
            self.presenter.show_status(status);
        }
    }

    fn record(&self, text: String) {
        if let Err(e) = self.journal.append(&LogRecord::supervisor(text)) {
            warn!("Failed to write supervisor log: {}", e);
        }
    }
}
