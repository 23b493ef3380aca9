//! Lifecycle of the external engine process.
//!
//! The supervisor owns at most one child at a time. Starting writes the
//! settings file, spawns the engine with `--settings-file <path>`, and
//! hands each output pipe to a [`StreamReader`] task. A watcher task owns
//! the `Child` itself and reports its exit to the UI queue tagged with the
//! run id it was started under.
//!
//! An exit is expected exactly when `stop()` already detached that run:
//! `stop()` clears the active run before signalling the kill, so by the
//! time the exit report is handled on the UI task it no longer matches
//! and is recorded silently. Any other exit is a crash.

use crate::framework::analyzers::{FileLogger, OutputAnalyzer, TelemetryForwarder};
use crate::framework::config::{ConfigError, ConfigStore, EngineSettings};
use crate::framework::core::{LogRecord, LogSource};
use crate::framework::runners::{Runner, StreamReader};
use crate::framework::ui::{UiHandle, UiMessage};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Running,
    /// Exited without being asked to; cleared once the user has been told
    Crashed,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("engine is already running")]
    AlreadyRunning,
    #[error("failed to launch {program}: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] ConfigError),
}

/// An exit nobody asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub run_id: Uuid,
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "Engine crashed (exit code {})", code),
            None => write!(f, "Engine crashed (terminated by signal)"),
        }
    }
}

/// How to launch the engine
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Echo child output to the console as well as the log
    pub echo_output: bool,
}

impl SupervisorConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            echo_output: false,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    /// Short name for log prefixes
    fn label(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.clone())
    }
}

struct ActiveChild {
    run_id: Uuid,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    kill_tx: Option<oneshot::Sender<()>>,
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    store: ConfigStore,
    journal: FileLogger,
    ui: UiHandle,
    state: ProcessState,
    active: Option<ActiveChild>,
    /// Runs that were stopped but whose exit has not been reported yet
    stopping: HashSet<Uuid>,
    last_exit_code: Option<i32>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig, store: ConfigStore, journal: FileLogger, ui: UiHandle) -> Self {
        Self {
            config,
            store,
            journal,
            ui,
            state: ProcessState::Stopped,
            active: None,
            stopping: HashSet::new(),
            last_exit_code: None,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }

    pub fn pid(&self) -> Option<u32> {
        self.active.as_ref().and_then(|active| active.pid)
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|active| active.run_id)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.active.as_ref().map(|active| active.started_at)
    }

    #[allow(dead_code)]
    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    pub fn has_pending_exits(&self) -> bool {
        !self.stopping.is_empty()
    }

    /// Write `settings` and launch the engine.
    ///
    /// Nothing is spawned if the settings file cannot be written. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self, settings: &EngineSettings) -> Result<(), SupervisorError> {
        if self.state == ProcessState::Running {
            return Err(SupervisorError::AlreadyRunning);
        }

        if let Err(e) = self.store.write(settings) {
            self.record(format!("Not starting engine: {}", e));
            return Err(e.into());
        }
        let settings_path = std::fs::canonicalize(self.store.path())
            .unwrap_or_else(|_| self.store.path().to_path_buf());

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg("--settings-file")
            .arg(&settings_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.record(format!("Failed to launch {}: {}", self.config.program, source));
                return Err(SupervisorError::SpawnFailure {
                    program: self.config.program.clone(),
                    source,
                });
            }
        };

        let run_id = Uuid::new_v4();
        let pid = child.id();
        let started_at = Utc::now();

        if let Some(stdout) = child.stdout.take() {
            self.spawn_reader(LogSource::Stdout, stdout, run_id);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_reader(LogSource::Stderr, stderr, run_id);
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        spawn_exit_watcher(child, run_id, kill_rx, self.ui.clone());

        self.active = Some(ActiveChild {
            run_id,
            pid,
            started_at,
            kill_tx: Some(kill_tx),
        });
        self.state = ProcessState::Running;

        let pid_text = pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string());
        info!(
            "Started {} (pid {}, run {}) with {}",
            self.config.program,
            pid_text,
            run_id,
            settings_path.display()
        );
        self.record(format!(
            "Engine started at {} pid={} run={} settings={}",
            started_at.to_rfc3339(),
            pid_text,
            run_id,
            settings_path.display()
        ));
        Ok(())
    }

    /// Terminate the running engine. The exit that follows is treated as
    /// expected. Succeeds without doing anything when nothing is running.
    ///
    /// The kill itself happens on the watcher task, so a failure to kill is
    /// logged there rather than returned here.
    pub fn stop(&mut self) -> Result<(), SupervisorError> {
        let Some(mut active) = self.active.take() else {
            if self.state == ProcessState::Crashed {
                self.state = ProcessState::Stopped;
            }
            debug!("Stop requested with no engine running");
            return Ok(());
        };

        self.state = ProcessState::Stopped;
        self.stopping.insert(active.run_id);
        if let Some(kill_tx) = active.kill_tx.take() {
            // Err means the watcher already saw the exit
            if kill_tx.send(()).is_err() {
                debug!("Engine run {} had already exited when stopped", active.run_id);
            }
        }

        info!("Stopping engine run {}", active.run_id);
        self.record(format!("Engine stop requested run={}", active.run_id));
        Ok(())
    }

    /// Record an exit reported by a watcher. Returns a crash report when
    /// the exiting run was still the active one.
    pub fn handle_exit(&mut self, run_id: Uuid, exit_code: Option<i32>) -> Option<CrashReport> {
        self.last_exit_code = exit_code;
        let code_text = exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());

        match &self.active {
            Some(active) if active.run_id == run_id => {
                self.active = None;
                self.state = ProcessState::Crashed;
                error!("Engine run {} exited unexpectedly ({})", run_id, code_text);
                self.record(format!("Engine exited unexpectedly run={} exit={}", run_id, code_text));
                Some(CrashReport { run_id, exit_code })
            }
            _ => {
                self.stopping.remove(&run_id);
                info!("Engine run {} exited ({})", run_id, code_text);
                self.record(format!("Engine exited run={} exit={}", run_id, code_text));
                None
            }
        }
    }

    /// The user has seen the crash notice
    pub fn acknowledge_crash(&mut self) {
        if self.state == ProcessState::Crashed {
            self.state = ProcessState::Stopped;
        }
    }

    /// Rewrite the settings file so the running engine picks up changes
    pub fn sync_settings(&self, settings: &EngineSettings) -> Result<(), ConfigError> {
        self.store.write(settings).inspect_err(|e| {
            self.record(format!("Settings update failed: {}", e));
        })?;
        debug!("Settings synced: {}", settings.summary());
        Ok(())
    }

    fn spawn_reader<R>(&self, source: LogSource, pipe: R, run_id: Uuid)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let label = self.config.label();
        let mut reader = StreamReader::new(source, pipe)
            .with_label(label.clone())
            .add_analyzer(Box::new(self.journal.clone()))
            .add_analyzer(Box::new(TelemetryForwarder::new(self.ui.clone(), run_id)));
        if self.config.echo_output {
            reader = reader.add_analyzer(Box::new(OutputAnalyzer::with_prefix(label)));
        }

        tokio::spawn(async move {
            if let Err(e) = reader.drain().await {
                warn!("{} reader failed: {}", source, e);
            }
        });
    }

    fn record(&self, text: String) {
        if let Err(e) = self.journal.append(&LogRecord::supervisor(text)) {
            warn!("Failed to write supervisor log {}: {}", self.journal.path().display(), e);
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Some(kill_tx) = active.kill_tx.take() {
                let _ = kill_tx.send(());
            }
        }
    }
}

/// Wait for the child to exit, or kill it when asked, then report the exit
/// on the UI queue
fn spawn_exit_watcher(mut child: Child, run_id: Uuid, kill_rx: oneshot::Receiver<()>, ui: UiHandle) {
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill_rx => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill engine run {}: {}", run_id, e);
                }
                child.wait().await
            }
        };

        let exit_code = match status {
            Ok(status) => {
                debug!("Engine run {} finished: {}", run_id, status);
                status.code()
            }
            Err(e) => {
                warn!("Failed to collect exit status of run {}: {}", run_id, e);
                None
            }
        };

        if !ui.post(UiMessage::ChildExited { run_id, exit_code }) {
            debug!("UI gone, exit of run {} not reported", run_id);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor_in(dir: &Path, program: &str) -> (ProcessSupervisor, crate::framework::ui::UiReceiver) {
        let (ui, rx) = UiHandle::channel();
        let journal = FileLogger::new(dir.join("supervisor.log")).unwrap();
        let supervisor = ProcessSupervisor::new(
            SupervisorConfig::new(program),
            ConfigStore::new(dir),
            journal,
            ui,
        );
        (supervisor, rx)
    }

    #[test]
    fn test_config_label_uses_file_name() {
        assert_eq!(SupervisorConfig::new("/opt/engine/run.sh").label(), "run.sh");
        assert_eq!(SupervisorConfig::new("python3").label(), "python3");
    }

    #[test]
    fn test_crash_report_text() {
        let report = CrashReport {
            run_id: Uuid::nil(),
            exit_code: Some(3),
        };
        assert_eq!(report.to_string(), "Engine crashed (exit code 3)");
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut supervisor, mut rx) = supervisor_in(dir.path(), "unused");

        assert!(supervisor.stop().is_ok());
        assert!(supervisor.stop().is_ok());

        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert!(!supervisor.has_pending_exits());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (mut supervisor, _rx) = supervisor_in(dir.path(), "/nonexistent/engine-binary");

        let err = supervisor.start(&EngineSettings::default()).unwrap_err();
        assert!(matches!(err, SupervisorError::SpawnFailure { .. }));
        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert!(supervisor.run_id().is_none());

        // Settings are written before the launch is attempted
        assert!(dir.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn test_settings_write_failure_aborts_start() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("engine");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let (ui, _rx) = UiHandle::channel();
        let journal = FileLogger::new(dir.path().join("supervisor.log")).unwrap();
        let mut supervisor = ProcessSupervisor::new(
            SupervisorConfig::new("sh"),
            ConfigStore::new(&blocker),
            journal,
            ui,
        );

        let err = supervisor.start(&EngineSettings::default()).unwrap_err();
        assert!(matches!(err, SupervisorError::Io(_)));
        assert_eq!(supervisor.state(), ProcessState::Stopped);
    }

    #[test]
    fn test_unknown_exit_is_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let (mut supervisor, _rx) = supervisor_in(dir.path(), "unused");

        assert_eq!(supervisor.handle_exit(Uuid::new_v4(), Some(1)), None);
        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert_eq!(supervisor.last_exit_code(), Some(1));
    }
}
