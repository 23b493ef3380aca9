//! The single-threaded UI side of the supervisor.
//!
//! Everything user-visible (status indicator, evaluation bar, crash
//! notices, the settings snapshot) is owned by one task, the
//! [`ControlSurface`]. Background work (stream readers, the exit watcher,
//! the signal handler, the stdin command reader) never touches that state
//! directly: it posts a [`UiMessage`] through a [`UiHandle`] and moves on.

use tokio::sync::mpsc;
use uuid::Uuid;

pub mod command;
pub mod presenter;
pub mod status;
pub mod surface;
pub mod visualizer;


pub use command::UserCommand;
pub use presenter::ConsolePresenter;
pub use surface::ControlSurface;
pub use visualizer::EvalBar;

/// Work marshalled onto the UI task
#[derive(Debug, Clone, PartialEq)]
pub enum UiMessage {
    /// Raw evaluation payload extracted from an engine output line of the
    /// launch identified by `run_id`
    Evaluation { run_id: Uuid, raw: String },
    /// A child process exited; `run_id` identifies which launch it was
    ChildExited { run_id: Uuid, exit_code: Option<i32> },
    /// A command typed by the user
    Command(UserCommand),
    /// Stop the engine and leave the UI loop
    Shutdown,
}

pub type UiReceiver = mpsc::UnboundedReceiver<UiMessage>;

/// Cloneable, non-blocking sender into the UI queue
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiMessage>,
}

impl UiHandle {
    pub fn channel() -> (Self, UiReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `message` for the UI task. Returns false once the UI has gone
    /// away; callers treat that as "nobody is listening" rather than an error.
    pub fn post(&self, message: UiMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    #[allow(dead_code)]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
