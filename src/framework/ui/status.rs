use crate::framework::supervisor::ProcessState;
use std::fmt;

/// What the status indicator shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Off,
    Running,
    /// Engine is alive but told to stay idle (`enabled = false`)
    Paused,
}

impl Status {
    pub fn from_state(state: ProcessState, enabled: bool) -> Self {
        match state {
            ProcessState::Running if enabled => Status::Running,
            ProcessState::Running => Status::Paused,
            ProcessState::Stopped | ProcessState::Crashed => Status::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Off => "off",
            Status::Running => "running",
            Status::Paused => "paused",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
