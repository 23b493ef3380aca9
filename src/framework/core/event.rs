use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a durable log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Stdout,
    Stderr,
    Supervisor,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Stdout => "stdout",
            LogSource::Stderr => "stderr",
            LogSource::Supervisor => "supervisor",
        }
    }
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped line destined for the durable log sink.
///
/// Records are append-only: nothing in the crate mutates a record once it
/// has been handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub text: String,
}

impl LogRecord {
    pub fn new(source: LogSource, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            text: text.into(),
        }
    }

    pub fn supervisor(text: impl Into<String>) -> Self {
        Self::new(LogSource::Supervisor, text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryKind {
    Evaluation,
    LogLine,
    ErrorLine,
}

/// Classified line of child output. Ephemeral: produced per line and
/// consumed immediately by the visualizer or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub kind: TelemetryKind,
    /// Raw evaluation text for `Evaluation`, the full line otherwise
    pub payload: String,
}

impl TelemetryEvent {
    pub fn evaluation(payload: impl Into<String>) -> Self {
        Self {
            kind: TelemetryKind::Evaluation,
            payload: payload.into(),
        }
    }

    pub fn log_line(payload: impl Into<String>) -> Self {
        Self {
            kind: TelemetryKind::LogLine,
            payload: payload.into(),
        }
    }

    pub fn error_line(payload: impl Into<String>) -> Self {
        Self {
            kind: TelemetryKind::ErrorLine,
            payload: payload.into(),
        }
    }

    pub fn is_evaluation(&self) -> bool {
        self.kind == TelemetryKind::Evaluation
    }
}
