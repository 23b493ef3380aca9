pub mod event;

pub use event::{LogRecord, LogSource, TelemetryEvent, TelemetryKind};
