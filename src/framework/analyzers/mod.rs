use crate::framework::runners::RecordStream;
use async_trait::async_trait;

/// Type alias for errors that can be sent between threads
pub type AnalyzerError = Box<dyn std::error::Error + Send + Sync>;

/// Base trait for all analyzers that process record streams
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Process a record stream and return a processed stream
    async fn process(&mut self, stream: RecordStream) -> Result<RecordStream, AnalyzerError>;

    /// Get the name of this analyzer
    #[allow(dead_code)]
    fn name(&self) -> &str;
}

pub mod common;
pub mod file_logger;
pub mod output;
pub mod telemetry;

pub use file_logger::FileLogger;
pub use output::OutputAnalyzer;
pub use telemetry::{classify_from, parse_score, ScoreParseError, TelemetryForwarder};
