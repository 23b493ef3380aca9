use crate::framework::core::LogRecord;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Type alias for streams of log records
pub type RecordStream = Pin<Box<dyn Stream<Item = LogRecord> + Send>>;

/// Type alias for errors that can be sent between threads
pub type RunnerError = Box<dyn std::error::Error + Send + Sync>;

/// Base trait for everything that turns a child output source into a
/// stream of log records
#[async_trait]
pub trait Runner: Send + Sync {
    /// Start consuming the source and return the processed record stream
    async fn run(&mut self) -> Result<RecordStream, RunnerError>;

    /// Add an analyzer to this runner's processing chain
    fn add_analyzer(self, analyzer: Box<dyn crate::framework::analyzers::Analyzer>) -> Self
    where
        Self: Sized;

    /// Get the name of this runner
    #[allow(dead_code)]
    fn name(&self) -> &str;
}

pub mod common;
pub mod stream_reader;

pub use stream_reader::StreamReader;
