use super::{RecordStream, RunnerError};
use crate::framework::analyzers::Analyzer;

/// Common analyzer processor for runners
pub struct AnalyzerProcessor;

impl AnalyzerProcessor {
    /// Process records through a chain of analyzers, in insertion order
    pub async fn process_through_analyzers(
        mut stream: RecordStream,
        analyzers: &mut [Box<dyn Analyzer>],
    ) -> Result<RecordStream, RunnerError> {
        for analyzer in analyzers.iter_mut() {
            stream = analyzer.process(stream).await?;
        }

        Ok(stream)
    }
}
