use super::{Analyzer, AnalyzerError};
use crate::framework::core::{LogRecord, LogSource};
use crate::framework::runners::RecordStream;
use async_trait::async_trait;
use futures::stream::StreamExt;
use log::debug;

/// Output analyzer that echoes child output to the console in real time
pub struct OutputAnalyzer {
    prefix: String,
}

impl OutputAnalyzer {
    /// Create a new OutputAnalyzer with the default `engine` prefix
    pub fn new() -> Self {
        Self::with_prefix("engine")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn format_record(prefix: &str, record: &LogRecord) -> String {
        let marker = match record.source {
            LogSource::Stdout => "|",
            LogSource::Stderr => "!",
            LogSource::Supervisor => "*",
        };
        format!("{}{} {}", prefix, marker, record.text)
    }
}

impl Default for OutputAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for OutputAnalyzer {
    async fn process(&mut self, stream: RecordStream) -> Result<RecordStream, AnalyzerError> {
        let prefix = self.prefix.clone();
        let processed_stream = stream.map(move |record| {
            debug!("OutputAnalyzer: Processing record: {:?}", record);
            let line = Self::format_record(&prefix, &record);

            // Child stderr stays on stderr so it can be redirected separately
            use std::io::{self, Write};
            if record.source == LogSource::Stderr {
                eprintln!("{}", line);
            } else {
                println!("{}", line);
                if let Err(e) = io::stdout().flush() {
                    eprintln!("Warning: Failed to flush stdout: {}", e);
                }
            }

            record
        });

        Ok(Box::pin(processed_stream))
    }

    fn name(&self) -> &str {
        "output"
    }
}
