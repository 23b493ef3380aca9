use super::common::AnalyzerProcessor;
use super::{RecordStream, Runner, RunnerError};
use crate::framework::analyzers::Analyzer;
use crate::framework::analyzers::common::{preview, strip_ansi_codes};
use crate::framework::core::{LogRecord, LogSource};
use async_trait::async_trait;
use futures::stream::StreamExt;
use log::{debug, warn};
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Boxed byte source a reader consumes (child stdout/stderr, or anything
/// else readable in tests)
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// Consumes one output stream of the child line by line.
///
/// Every line, blank ones included, becomes a [`LogRecord`] tagged with the stream it
/// came from and is pushed through the analyzer chain (log sink, telemetry
/// extraction, console echo). Reading ends when the stream closes, which
/// happens on its own once the child exits or is killed.
pub struct StreamReader {
    source: LogSource,
    label: String,
    reader: Mutex<Option<ByteSource>>,
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl StreamReader {
    pub fn new<R>(source: LogSource, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            source,
            label: "engine".to_string(),
            reader: Mutex::new(Some(Box::new(reader))),
            analyzers: Vec::new(),
        }
    }

    /// Set the label used in diagnostics (usually the program name)
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[allow(dead_code)]
    pub fn source(&self) -> LogSource {
        self.source
    }

    /// Run the reader to completion, returning the number of records that
    /// made it through the analyzer chain
    pub async fn drain(mut self) -> Result<u64, RunnerError> {
        let mut stream = self.run().await?;
        let mut count = 0;
        while stream.next().await.is_some() {
            count += 1;
        }
        debug!("[{}] {} reader finished after {} records", self.label, self.source, count);
        Ok(count)
    }
}

#[async_trait]
impl Runner for StreamReader {
    async fn run(&mut self) -> Result<RecordStream, RunnerError> {
        let source = self.source;
        let reader = self
            .reader
            .get_mut()
            .map_err(|_| format!("{} reader lock poisoned", source))?
            .take()
            .ok_or_else(|| format!("{} stream already consumed", source))?;

        let stream = read_lines(source, self.label.clone(), reader);

        AnalyzerProcessor::process_through_analyzers(stream, &mut self.analyzers).await
    }

    fn add_analyzer(mut self, analyzer: Box<dyn Analyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    fn name(&self) -> &str {
        self.source.as_str()
    }
}

/// Lazily split a byte source into records, one per line
fn read_lines(source: LogSource, label: String, reader: ByteSource) -> RecordStream {
    Box::pin(async_stream::stream! {
        let mut reader = BufReader::new(reader);
        let mut buf: Vec<u8> = Vec::new();
        let mut line_count: u64 = 0;

        debug!("[{}] Reading from {}", label, source);

        loop {
            buf.clear();

            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!("[{}] {} closed (EOF)", label, source);
                    break;
                }
                Ok(_) => {
                    line_count += 1;
                    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
                        buf.pop();
                    }

                    // Malformed UTF-8 is replaced, never fatal
                    let text = match std::str::from_utf8(&buf) {
                        Ok(valid) => strip_ansi_codes(valid).into_owned(),
                        Err(e) => {
                            let hex_preview = buf
                                .iter()
                                .take(32)
                                .map(|b| format!("{:02x}", b))
                                .collect::<Vec<_>>()
                                .join(" ");
                            debug!(
                                "[{}] Invalid UTF-8 on {} line {} ({}), replacing. Hex preview: {}",
                                label, source, line_count, e, hex_preview
                            );
                            strip_ansi_codes(&String::from_utf8_lossy(&buf)).into_owned()
                        }
                    };

                    debug!("[{}] {} line {}: {}", label, source, line_count, preview(&text, 100));
                    yield LogRecord::new(source, text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    debug!("[{}] Read interrupted, retrying...", label);
                    continue;
                }
                Err(e) => {
                    warn!("[{}] Error reading {}: {} (kind: {:?})", label, source, e, e.kind());
                    break;
                }
            }
        }
    })
}
