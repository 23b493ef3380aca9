//! Extraction of structured telemetry from free-form engine output.
//!
//! The engine's only structured signal is an evaluation score embedded in a
//! plain stdout line after the `EVAL:` marker. Everything that knows about
//! that wire format lives in this module.

use super::{Analyzer, AnalyzerError};
use crate::framework::core::{LogSource, TelemetryEvent};
use crate::framework::runners::RecordStream;
use crate::framework::ui::{UiHandle, UiMessage};
use async_trait::async_trait;
use futures::stream::StreamExt;
use log::debug;
use thiserror::Error;
use uuid::Uuid;

/// Marker preceding an evaluation score in an engine output line
pub const EVAL_MARKER: &str = "EVAL:";

/// Classify a stdout line
#[allow(dead_code)]
pub fn classify(line: &str) -> TelemetryEvent {
    classify_from(LogSource::Stdout, line)
}

/// Classify a line read from `source`.
///
/// The marker may appear anywhere in the line; everything after its first
/// occurrence, trimmed, is the evaluation payload. Unmarked lines become
/// log lines, or error lines when they came from stderr.
pub fn classify_from(source: LogSource, line: &str) -> TelemetryEvent {
    match line.find(EVAL_MARKER) {
        Some(idx) => TelemetryEvent::evaluation(line[idx + EVAL_MARKER.len()..].trim()),
        None if source == LogSource::Stderr => TelemetryEvent::error_line(line),
        None => TelemetryEvent::log_line(line),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreParseError {
    #[error("evaluation carries no score")]
    Missing,
    #[error("evaluation score {0:?} is not a number")]
    Malformed(String),
}

/// Parse the payload of an evaluation event into a score in pawns.
/// A leading `+` sign indicator is accepted.
pub fn parse_score(raw: &str) -> Result<f64, ScoreParseError> {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if unsigned.is_empty() {
        return Err(ScoreParseError::Missing);
    }
    match unsigned.parse::<f64>() {
        Ok(score) if !score.is_nan() => Ok(score),
        _ => Err(ScoreParseError::Malformed(trimmed.to_string())),
    }
}

/// Analyzer that classifies every record and posts evaluation payloads to
/// the UI queue, tagged with the run that produced them. Records pass
/// through unchanged. Blank lines are logged upstream but never classified.
/// Posting never blocks the reader.
pub struct TelemetryForwarder {
    ui: UiHandle,
    run_id: Uuid,
}

impl TelemetryForwarder {
    pub fn new(ui: UiHandle, run_id: Uuid) -> Self {
        Self { ui, run_id }
    }
}

#[async_trait]
impl Analyzer for TelemetryForwarder {
    async fn process(&mut self, stream: RecordStream) -> Result<RecordStream, AnalyzerError> {
        let ui = self.ui.clone();
        let run_id = self.run_id;
        let processed_stream = stream.map(move |record| {
            if record.text.trim().is_empty() {
                return record;
            }
            let event = classify_from(record.source, &record.text);
            if event.is_evaluation() {
                debug!("TelemetryForwarder: evaluation {:?} from run {}", event.payload, run_id);
                let message = UiMessage::Evaluation {
                    run_id,
                    raw: event.payload,
                };
                if !ui.post(message) {
                    debug!("TelemetryForwarder: UI queue closed, dropping evaluation");
                }
            }
            record
        });

        Ok(Box::pin(processed_stream))
    }

    fn name(&self) -> &str {
        "TelemetryForwarder"
    }
}
