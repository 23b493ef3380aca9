use super::{Analyzer, AnalyzerError, common};
use crate::framework::core::LogRecord;
use crate::framework::runners::RecordStream;
use async_trait::async_trait;
use futures::stream::StreamExt;
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Configuration for log rotation
#[derive(Debug, Clone)]
pub struct LogRotationConfig {
    /// Maximum size of a single log file in bytes
    pub max_file_size: u64,

    /// Maximum number of rotated log files to keep (excluding current)
    pub max_files: usize,

    /// Check file size every N records
    pub size_check_interval: u64,
}

impl Default for LogRotationConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10_000_000, // 10MB
            max_files: 5,
            size_check_interval: 100,
        }
    }
}

/// Durable, append-only log sink.
///
/// One JSON object per line: `{"timestamp":..,"source":..,"text":..}`.
/// Cloning shares the underlying file handle, so both stream readers and
/// the supervisor can append to the same file. Used as an analyzer it
/// writes every record passing through and forwards it unchanged.
#[derive(Clone)]
pub struct FileLogger {
    file_path: PathBuf,
    file_handle: Arc<Mutex<File>>,
    rotation_config: Option<LogRotationConfig>,
    record_count: Arc<AtomicU64>,
}

impl FileLogger {
    /// Create a new FileLogger appending to `file_path` (no rotation)
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, std::io::Error> {
        Self::open(file_path.as_ref(), None)
    }

    /// Create FileLogger with rotation configuration
    pub fn with_rotation<P: AsRef<Path>>(
        file_path: P,
        config: LogRotationConfig,
    ) -> Result<Self, std::io::Error> {
        Self::open(file_path.as_ref(), Some(config))
    }

    /// Convenience method for simple size-based rotation
    pub fn with_max_size<P: AsRef<Path>>(
        file_path: P,
        max_size_mb: u64,
    ) -> Result<Self, std::io::Error> {
        let config = LogRotationConfig {
            max_file_size: max_size_mb * 1_000_000,
            ..Default::default()
        };
        Self::with_rotation(file_path, config)
    }

    fn open(file_path: &Path, rotation_config: Option<LogRotationConfig>) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(file_path)?;

        Ok(Self {
            file_path: file_path.to_path_buf(),
            file_handle: Arc::new(Mutex::new(file)),
            rotation_config,
            record_count: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append a single record and flush it to disk
    pub fn append(&self, record: &LogRecord) -> Result<(), std::io::Error> {
        if let Some(config) = &self.rotation_config {
            let count = self.record_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % config.size_check_interval.max(1) == 0 {
                if let Ok(metadata) = std::fs::metadata(&self.file_path) {
                    if metadata.len() > config.max_file_size {
                        self.perform_rotation(config);
                    }
                }
            }
        }

        let entry = LogRecord {
            timestamp: record.timestamp,
            source: record.source,
            text: common::data_to_string(&record.text),
        };
        let mut line = entry.to_json().map_err(std::io::Error::other)?;
        line.push('\n');

        let mut file = self
            .file_handle
            .lock()
            .map_err(|_| std::io::Error::other("log file lock poisoned"))?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    /// Shift `<log>.N` -> `<log>.N+1`, move the live file to `<log>.1` and
    /// reopen an empty live file
    fn perform_rotation(&self, config: &LogRotationConfig) {
        let Ok(mut file) = self.file_handle.lock() else {
            return;
        };
        let _ = file.flush();

        let base = self.file_path.to_string_lossy().to_string();
        for i in (1..config.max_files).rev() {
            let old_path = format!("{}.{}", base, i);
            let new_path = format!("{}.{}", base, i + 1);

            if Path::new(&old_path).exists() {
                if let Err(e) = std::fs::rename(&old_path, &new_path) {
                    warn!("FileLogger: Failed to rotate {} to {}: {}", old_path, new_path, e);
                }
            }
        }

        let rotated_path = format!("{}.1", base);
        if let Err(e) = std::fs::rename(&self.file_path, &rotated_path) {
            warn!("FileLogger: Failed to rotate current file to {}: {}", rotated_path, e);
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.file_path)
        {
            Ok(new_file) => *file = new_file,
            Err(e) => warn!("FileLogger: Failed to create new log file after rotation: {}", e),
        }

        let cleanup_path = format!("{}.{}", base, config.max_files + 1);
        if Path::new(&cleanup_path).exists() {
            if let Err(e) = std::fs::remove_file(&cleanup_path) {
                warn!("FileLogger: Failed to cleanup old log file {}: {}", cleanup_path, e);
            }
        }
        debug!("FileLogger: rotated {}", base);
    }
}

#[async_trait]
impl Analyzer for FileLogger {
    async fn process(&mut self, stream: RecordStream) -> Result<RecordStream, AnalyzerError> {
        let logger = self.clone();

        let processed_stream = stream.map(move |record| {
            if let Err(e) = logger.append(&record) {
                warn!("FileLogger: Failed to write to {}: {}", logger.file_path.display(), e);
            }
            record
        });

        Ok(Box::pin(processed_stream))
    }

    fn name(&self) -> &str {
        "FileLogger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::core::LogSource;
    use futures::stream;
    use tempfile::NamedTempFile;

    fn read_records(path: &Path) -> Vec<LogRecord> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_file_logger_creation() {
        let temp_file = NamedTempFile::new().unwrap();
        let logger = FileLogger::new(temp_file.path()).unwrap();
        assert_eq!(logger.name(), "FileLogger");
        assert_eq!(logger.path(), temp_file.path());
    }

    #[tokio::test]
    async fn test_file_logger_processes_records() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut logger = FileLogger::new(temp_file.path()).unwrap();

        let records = vec![
            LogRecord::new(LogSource::Stdout, "EVAL:+0.35"),
            LogRecord::new(LogSource::Stderr, "Traceback (most recent call last):"),
        ];
        let input_stream: RecordStream = Box::pin(stream::iter(records.clone()));
        let output_stream = logger.process(input_stream).await.unwrap();

        let collected: Vec<_> = output_stream.collect().await;
        assert_eq!(collected, records);

        let written = read_records(temp_file.path());
        assert_eq!(written, records);
    }

    #[tokio::test]
    async fn test_file_logger_appends_across_instances() {
        let temp_file = NamedTempFile::new().unwrap();
        FileLogger::new(temp_file.path())
            .unwrap()
            .append(&LogRecord::supervisor("first run"))
            .unwrap();
        FileLogger::new(temp_file.path())
            .unwrap()
            .append(&LogRecord::supervisor("second run"))
            .unwrap();

        let written = read_records(temp_file.path());
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].text, "first run");
        assert_eq!(written[1].text, "second run");
    }

    #[tokio::test]
    async fn test_clones_share_the_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let logger = FileLogger::new(temp_file.path()).unwrap();
        let clone = logger.clone();

        logger.append(&LogRecord::supervisor("a")).unwrap();
        clone.append(&LogRecord::new(LogSource::Stdout, "b")).unwrap();

        assert_eq!(read_records(temp_file.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_file_logger_with_binary_data() {
        let temp_file = NamedTempFile::new().unwrap();
        let logger = FileLogger::new(temp_file.path()).unwrap();

        logger
            .append(&LogRecord::new(LogSource::Stdout, "\x00\x01\x02"))
            .unwrap();

        let file_contents = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(file_contents.contains("HEX:000102"));
    }

    #[tokio::test]
    async fn test_rotation_config_default() {
        let config = LogRotationConfig::default();
        assert_eq!(config.max_file_size, 10_000_000);
        assert_eq!(config.max_files, 5);
        assert_eq!(config.size_check_interval, 100);
    }

    #[tokio::test]
    async fn test_file_logger_with_max_size() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let logger = FileLogger::with_max_size(&log_path, 5).unwrap();
        assert_eq!(logger.rotation_config.as_ref().unwrap().max_file_size, 5_000_000);
    }

    #[tokio::test]
    async fn test_rotation_on_size_limit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let config = LogRotationConfig {
            max_file_size: 50,
            max_files: 2,
            size_check_interval: 1,
        };
        let logger = FileLogger::with_rotation(&log_path, config).unwrap();

        let record = LogRecord::new(
            LogSource::Stdout,
            "This is a long line that should trigger rotation when written more than once",
        );
        for _ in 0..3 {
            logger.append(&record).unwrap();
        }

        let rotated_path = format!("{}.1", log_path.to_string_lossy());
        assert!(Path::new(&rotated_path).exists());
        assert!(log_path.exists());
    }

    #[tokio::test]
    async fn test_max_files_cleanup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let config = LogRotationConfig {
            max_file_size: 30,
            max_files: 2,
            size_check_interval: 1,
        };
        let logger = FileLogger::with_rotation(&log_path, config).unwrap();

        let record = LogRecord::new(LogSource::Stdout, "Large line that will cause rotation");
        for _ in 0..50 {
            logger.append(&record).unwrap();
        }

        let log_3 = format!("{}.3", log_path.to_string_lossy());
        assert!(!Path::new(&log_3).exists());
        assert!(Path::new(&format!("{}.2", log_path.to_string_lossy())).exists());
    }

    #[tokio::test]
    async fn test_no_rotation_when_disabled() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut logger = FileLogger::new(temp_file.path()).unwrap();

        let record = LogRecord::new(LogSource::Stdout, "x".repeat(1000));
        let input_stream: RecordStream = Box::pin(stream::iter(vec![record; 100]));
        let collected: Vec<_> = logger.process(input_stream).await.unwrap().collect().await;
        assert_eq!(collected.len(), 100);

        let rotated_path = format!("{}.1", temp_file.path().to_string_lossy());
        assert!(!Path::new(&rotated_path).exists());
    }

    #[tokio::test]
    async fn test_size_check_interval_optimization() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let config = LogRotationConfig {
            max_file_size: 50,
            max_files: 2,
            size_check_interval: 10,
        };
        let logger = FileLogger::with_rotation(&log_path, config).unwrap();

        let record = LogRecord::new(LogSource::Stdout, "a line long enough to pass fifty bytes");
        for _ in 0..5 {
            logger.append(&record).unwrap();
        }

        let rotated_path = format!("{}.1", log_path.to_string_lossy());
        assert!(!Path::new(&rotated_path).exists());
    }
}
