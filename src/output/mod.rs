//! Append-only record streams
//!
//! Every collector writes newline-delimited JSON, one file per
//! (topic, collection date, resource kind). Streams are opened once per
//! collector invocation, flushed after each page, and synced on close, so a
//! run that stops early leaves truncated but valid output.

use serde::Serialize;

pub mod ndjson;
pub mod path;

pub use ndjson::{read_records, NdjsonWriter, RecordStream};
pub use path::{OutputPathBuilder, ResourceKind};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),

    /// Malformed line while reading a stream back
    #[error("malformed record at {path}:{line}: {message}")]
    MalformedRecord {
        /// Stream file
        path: String,
        /// 1-based line number
        line: usize,
        /// Decoder message
        message: String,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writer of one record stream
pub trait RecordWriter {
    /// Append a single record.
    fn write_record<T: Serialize + ?Sized>(&mut self, record: &T) -> OutputResult<()>;

    /// Append several records in order.
    fn write_records<'a, T, I>(&mut self, records: I) -> OutputResult<()>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Flush buffered records to the file.
    fn flush(&mut self) -> OutputResult<()>;

    /// Flush, sync, and close the stream.
    fn close(self) -> OutputResult<()>;
}

/// In-memory stream, used when records are consumed in-process.
impl RecordWriter for Vec<serde_json::Value> {
    fn write_record<T: Serialize + ?Sized>(&mut self, record: &T) -> OutputResult<()> {
        let value = serde_json::to_value(record)
            .map_err(|e| OutputError::SerializationError(format!("Failed to encode record: {e}")))?;
        self.push(value);
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn close(self) -> OutputResult<()> {
        Ok(())
    }
}
