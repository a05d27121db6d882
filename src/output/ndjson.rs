//! Newline-delimited JSON stream writer and reader

use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult, RecordWriter};

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// NDJSON writer for one resource stream
pub struct NdjsonWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records_written: u64,
}

impl NdjsonWriter {
    /// Create (or truncate) the stream at `path`, creating parent directories.
    pub fn create<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        let path = path.as_ref();
        debug!("Opening NDJSON stream: path={}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;

        Ok(Self {
            writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file),
            path: path.to_path_buf(),
            records_written: 0,
        })
    }

    /// Records written so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Stream location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordWriter for NdjsonWriter {
    fn write_record<T: Serialize + ?Sized>(&mut self, record: &T) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| OutputError::SerializationError(format!("Failed to write record: {e}")))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| OutputError::IoError(format!("Failed to write newline: {e}")))?;
        self.records_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let file = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {e}")))?;
        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

        info!(
            path = %self.path.display(),
            records = self.records_written,
            "Stream closed"
        );
        Ok(())
    }
}

/// Open a stream for reading, one record at a time in file order.
///
/// Blank lines are skipped. A line that is not valid JSON is an error: the
/// writer only ever produces whole lines, so a bad line means the file was
/// touched by something else.
pub fn read_records<P: AsRef<Path>>(path: P) -> OutputResult<RecordStream> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| OutputError::IoError(format!("Failed to open {}: {e}", path.display())))?;

    Ok(RecordStream {
        lines: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file).lines(),
        path: path.display().to_string(),
        line: 0,
    })
}

/// Records of an NDJSON stream, parsed lazily
pub struct RecordStream {
    lines: Lines<BufReader<File>>,
    path: String,
    line: usize,
}

impl Iterator for RecordStream {
    type Item = OutputResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(OutputError::IoError(format!("Failed to read line: {e}")))),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|e| OutputError::MalformedRecord {
                path: self.path.clone(),
                line: self.line,
                message: e.to_string(),
            }));
        }
    }
}
