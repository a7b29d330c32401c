//! JSON export.
//!
//! [`JsonLinesWriter`] appends one compact JSON object per line and flushes
//! after every record, so a reader tailing the file sees each frame as soon as
//! it is analyzed. [`write_json`] writes a single pretty-printed document,
//! used for batch [`AnalysisReport`](crate::AnalysisReport)s.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::AnalyzerError;

/// Append-only JSON-Lines sink, flushed after each record.
///
/// ```
/// use streamscope::{FrameRecord, FrameType, JsonLinesWriter};
///
/// let mut writer = JsonLinesWriter::new(Vec::new());
/// writer.write_record(&FrameRecord::new(0, 0, FrameType::Intra, 1200, 22, true, 0.0))?;
/// let bytes = writer.finish()?;
/// assert!(String::from_utf8_lossy(&bytes).starts_with("{\"pts\":0"));
/// # Ok::<(), streamscope::AnalyzerError>(())
/// ```
#[derive(Debug)]
pub struct JsonLinesWriter<W: Write = BufWriter<File>> {
    writer: W,
    records: u64,
}

impl JsonLinesWriter<BufWriter<File>> {
    /// Create (or truncate) `path` for writing.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        log::debug!("Opening JSON-Lines export: {}", path.display());
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesWriter<W> {
    /// Wrap an arbitrary writer.
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    /// Serialize `record` as one line and flush.
    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), AnalyzerError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush and return the inner writer.
    pub fn finish(mut self) -> Result<W, AnalyzerError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write `value` to `path` as pretty-printed JSON.
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<(), AnalyzerError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
