//! Sink interfaces a [`crate::poller::Poller`] publishes samples to.
//!
//! `SampleSink` is the CSV-style whole-cycle sink; this module provides its
//! only implementation, [`CsvSampleSink`], matching the source's
//! `PLC_Data/<plc_name>/<plc_name>_<timestamp>.csv` tree. `PublishSink` is
//! the OPC UA publish boundary — specified as a trait only, since the OPC UA
//! node mapper and client are an external collaborator (see `SPEC_FULL.md`
//! §1, §9). [`NoopPublishSink`] is provided for integration testing.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::data_type::Value;

/// Errors a sink implementation can report.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Failed to create the sink's backing file or directory.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV writer reported an error.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// A row did not have the same column count as the header.
    #[error("row has {got} columns, expected {expected}")]
    ColumnCountMismatch {
        /// Column count established by the header row.
        expected: usize,
        /// Column count the offending row carried.
        got: usize,
    },
}

/// Consumes one polling cycle's worth of samples as an ordered row.
///
/// A `SampleSink` owns its own backing resource (a file, in
/// [`CsvSampleSink`]'s case) and is confined to the `Poller` that created it.
pub trait SampleSink: Send {
    /// Appends one row: a timestamp followed by `columns` in the same order
    /// as the first call's columns (the header order). `None` values are
    /// written as `NaN`, matching the source's CSV writer.
    fn write(&mut self, timestamp: NaiveDateTime, columns: &[(String, Option<Value>)]) -> Result<(), SinkError>;
}

/// CSV-backed `SampleSink`.
///
/// Writes one file per PLC per process start, at
/// `PLC_Data/<plc_name>/<plc_name>_<yyyymmdd_HHMMSS>.csv`. The header row
/// (`Timestamp`, then one column per mapped tag) is written on the first
/// call; every later row must carry the same column count.
pub struct CsvSampleSink {
    writer: csv::Writer<File>,
    path: PathBuf,
    column_count: Option<usize>,
}

impl CsvSampleSink {
    /// Creates the sink's CSV file (and `PLC_Data/<plc_name>/` directory, if
    /// it does not already exist) for `plc_name`, timestamping the filename
    /// with `started_at`.
    pub fn new(plc_name: &str, started_at: NaiveDateTime) -> Result<Self, SinkError> {
        Self::new_in(Path::new("PLC_Data"), plc_name, started_at)
    }

    /// Like [`Self::new`], but rooted at `base_dir` instead of the process's
    /// current directory. Exists mainly so tests do not need to mutate
    /// process-global current-directory state.
    pub fn new_in(base_dir: &Path, plc_name: &str, started_at: NaiveDateTime) -> Result<Self, SinkError> {
        let dir = base_dir.join(plc_name);
        fs::create_dir_all(&dir)?;

        let filename = format!(
            "{plc_name}_{}.csv",
            started_at.format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(filename);

        let file = File::create(&path)?;
        let writer = csv::Writer::from_writer(file);

        Ok(Self {
            writer,
            path,
            column_count: None,
        })
    }

    /// The path this sink is writing to.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SampleSink for CsvSampleSink {
    fn write(&mut self, timestamp: NaiveDateTime, columns: &[(String, Option<Value>)]) -> Result<(), SinkError> {
        match self.column_count {
            None => {
                let mut header = vec!["Timestamp".to_string()];
                header.extend(columns.iter().map(|(tag, _)| tag.clone()));
                self.writer.write_record(&header)?;
                self.column_count = Some(columns.len());
            }
            Some(expected) if expected != columns.len() => {
                return Err(SinkError::ColumnCountMismatch {
                    expected,
                    got: columns.len(),
                });
            }
            Some(_) => {}
        }

        let mut record = vec![timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(columns.iter().map(|(_, value)| match value {
            Some(v) => v.to_string(),
            None => "NaN".to_string(),
        }));
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// A value handed to [`PublishSink::write`].
///
/// `Text` carries the cycle timestamp alongside the string so a downstream
/// consumer (the OPC UA node) can tell a stale string from a fresh one
/// without this crate interpreting the string itself.
#[derive(Debug, Clone)]
pub enum PublishValue {
    /// Decoded `INT16`/`INT32`/`INT64`.
    Int(i64),
    /// Decoded `UINT16`/`UINT32`/`UDINT`/`UINT64`/`BCD2DEC`.
    UInt(u64),
    /// Decoded `FLOAT`/`DOUBLE`.
    Float(f64),
    /// Decoded `BOOL` — already resolved to the bit indicated by the source
    /// address's `.N` suffix by [`crate::data_type::decode`].
    Bool(bool),
    /// Decoded `CHANNEL`/`WORD`/`BIN`/`BITS` text, paired with the cycle
    /// timestamp.
    Text(String, NaiveDateTime),
}

impl PublishValue {
    /// Builds a `PublishValue` from a decoded [`Value`], attaching
    /// `timestamp` to the `Text` case.
    pub fn from_value(value: &Value, timestamp: NaiveDateTime) -> Self {
        match value {
            Value::Int(v) => PublishValue::Int(*v),
            Value::UInt(v) => PublishValue::UInt(*v),
            Value::Float(v) => PublishValue::Float(*v),
            Value::Bool(v) => PublishValue::Bool(*v),
            Value::Text(v) => PublishValue::Text(v.clone(), timestamp),
        }
    }
}

/// Publishes individual `(tag, value)` pairs to an external collaborator
/// (an OPC UA server, in the source). Specified purely as a trait boundary —
/// no OPC UA client is vendored by this crate.
pub trait PublishSink: Send {
    /// Connectivity probe, called once at Poller startup.
    fn probe(&mut self) -> Result<(), SinkError>;

    /// Publishes one tag's value.
    fn write(&mut self, tag: &str, value: PublishValue) -> Result<(), SinkError>;
}

/// A `PublishSink` that only logs what it would have published. Useful for
/// integration tests and for running a Poller with `--csv`-only output.
#[derive(Debug, Default)]
pub struct NoopPublishSink;

impl PublishSink for NoopPublishSink {
    fn probe(&mut self) -> Result<(), SinkError> {
        log::debug!("NoopPublishSink: probe");
        Ok(())
    }

    fn write(&mut self, tag: &str, value: PublishValue) -> Result<(), SinkError> {
        log::debug!("NoopPublishSink: {tag} = {value:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 7, 27)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap()
    }

    #[test]
    fn test_csv_path_format() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSampleSink::new_in(dir.path(), "line1", ts()).unwrap();
        assert_eq!(
            sink.path(),
            dir.path().join("line1/line1_20260727_143005.csv")
        );
    }

    #[test]
    fn test_header_written_once_and_column_count_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSampleSink::new_in(dir.path(), "line1", ts()).unwrap();
        let row1 = vec![
            ("tag1".to_string(), Some(Value::Int(1))),
            ("tag2".to_string(), Some(Value::Bool(true))),
        ];
        sink.write(ts(), &row1).unwrap();
        sink.write(ts(), &row1).unwrap();

        let short_row = vec![("tag1".to_string(), Some(Value::Int(1)))];
        let err = sink.write(ts(), &short_row).unwrap_err();
        assert!(matches!(err, SinkError::ColumnCountMismatch { expected: 2, got: 1 }));

        let contents = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Timestamp,tag1,tag2");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_null_column_renders_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSampleSink::new_in(dir.path(), "line1", ts()).unwrap();
        let row = vec![
            ("tag1".to_string(), Some(Value::Int(1))),
            ("tag2".to_string(), None),
        ];
        sink.write(ts(), &row).unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[1], "2026-07-27 14:30:05,1,NaN");
    }

    #[test]
    fn test_noop_publish_sink_never_errors() {
        let mut sink = NoopPublishSink;
        assert!(sink.probe().is_ok());
        assert!(sink.write("tag1", PublishValue::Bool(true)).is_ok());
    }

    #[test]
    fn test_publish_value_from_value_attaches_timestamp_to_text() {
        let value = Value::Text("1234".to_string());
        match PublishValue::from_value(&value, ts()) {
            PublishValue::Text(text, timestamp) => {
                assert_eq!(text, "1234");
                assert_eq!(timestamp, ts());
            }
            other => panic!("expected Text, got {other:?}"),
        }
    }
}
