//! Reader for persisted recording files.
//!
//! A recording is a plain concatenation of header + payload records (see
//! [`crate::wire`]). A truncated final record — short header or short
//! payload, as left behind by an abrupt crash — is not a valid record:
//! the reader stops before it and reports the truncation instead of
//! guessing at completion.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{RecorderError, Result};
use crate::wire::{RecordHeader, RECORD_HEADER_LEN};

/// One fully persisted record read back from a recording file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub sequence: u64,
    pub timestamp_micros: u64,
    pub payload: Bytes,
}

/// Sequential reader over a recording file.
pub struct RecordReader {
    data: Vec<u8>,
    position: usize,
    truncated_tail: bool,
}

impl RecordReader {
    /// Open a recording file, loading it into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf: PathBuf = path.as_ref().to_path_buf();
        let data = std::fs::read(&path_buf)
            .map_err(|e| RecorderError::io_error("read recording", path_buf, e))?;
        Ok(Self::from_bytes(data))
    }

    /// Create a reader over raw recording bytes (for testing).
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into(), position: 0, truncated_tail: false }
    }

    /// Read the next complete record.
    ///
    /// Returns `Ok(None)` at the end of the file, including when only a
    /// truncated record remains (check [`RecordReader::truncated_tail`]).
    /// A header with an implausible payload length is an integrity error,
    /// not truncation.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let remaining = self.data.len() - self.position;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < RECORD_HEADER_LEN {
            self.truncated_tail = true;
            self.position = self.data.len();
            return Ok(None);
        }

        let header_buf: [u8; RECORD_HEADER_LEN] = self.data
            [self.position..self.position + RECORD_HEADER_LEN]
            .try_into()
            .expect("slice is RECORD_HEADER_LEN bytes");
        let header = RecordHeader::decode(&header_buf)?;

        let payload_start = self.position + RECORD_HEADER_LEN;
        let payload_end = payload_start + header.payload_len as usize;
        if payload_end > self.data.len() {
            self.truncated_tail = true;
            self.position = self.data.len();
            return Ok(None);
        }

        self.position = payload_end;
        Ok(Some(Record {
            sequence: header.sequence,
            timestamp_micros: header.timestamp_micros,
            payload: Bytes::copy_from_slice(&self.data[payload_start..payload_end]),
        }))
    }

    /// Read every complete record in the file.
    pub fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Whether the file ended in an incomplete record.
    pub fn truncated_tail(&self) -> bool {
        self.truncated_tail
    }
}
