// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! WAL Writer for durable transition logging.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{LogRecord, WalResult};

/// Append-only writer. One instance per log file; callers serialize
/// access so lines never interleave.
pub struct WalWriter {
    file: BufWriter<File>,
    path: PathBuf,
    bytes_written: u64,
}

impl WalWriter {
    /// Open or create a WAL file at the specified path.
    ///
    /// A partial last line left by a crash mid-append is terminated first,
    /// so the next record starts on a line of its own.
    pub fn open<P: AsRef<Path>>(path: P) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut bytes_written = file.metadata()?.len();
        if bytes_written > 0 && !ends_with_newline(&mut file)? {
            tracing::warn!("WAL {:?} ends in a partial line; terminating it", path);
            file.write_all(b"\n")?;
            file.sync_all()?;
            bytes_written += 1;
        }

        Ok(Self {
            file: BufWriter::new(file),
            path,
            bytes_written,
        })
    }

    /// Append one record and force it to stable storage.
    ///
    /// Returns only after fsync; an `Err` means the transition must not be
    /// acknowledged.
    pub fn append(&mut self, record: &LogRecord) -> WalResult<()> {
        let mut line = record.encode();
        line.push('\n');

        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;

        self.bytes_written += line.len() as u64;
        metrics::counter!("ratify_wal_appends_total", 1);
        tracing::debug!("WAL append {:?}: {}", self.path, line.trim_end());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes in the file, including lines written before this open.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

fn ends_with_newline(file: &mut File) -> WalResult<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
