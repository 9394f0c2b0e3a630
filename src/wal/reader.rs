// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! WAL Reader for replay.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use super::{LogRecord, WalError, WalResult};

/// Sequential reader over a log file, front to back.
pub struct WalReader {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl WalReader {
    /// Open a WAL file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> WalResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    /// Like [`WalReader::open`], but a missing file is `Ok(None)`.
    pub fn open_if_exists<P: AsRef<Path>>(path: P) -> WalResult<Option<Self>> {
        match Self::open(path) {
            Ok(reader) => Ok(Some(reader)),
            Err(WalError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Iterator for WalReader {
    type Item = WalResult<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(WalError::Io(e))),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }
            return Some(LogRecord::decode(&line, self.line_no));
        }
    }
}
