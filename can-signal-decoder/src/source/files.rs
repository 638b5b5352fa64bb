//! Multi-file frame log source
//!
//! Chains several delimited frame logs into one lazy source. Files are
//! opened one at a time, in the given order, and every frame is labeled
//! with the stem of the file it came from.

use super::delimited::DelimitedFrameReader;
use crate::types::{FrameRecord, SourceError};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Frame source over a list of log files
pub struct FrameLogFiles {
    pending: VecDeque<PathBuf>,
    current: Option<DelimitedFrameReader<BufReader<File>>>,
    delimiter: char,
    files_opened: usize,
    failed: bool,
}

impl FrameLogFiles {
    /// Create a source over `paths`; nothing is opened until the first pull
    pub fn new<I, P>(paths: I, delimiter: char) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            pending: paths.into_iter().map(Into::into).collect(),
            current: None,
            delimiter,
            files_opened: 0,
            failed: false,
        }
    }

    /// Open a single frame log
    pub fn open(path: &Path, delimiter: char) -> Result<DelimitedFrameReader<BufReader<File>>, SourceError> {
        log::debug!("Opening frame log: {:?}", path);
        let file = File::open(path)?;
        let reader = DelimitedFrameReader::new(BufReader::new(file), delimiter)?;

        Ok(match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => reader.with_source(stem),
            None => reader,
        })
    }

    /// Number of files opened so far
    pub fn files_opened(&self) -> usize {
        self.files_opened
    }
}

impl Iterator for FrameLogFiles {
    type Item = Result<FrameRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(reader) = self.current.as_mut() {
                match reader.next() {
                    Some(Err(e)) if !e.is_recoverable() => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                    Some(item) => return Some(item),
                    None => self.current = None,
                }
            }

            let path = self.pending.pop_front()?;
            match Self::open(&path, self.delimiter) {
                Ok(reader) => {
                    self.files_opened += 1;
                    self.current = Some(reader);
                }
                Err(e) => {
                    log::error!("Failed to open frame log {:?}: {}", path, e);
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
