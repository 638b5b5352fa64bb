//! Frame sources
//!
//! A frame source is any pull-based iterator over `FrameRecord`s. The
//! decoder never touches storage directly; this module provides the
//! delimited-text log reader and a multi-file source built on it.

use crate::types::{FrameRecord, SourceError};

pub mod delimited;
pub mod files;

// Re-export source types
pub use delimited::{parse_timestamp, DelimitedFrameReader};
pub use files::FrameLogFiles;

/// Common trait for all frame sources
///
/// Sources are single-pass: once exhausted they must be re-opened to be
/// read again. Recoverable errors (one bad row) may be followed by further
/// frames; other errors end the source.
pub trait FrameSource: Iterator<Item = Result<FrameRecord, SourceError>> {}

impl<T> FrameSource for T where T: Iterator<Item = Result<FrameRecord, SourceError>> {}
