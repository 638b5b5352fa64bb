//! Core types for the CAN signal decoder library
//!
//! This module defines the records flowing through the pipeline (frames in,
//! decoded samples out) and the error taxonomy. The decoder is stateless:
//! it does not retain samples once they have been handed to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// One observed CAN frame, as read from a frame log
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// CAN message ID (11-bit or 29-bit)
    pub frame_id: u32,
    /// Payload bytes in transmission order
    pub payload: Vec<u8>,
    /// Point in time the frame was observed
    pub timestamp: Timestamp,
    /// Bus channel label, if the log records one (passed through as-is)
    pub channel: Option<String>,
    /// Label of the log this frame came from (e.g. the log file stem)
    pub source: Option<String>,
}

impl FrameRecord {
    /// Create a frame without channel or source information
    pub fn new(frame_id: u32, payload: Vec<u8>, timestamp: Timestamp) -> Self {
        Self {
            frame_id,
            payload,
            timestamp,
            channel: None,
            source: None,
        }
    }

    /// Builder method: attach a source label
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// One physical measurement decoded from a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedSample {
    /// Signal the value belongs to
    pub signal_id: String,
    /// Timestamp of the source frame
    pub result_time: Timestamp,
    /// Value after sign extension and linear transform
    pub physical_value: f64,
    /// Extracted field after sign extension, before scaling
    pub raw_value: i128,
    /// 1-based position in the run's output order (0 until assigned)
    pub sequence: u64,
    /// 1-based position of the source frame in the run (0 outside a run)
    #[serde(default)]
    pub frame_index: u64,
    /// Engineering unit, passed through from the catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Source label of the frame, passed through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl DecodedSample {
    /// Unique identifier of this sample: `{signal}_{yyyymmddHHMMSS}_{sequence}`
    pub fn identifier(&self) -> String {
        format!(
            "{}_{}_{}",
            self.signal_id,
            self.result_time.format("%Y%m%d%H%M%S"),
            self.sequence
        )
    }

    /// Builder method: assign the output sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Builder method: tag the sample with its source frame position
    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }
}

/// Errors raised while building the signal catalog. Fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Signal '{signal_id}' references message '{message}' with no decodable frame ID")]
    UnresolvedSignal { signal_id: String, message: String },

    #[error("Invalid encoding for signal '{signal_id}': {reason}")]
    InvalidEncoding { signal_id: String, reason: String },

    #[error("Signal '{0}' is defined more than once")]
    DuplicateSignal(String),

    #[error("Message '{0}' is defined more than once")]
    DuplicateMessage(String),

    #[error("Failed to parse catalog: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding one (frame, signal) pair. Recoverable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Signal '{signal_id}' requires {required} payload bytes but frame has {actual}")]
    MalformedPayload {
        signal_id: String,
        required: usize,
        actual: usize,
    },

    #[error("Signal '{signal_id}' has unsupported bit length {bit_length} (must be 1..=64)")]
    UnsupportedWidth { signal_id: String, bit_length: u16 },

    #[error("Signal '{signal_id}' value {value} outside [{min:?}, {max:?}]")]
    OutOfRange {
        signal_id: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl DecodeError {
    /// Reason bucket used for run statistics
    pub fn reason(&self) -> SkipReason {
        match self {
            DecodeError::MalformedPayload { .. } => SkipReason::MalformedPayload,
            DecodeError::UnsupportedWidth { .. } => SkipReason::UnsupportedWidth,
            DecodeError::OutOfRange { .. } => SkipReason::OutOfRange,
        }
    }
}

/// Errors raised by a frame source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Frame log is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Invalid frame record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// True if the run can continue past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::InvalidRecord { .. })
    }
}

/// Errors that can occur during a decode run
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Why a record was skipped during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    MalformedPayload,
    UnsupportedWidth,
    OutOfRange,
    InvalidRecord,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MalformedPayload => write!(f, "malformed payload"),
            SkipReason::UnsupportedWidth => write!(f, "unsupported width"),
            SkipReason::OutOfRange => write!(f, "out of range"),
            SkipReason::InvalidRecord => write!(f, "invalid frame record"),
        }
    }
}
