//! Decoder configuration types
//!
//! This module defines the knobs of a decode run: error policy, limits,
//! filtering and parallelism. Loading it from a file is left to the
//! application layer.

use serde::{Deserialize, Serialize};

/// Configuration for a decode run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Stop at the first per-record error instead of skipping it
    #[serde(default)]
    pub fail_fast: bool,

    /// Reject values outside each signal's `[min_inclusive, max_inclusive]`
    #[serde(default)]
    pub validate_range: bool,

    /// Optional: stop after reading this many frames
    #[serde(default)]
    pub max_frames: Option<u64>,

    /// Optional: only decode these frame IDs
    #[serde(default)]
    pub frame_filter: Option<Vec<u32>>,

    /// Decode batches of pairs on the rayon thread pool
    #[serde(default)]
    pub parallel: bool,

    /// Pairs per parallel batch (default: 1024)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    1024
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            validate_range: false,
            max_frames: None,
            frame_filter: None,
            parallel: false,
            batch_size: default_batch_size(),
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: stop at the first per-record error
    pub fn with_fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Builder method: enable physical range validation
    pub fn with_range_validation(mut self, enabled: bool) -> Self {
        self.validate_range = enabled;
        self
    }

    /// Builder method: limit the number of frames read
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Builder method: set frame ID filter
    pub fn with_frame_filter(mut self, frame_ids: Vec<u32>) -> Self {
        self.frame_filter = Some(frame_ids);
        self
    }

    /// Builder method: enable parallel batch decoding
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Builder method: set the parallel batch size (at least 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Check if a frame ID should be processed
    pub fn should_process_frame(&self, frame_id: u32) -> bool {
        match &self.frame_filter {
            Some(frame_ids) => frame_ids.contains(&frame_id),
            None => true,
        }
    }

    /// Number of pairs pulled per decode step
    pub(crate) fn effective_batch_size(&self) -> usize {
        if self.parallel {
            self.batch_size.max(1)
        } else {
            1
        }
    }
}
