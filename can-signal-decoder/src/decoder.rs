//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! The Decoder struct owns the signal catalog and starts decode runs over
//! frame sources.

use crate::catalog::{self, CatalogStats, SignalCatalog, SignalEncoding};
use crate::codec::SignalCodec;
use crate::config::DecoderConfig;
use crate::matcher::{FrameMatcher, MatchStats, MatchedPair};
use crate::source::{FrameLogFiles, FrameSource};
use crate::types::{
    DecodeError, DecodedSample, DecoderError, FrameRecord, Result, SkipReason, SourceError,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

/// The main decoder struct - entry point for all decoding operations
pub struct Decoder {
    /// Signal catalog, read-only once the decoder exists
    catalog: SignalCatalog,
}

impl Decoder {
    /// Create a decoder around a built catalog
    pub fn new(catalog: SignalCatalog) -> Self {
        Self { catalog }
    }

    /// Load a catalog JSON file and create a decoder from it
    ///
    /// # Example
    /// ```no_run
    /// use can_signal_decoder::Decoder;
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::from_catalog_file(Path::new("catalog.json")).unwrap();
    /// ```
    pub fn from_catalog_file(path: &Path) -> Result<Self> {
        let catalog = catalog::load_catalog_file(path)?;
        log::info!("Signal catalog loaded successfully: {:?}", path);
        Ok(Self::new(catalog))
    }

    pub fn catalog(&self) -> &SignalCatalog {
        &self.catalog
    }

    /// Get statistics about the loaded catalog
    pub fn catalog_stats(&self) -> CatalogStats {
        self.catalog.stats()
    }

    /// Decode every catalog signal carried by a single frame
    ///
    /// Unknown or filtered frames produce an empty list. Samples keep
    /// sequence number and frame index 0.
    pub fn decode_frame(
        &self,
        frame: &FrameRecord,
        config: &DecoderConfig,
    ) -> Vec<std::result::Result<DecodedSample, DecodeError>> {
        if !config.should_process_frame(frame.frame_id) {
            return Vec::new();
        }
        self.catalog
            .signals_for(frame.frame_id)
            .unwrap_or_default()
            .iter()
            .map(|encoding| decode_checked(frame, encoding, config.validate_range))
            .collect()
    }

    /// Start a decode run over a frame source
    ///
    /// The run is lazy: frames are pulled from `frames` only as samples are
    /// requested, and dropping the run stops reading.
    ///
    /// # Example
    /// ```no_run
    /// use can_signal_decoder::{Decoder, DecoderConfig, FrameLogFiles};
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::from_catalog_file(Path::new("catalog.json")).unwrap();
    /// let frames = FrameLogFiles::new(vec!["trace.csv"], ',');
    /// let mut run = decoder.decode_frames(frames, DecoderConfig::new());
    ///
    /// for sample in run.by_ref() {
    ///     match sample {
    ///         Ok(sample) => println!("{} = {}", sample.identifier(), sample.physical_value),
    ///         Err(e) => eprintln!("Error: {}", e),
    ///     }
    /// }
    /// println!("skipped: {}", run.stats().total_skipped());
    /// ```
    pub fn decode_frames<I>(&self, frames: I, config: DecoderConfig) -> DecodeRun<'_, I>
    where
        I: FrameSource,
    {
        DecodeRun::new(frames, &self.catalog, config)
    }

    /// Start a decode run over delimited frame log files, in order
    pub fn decode_files<P>(
        &self,
        paths: Vec<P>,
        delimiter: char,
        config: DecoderConfig,
    ) -> DecodeRun<'_, FrameLogFiles>
    where
        P: Into<PathBuf>,
    {
        log::info!("Decoding {} frame log file(s)", paths.len());
        self.decode_frames(FrameLogFiles::new(paths, delimiter), config)
    }
}

/// Totals of a decode run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Frames pulled from the source
    pub frames_read: u64,
    /// Frames carrying at least one catalog signal
    pub frames_matched: u64,
    /// Frames with no catalog entry (expected noise, not failures)
    pub frames_unmatched: u64,
    /// Frames excluded by the frame filter
    pub frames_filtered: u64,
    /// Samples handed to the caller
    pub samples_decoded: u64,
    /// Skipped records, per reason
    pub skipped: BTreeMap<SkipReason, u64>,
}

impl RunStats {
    pub fn total_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }

    fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    fn absorb(&mut self, matched: MatchStats) {
        self.frames_read = matched.frames_read;
        self.frames_matched = matched.frames_matched;
        self.frames_unmatched = matched.frames_unmatched;
        self.frames_filtered = matched.frames_filtered;
    }
}

/// Outcome of one pulled pair, before the error policy is applied
type PairOutcome = std::result::Result<std::result::Result<DecodedSample, DecodeError>, SourceError>;

/// Iterator of decoded samples over a frame source
///
/// Applies the error policy: per-record errors are skipped and counted
/// unless `fail_fast` is set, in which case the first one is yielded and
/// the run ends. Source I/O errors always end the run.
pub struct DecodeRun<'a, I> {
    matcher: FrameMatcher<'a, I>,
    config: DecoderConfig,
    stats: RunStats,
    sequence: u64,
    ready: VecDeque<Result<DecodedSample>>,
    finished: bool,
}

impl<'a, I> DecodeRun<'a, I>
where
    I: FrameSource,
{
    fn new(frames: I, catalog: &'a SignalCatalog, config: DecoderConfig) -> Self {
        let matcher = FrameMatcher::new(frames, catalog)
            .with_frame_filter(config.frame_filter.clone())
            .with_frame_limit(config.max_frames);

        Self {
            matcher,
            config,
            stats: RunStats::default(),
            sequence: 0,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Totals so far (final once the iterator is exhausted)
    pub fn stats(&self) -> RunStats {
        let mut stats = self.stats.clone();
        stats.absorb(self.matcher.stats());
        stats
    }

    /// Pull up to one batch of pairs, decode it and queue the results
    fn step(&mut self) {
        let batch_size = self.config.effective_batch_size();
        let mut pairs: Vec<std::result::Result<MatchedPair<'a>, SourceError>> =
            Vec::with_capacity(batch_size);

        while pairs.len() < batch_size {
            match self.matcher.next() {
                Some(Err(e)) if !e.is_recoverable() => {
                    pairs.push(Err(e));
                    break;
                }
                Some(item) => pairs.push(item),
                None => break,
            }
        }

        if pairs.is_empty() {
            self.finish();
            return;
        }

        let validate = self.config.validate_range;
        let decode = |item: std::result::Result<MatchedPair<'a>, SourceError>| -> PairOutcome {
            item.map(|pair| {
                decode_checked(&pair.frame, pair.encoding, validate)
                    .map(|sample| sample.with_frame_index(pair.frame_index))
            })
        };

        let outcomes: Vec<PairOutcome> = if self.config.parallel && pairs.len() > 1 {
            pairs.into_par_iter().map(decode).collect()
        } else {
            pairs.into_iter().map(decode).collect()
        };

        for outcome in outcomes {
            if self.finished {
                break;
            }
            self.apply(outcome);
        }
    }

    /// Apply the error policy to one outcome
    fn apply(&mut self, outcome: PairOutcome) {
        match outcome {
            Ok(Ok(sample)) => {
                self.sequence += 1;
                self.stats.samples_decoded += 1;
                self.ready.push_back(Ok(sample.with_sequence(self.sequence)));
            }
            Ok(Err(e)) => {
                if self.config.fail_fast {
                    self.fail(e.into());
                } else {
                    log::warn!("Skipping sample: {}", e);
                    self.stats.record_skip(e.reason());
                }
            }
            Err(e) if e.is_recoverable() && !self.config.fail_fast => {
                log::warn!("Skipping frame record: {}", e);
                self.stats.record_skip(SkipReason::InvalidRecord);
            }
            Err(e) => self.fail(e.into()),
        }
    }

    fn fail(&mut self, error: DecoderError) {
        log::error!("Decode run aborted: {}", error);
        self.ready.push_back(Err(error));
        self.finished = true;
    }

    fn finish(&mut self) {
        self.finished = true;
        let stats = self.stats();
        log::info!(
            "Decode run finished: {} frames read, {} samples decoded, {} skipped",
            stats.frames_read,
            stats.samples_decoded,
            stats.total_skipped()
        );
    }
}

impl<'a, I> Iterator for DecodeRun<'a, I>
where
    I: FrameSource,
{
    type Item = Result<DecodedSample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // First, return anything already decoded
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            self.step();
        }
    }
}

/// Decode one pair and optionally validate its range
fn decode_checked(
    frame: &FrameRecord,
    encoding: &SignalEncoding,
    validate_range: bool,
) -> std::result::Result<DecodedSample, DecodeError> {
    let sample = SignalCodec::decode(frame, encoding)?;
    if validate_range {
        SignalCodec::check_range(&sample, encoding)?;
    }
    Ok(sample)
}
