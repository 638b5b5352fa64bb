//! Frame matcher
//!
//! Joins a frame stream against the signal catalog by frame ID. Each frame
//! carrying N known signals expands into N consecutive `MatchedPair`s;
//! frames with no catalog entry are dropped without error.

use crate::catalog::{SignalCatalog, SignalEncoding};
use crate::source::FrameSource;
use crate::types::{FrameRecord, SourceError};
use std::collections::HashSet;
use std::sync::Arc;

/// One frame paired with one signal it carries
#[derive(Debug, Clone)]
pub struct MatchedPair<'a> {
    /// The frame, shared between all pairs produced from it
    pub frame: Arc<FrameRecord>,
    /// Encoding of the signal to decode
    pub encoding: &'a SignalEncoding,
    /// 1-based position of the frame in the source
    pub frame_index: u64,
}

/// Frame counters kept by the matcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Frames pulled from the source
    pub frames_read: u64,
    /// Frames carrying at least one catalog signal
    pub frames_matched: u64,
    /// Frames whose ID is not in the catalog
    pub frames_unmatched: u64,
    /// Frames excluded by the frame filter
    pub frames_filtered: u64,
}

/// The frame currently being expanded into pairs
struct PendingFrame<'a> {
    frame: Arc<FrameRecord>,
    signals: &'a [SignalEncoding],
    next_signal: usize,
    frame_index: u64,
}

/// Lazy join of a frame source against the catalog
pub struct FrameMatcher<'a, I> {
    frames: I,
    catalog: &'a SignalCatalog,
    pending: Option<PendingFrame<'a>>,
    frame_filter: Option<HashSet<u32>>,
    frame_limit: Option<u64>,
    stats: MatchStats,
}

impl<'a, I> FrameMatcher<'a, I>
where
    I: FrameSource,
{
    pub fn new(frames: I, catalog: &'a SignalCatalog) -> Self {
        Self {
            frames,
            catalog,
            pending: None,
            frame_filter: None,
            frame_limit: None,
            stats: MatchStats::default(),
        }
    }

    /// Builder method: only match frames with these IDs
    pub fn with_frame_filter(mut self, frame_ids: Option<Vec<u32>>) -> Self {
        self.frame_filter = frame_ids.map(|ids| ids.into_iter().collect());
        self
    }

    /// Builder method: stop pulling after this many frames
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn stats(&self) -> MatchStats {
        self.stats
    }

    fn limit_reached(&self) -> bool {
        self.frame_limit
            .is_some_and(|limit| self.stats.frames_read >= limit)
    }

    /// Look up a freshly read frame and queue its signals, if any
    fn accept(&mut self, frame: FrameRecord) {
        self.stats.frames_read += 1;
        let frame_index = self.stats.frames_read;
        let frame_id = frame.frame_id;

        if let Some(filter) = &self.frame_filter {
            if !filter.contains(&frame_id) {
                self.stats.frames_filtered += 1;
                return;
            }
        }

        let catalog: &'a SignalCatalog = self.catalog;
        match catalog.signals_for(frame_id) {
            Some(signals) if !signals.is_empty() => {
                self.stats.frames_matched += 1;
                self.pending = Some(PendingFrame {
                    frame: Arc::new(frame),
                    signals,
                    next_signal: 0,
                    frame_index,
                });
            }
            _ => {
                log::trace!("Unknown frame ID: 0x{:X}, dropping frame", frame_id);
                self.stats.frames_unmatched += 1;
            }
        }
    }
}

impl<'a, I> Iterator for FrameMatcher<'a, I>
where
    I: FrameSource,
{
    type Item = Result<MatchedPair<'a>, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Finish the current frame before pulling the next one
            if let Some(pending) = self.pending.as_mut() {
                let signals: &'a [SignalEncoding] = pending.signals;
                if let Some(encoding) = signals.get(pending.next_signal) {
                    pending.next_signal += 1;
                    return Some(Ok(MatchedPair {
                        frame: Arc::clone(&pending.frame),
                        encoding,
                        frame_index: pending.frame_index,
                    }));
                }
                self.pending = None;
            }

            if self.limit_reached() {
                return None;
            }

            match self.frames.next()? {
                Ok(frame) => self.accept(frame),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ByteOrder, ValueType};
    use chrono::{TimeZone, Utc};

    fn catalog() -> SignalCatalog {
        let sig = |id: &str, start| SignalEncoding::new(id, start, 8, ByteOrder::BigEndian, ValueType::Unsigned);
        SignalCatalog::from_encodings(vec![
            (0x100, sig("A1", 0)),
            (0x100, sig("A2", 8)),
            (0x200, sig("B1", 0)),
        ])
        .unwrap()
    }

    fn frame(frame_id: u32, second: u32) -> Result<FrameRecord, SourceError> {
        Ok(FrameRecord::new(
            frame_id,
            vec![0; 8],
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap(),
        ))
    }

    #[test]
    fn test_pairs_are_contiguous_per_frame() {
        let catalog = catalog();
        let frames = vec![frame(0x100, 0), frame(0x200, 1), frame(0x100, 2)];
        let pairs: Vec<(u64, String)> = FrameMatcher::new(frames.into_iter(), &catalog)
            .map(|p| {
                let p = p.unwrap();
                (p.frame_index, p.encoding.signal_id.clone())
            })
            .collect();

        assert_eq!(
            pairs,
            vec![
                (1, "A1".to_string()),
                (1, "A2".to_string()),
                (2, "B1".to_string()),
                (3, "A1".to_string()),
                (3, "A2".to_string()),
            ]
        );
    }

    #[test]
    fn test_unmatched_frames_dropped_silently() {
        let catalog = catalog();
        let frames = vec![frame(0x7FF, 0), frame(0x123, 1)];
        let mut matcher = FrameMatcher::new(frames.into_iter(), &catalog);

        assert!(matcher.next().is_none());
        assert_eq!(
            matcher.stats(),
            MatchStats {
                frames_read: 2,
                frames_matched: 0,
                frames_unmatched: 2,
                frames_filtered: 0,
            }
        );
    }

    #[test]
    fn test_source_errors_pass_through() {
        let catalog = catalog();
        let frames = vec![
            Err(SourceError::InvalidRecord {
                line: 2,
                reason: "bad hex".to_string(),
            }),
            frame(0x200, 0),
        ];
        let results: Vec<_> = FrameMatcher::new(frames.into_iter(), &catalog).collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap().encoding.signal_id, "B1");
    }

    #[test]
    fn test_frame_limit_stops_pulling() {
        let catalog = catalog();
        let frames = vec![frame(0x100, 0), frame(0x200, 1), frame(0x200, 2)];
        let mut matcher = FrameMatcher::new(frames.into_iter(), &catalog).with_frame_limit(Some(2));

        assert_eq!(matcher.by_ref().count(), 3);
        assert_eq!(matcher.stats().frames_read, 2);
    }

    #[test]
    fn test_frame_filter() {
        let catalog = catalog();
        let frames = vec![frame(0x100, 0), frame(0x200, 1)];
        let mut matcher =
            FrameMatcher::new(frames.into_iter(), &catalog).with_frame_filter(Some(vec![0x200]));

        let ids: Vec<String> = matcher
            .by_ref()
            .map(|p| p.unwrap().encoding.signal_id.clone())
            .collect();
        assert_eq!(ids, vec!["B1".to_string()]);
        assert_eq!(matcher.stats().frames_filtered, 1);
        assert_eq!(matcher.stats().frames_unmatched, 0);
    }

    #[test]
    fn test_pairs_share_one_frame() {
        let catalog = catalog();
        let mut matcher = FrameMatcher::new(vec![frame(0x100, 0)].into_iter(), &catalog);
        let first = matcher.next().unwrap().unwrap();
        let second = matcher.next().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first.frame, &second.frame));
    }
}
