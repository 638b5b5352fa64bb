//! CAN Signal Decoder Library
//!
//! A stateless, reusable library for turning raw CAN frames into physical
//! signal values, given a catalog of per-signal bit layouts.
//!
//! # Architecture
//!
//! Data flows strictly forward:
//! - **Catalog**: frame ID → signal encodings, built once and read-only
//! - **Source**: pull-based iterator over frame records (e.g. delimited logs)
//! - **Matcher**: joins frames to the catalog, dropping unknown frame IDs
//! - **Codec**: pure bit extraction, sign extension and linear transform
//! - **Decoder**: drives a run, applies the error policy, counts totals
//!
//! The library does NOT:
//! - Parse DBC files (the catalog is produced upstream)
//! - Persist or export decoded samples
//!
//! # Example Usage
//!
//! ```no_run
//! use can_signal_decoder::{Decoder, DecoderConfig};
//! use std::path::Path;
//!
//! // Load the signal catalog
//! let decoder = Decoder::from_catalog_file(Path::new("catalog.json")).unwrap();
//!
//! // Configure the run
//! let config = DecoderConfig::new()
//!     .with_parallel(true)
//!     .with_max_frames(100_000);
//!
//! // Decode frame logs
//! let mut run = decoder.decode_files(vec!["raw/can2_sniffer.csv"], ',', config);
//! for sample in run.by_ref() {
//!     match sample {
//!         Ok(sample) => println!("{} = {}", sample.signal_id, sample.physical_value),
//!         Err(e) => eprintln!("Decode error: {}", e),
//!     }
//! }
//! println!("Skipped: {}", run.stats().total_skipped());
//! ```

// Public modules
pub mod catalog;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod matcher;
pub mod source;
pub mod types;

// Re-export main types for convenience
pub use catalog::{
    load_catalog_file, ByteOrder, CatalogStats, SignalCatalog, SignalEncoding, ValueType,
};
pub use codec::SignalCodec;
pub use config::DecoderConfig;
pub use decoder::{DecodeRun, Decoder, RunStats};
pub use matcher::{FrameMatcher, MatchStats, MatchedPair};
pub use source::{DelimitedFrameReader, FrameLogFiles, FrameSource};
pub use types::{
    CatalogError, DecodeError, DecodedSample, DecoderError, FrameRecord, Result, SkipReason,
    SourceError, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
