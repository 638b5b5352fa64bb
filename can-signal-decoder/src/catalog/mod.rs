//! Signal catalog and its source rows
//!
//! This module contains the typed catalog input rows (joined or flat tables,
//! JSON documents) and the immutable frame-ID keyed catalog built from them.

pub mod database;
pub mod rows;

// Re-export key types for convenience
pub use database::{
    ByteOrder, CatalogStats, SignalCatalog, SignalEncoding, ValueType, MAX_SIGNAL_BITS,
};
pub use rows::{
    load_catalog_file, parse_catalog_str, parse_frame_id, CatalogDocument, CatalogRow,
    EncodingRow, FrameIdField, MessageRow,
};
