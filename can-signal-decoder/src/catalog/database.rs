//! Signal catalog
//!
//! Immutable lookup from frame ID to the signals carried in that frame.
//! Built once from validated rows and shared read-only by every decode.

use crate::types::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Widest field the decoder can extract, in bits
pub const MAX_SIGNAL_BITS: u16 = 64;

/// How one signal is packed into a frame's payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEncoding {
    /// Signal identifier, unique within the catalog
    pub signal_id: String,
    /// Bit offset from the LSB of the normalized payload integer
    pub bit_start: u16,
    /// Length in bits (1..=64)
    pub bit_length: u16,
    /// Byte order of the field
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub scale: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value (informational unless range validation is on)
    pub min_inclusive: Option<f64>,
    /// Maximum physical value (informational unless range validation is on)
    pub max_inclusive: Option<f64>,
    /// Engineering unit, passed through unchanged
    pub unit: Option<String>,
    /// Owning message name, passed through unchanged
    pub message: Option<String>,
}

impl SignalEncoding {
    /// Create an unscaled encoding with no range or unit metadata
    pub fn new(
        signal_id: impl Into<String>,
        bit_start: u16,
        bit_length: u16,
        byte_order: ByteOrder,
        value_type: ValueType,
    ) -> Self {
        Self {
            signal_id: signal_id.into(),
            bit_start,
            bit_length,
            byte_order,
            value_type,
            scale: 1.0,
            offset: 0.0,
            min_inclusive: None,
            max_inclusive: None,
            unit: None,
            message: None,
        }
    }

    /// Builder method: set the linear transform
    pub fn with_linear(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Builder method: set the physical range bounds
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_inclusive = min;
        self.max_inclusive = max;
        self
    }

    /// Builder method: set the engineering unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Number of payload bytes needed to cover this field
    pub fn required_bytes(&self) -> usize {
        (self.bit_start as usize + self.bit_length as usize).div_ceil(8)
    }

    /// Check the layout invariants enforced at catalog construction
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidEncoding {
            signal_id: self.signal_id.clone(),
            reason,
        };

        if self.bit_length == 0 {
            return Err(invalid("bit length is zero".to_string()));
        }
        let end = self.bit_start as u32 + self.bit_length as u32;
        if end > MAX_SIGNAL_BITS as u32 {
            return Err(invalid(format!(
                "bit_start {} + bit_length {} exceeds {} bits",
                self.bit_start, self.bit_length, MAX_SIGNAL_BITS
            )));
        }
        if !self.scale.is_finite() || !self.offset.is_finite() {
            return Err(invalid(format!(
                "non-finite linear transform (scale {}, offset {})",
                self.scale, self.offset
            )));
        }
        Ok(())
    }
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    #[serde(alias = "little_endian")]
    LittleEndian,
    /// Big-endian (Motorola format)
    #[serde(alias = "big_endian")]
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Two's-complement signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

impl ValueType {
    pub fn from_signed_flag(is_signed: bool) -> Self {
        if is_signed {
            ValueType::Signed
        } else {
            ValueType::Unsigned
        }
    }
}

/// The signal catalog
#[derive(Debug, Default)]
pub struct SignalCatalog {
    /// Key: frame ID, Value: signals carried in that frame, in insertion order
    frames: HashMap<u32, Vec<SignalEncoding>>,

    /// Signal lookup for quick access
    /// Key: signal ID, Value: (frame ID, index in the frame's signal list)
    signal_lookup: HashMap<String, (u32, usize)>,
}

impl SignalCatalog {
    /// Build a catalog from `(frame_id, encoding)` pairs
    ///
    /// Every encoding is validated; the first invalid or duplicate signal
    /// aborts construction.
    pub fn from_encodings<I>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (u32, SignalEncoding)>,
    {
        let mut catalog = Self::default();
        for (frame_id, encoding) in entries {
            catalog.insert(frame_id, encoding)?;
        }

        let stats = catalog.stats();
        log::info!(
            "Signal catalog built: {} signals across {} frames",
            stats.num_signals,
            stats.num_frames
        );
        Ok(catalog)
    }

    fn insert(&mut self, frame_id: u32, encoding: SignalEncoding) -> Result<(), CatalogError> {
        encoding.validate()?;

        if self.signal_lookup.contains_key(&encoding.signal_id) {
            return Err(CatalogError::DuplicateSignal(encoding.signal_id));
        }

        let signals = self.frames.entry(frame_id).or_default();
        self.signal_lookup
            .insert(encoding.signal_id.clone(), (frame_id, signals.len()));
        signals.push(encoding);
        Ok(())
    }

    /// Signals carried in the given frame, in catalog order
    pub fn signals_for(&self, frame_id: u32) -> Option<&[SignalEncoding]> {
        self.frames.get(&frame_id).map(Vec::as_slice)
    }

    /// Find a signal by ID, returning its frame ID and encoding
    pub fn find_signal(&self, signal_id: &str) -> Option<(u32, &SignalEncoding)> {
        let (frame_id, idx) = self.signal_lookup.get(signal_id)?;
        self.frames
            .get(frame_id)
            .and_then(|signals| signals.get(*idx))
            .map(|encoding| (*frame_id, encoding))
    }

    /// Get all frame IDs in the catalog, sorted
    pub fn frame_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.frames.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get catalog statistics
    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            num_frames: self.frames.len(),
            num_signals: self.signal_lookup.len(),
        }
    }
}

/// Catalog statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogStats {
    /// Number of distinct frame IDs
    pub num_frames: usize,
    /// Total number of signal encodings
    pub num_signals: usize,
}
