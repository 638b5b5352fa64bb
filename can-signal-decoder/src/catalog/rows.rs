//! Catalog source rows
//!
//! Strongly typed rows for the two catalog input shapes (joined
//! encoding/message tables, or one flat table) and the JSON loader.

use super::database::{ByteOrder, SignalCatalog, SignalEncoding, ValueType};
use crate::types::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::{Entry, HashMap};
use std::fmt;
use std::path::Path;

/// A frame identifier as it appears in a catalog table
///
/// Upstream tools emit either a plain number or a string; strings with a
/// `0x` prefix are hexadecimal, anything else is decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameIdField {
    Number(u64),
    Text(String),
}

impl FrameIdField {
    /// Resolve to a CAN ID, or `None` if the value is not a valid `u32`
    pub fn resolve(&self) -> Option<u32> {
        match self {
            FrameIdField::Number(n) => u32::try_from(*n).ok(),
            FrameIdField::Text(text) => parse_frame_id(text),
        }
    }
}

impl fmt::Display for FrameIdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameIdField::Number(n) => write!(f, "{}", n),
            FrameIdField::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<u32> for FrameIdField {
    fn from(id: u32) -> Self {
        FrameIdField::Number(id as u64)
    }
}

/// Parse a frame ID string: `0x`-prefixed hex or decimal
pub fn parse_frame_id(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => text.parse().ok(),
    }
}

fn default_scale() -> f64 {
    1.0
}

/// One signal encoding row, joined to its message by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodingRow {
    pub signal_id: String,
    /// Name of the message carrying this signal
    pub message: String,
    pub bit_start: u16,
    pub bit_length: u16,
    #[serde(default)]
    pub is_signed: bool,
    pub byte_order: ByteOrder,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub min_inclusive: Option<f64>,
    #[serde(default)]
    pub max_inclusive: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// One message row: name and declared frame ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageRow {
    pub name: String,
    pub frame_id: FrameIdField,
}

/// One flat catalog row carrying its frame ID directly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogRow {
    pub signal_id: String,
    pub frame_id: FrameIdField,
    pub bit_start: u16,
    pub bit_length: u16,
    #[serde(default)]
    pub is_signed: bool,
    pub byte_order: ByteOrder,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub min_inclusive: Option<f64>,
    #[serde(default)]
    pub max_inclusive: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// On-disk catalog document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    #[serde(default)]
    pub messages: Vec<MessageRow>,
    #[serde(default)]
    pub encodings: Vec<EncodingRow>,
    /// Flat rows, alternative to `messages` + `encodings`
    #[serde(default)]
    pub signals: Vec<CatalogRow>,
}

impl SignalCatalog {
    /// Build a catalog by joining encoding rows to message rows
    pub fn build<E, M>(encodings: E, messages: M) -> Result<Self, CatalogError>
    where
        E: IntoIterator<Item = EncodingRow>,
        M: IntoIterator<Item = MessageRow>,
    {
        Self::from_encodings(join_rows(encodings, messages)?)
    }

    /// Build a catalog from flat rows that carry their frame ID
    pub fn from_rows<R>(rows: R) -> Result<Self, CatalogError>
    where
        R: IntoIterator<Item = CatalogRow>,
    {
        Self::from_encodings(resolve_rows(rows)?)
    }

    /// Build a catalog from a parsed document (flat rows first, then joined rows)
    pub fn from_document(doc: CatalogDocument) -> Result<Self, CatalogError> {
        let mut entries = resolve_rows(doc.signals)?;
        entries.extend(join_rows(doc.encodings, doc.messages)?);
        Self::from_encodings(entries)
    }
}

fn join_rows<E, M>(encodings: E, messages: M) -> Result<Vec<(u32, SignalEncoding)>, CatalogError>
where
    E: IntoIterator<Item = EncodingRow>,
    M: IntoIterator<Item = MessageRow>,
{
    // A message whose ID does not parse stays in the map as `None` so the
    // signals referencing it are reported as unresolved.
    let mut frame_ids: HashMap<String, Option<u32>> = HashMap::new();
    for m in messages {
        let id = m.frame_id.resolve();
        if id.is_none() {
            log::warn!("Message '{}' has undecodable frame ID '{}'", m.name, m.frame_id);
        }
        match frame_ids.entry(m.name) {
            Entry::Occupied(entry) => return Err(CatalogError::DuplicateMessage(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }
    }

    encodings
        .into_iter()
        .map(|row| {
            let frame_id = frame_ids
                .get(&row.message)
                .copied()
                .flatten()
                .ok_or_else(|| CatalogError::UnresolvedSignal {
                    signal_id: row.signal_id.clone(),
                    message: row.message.clone(),
                })?;
            Ok((frame_id, row.into_encoding()))
        })
        .collect()
}

fn resolve_rows<R>(rows: R) -> Result<Vec<(u32, SignalEncoding)>, CatalogError>
where
    R: IntoIterator<Item = CatalogRow>,
{
    rows.into_iter()
        .map(|row| {
            let frame_id = row
                .frame_id
                .resolve()
                .ok_or_else(|| CatalogError::UnresolvedSignal {
                    signal_id: row.signal_id.clone(),
                    message: row.frame_id.to_string(),
                })?;
            Ok((frame_id, row.into_encoding()))
        })
        .collect()
}

impl EncodingRow {
    fn into_encoding(self) -> SignalEncoding {
        SignalEncoding {
            signal_id: self.signal_id,
            bit_start: self.bit_start,
            bit_length: self.bit_length,
            byte_order: self.byte_order,
            value_type: ValueType::from_signed_flag(self.is_signed),
            scale: self.scale,
            offset: self.offset,
            min_inclusive: self.min_inclusive,
            max_inclusive: self.max_inclusive,
            unit: self.unit,
            message: Some(self.message),
        }
    }
}

impl CatalogRow {
    fn into_encoding(self) -> SignalEncoding {
        SignalEncoding {
            signal_id: self.signal_id,
            bit_start: self.bit_start,
            bit_length: self.bit_length,
            byte_order: self.byte_order,
            value_type: ValueType::from_signed_flag(self.is_signed),
            scale: self.scale,
            offset: self.offset,
            min_inclusive: self.min_inclusive,
            max_inclusive: self.max_inclusive,
            unit: self.unit,
            message: None,
        }
    }
}

/// Parse a catalog from a JSON string
pub fn parse_catalog_str(content: &str) -> Result<SignalCatalog, CatalogError> {
    let doc: CatalogDocument =
        serde_json::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
    SignalCatalog::from_document(doc)
}

/// Load a catalog from a JSON file
pub fn load_catalog_file(path: &Path) -> Result<SignalCatalog, CatalogError> {
    log::info!("Loading signal catalog: {:?}", path);

    let content = std::fs::read_to_string(path)?;
    let doc: CatalogDocument = serde_json::from_str(&content)
        .map_err(|e| CatalogError::Parse(format!("{:?}: {}", path, e)))?;

    log::debug!(
        "Catalog document: {} messages, {} encodings, {} flat rows",
        doc.messages.len(),
        doc.encodings.len(),
        doc.signals.len()
    );
    SignalCatalog::from_document(doc)
}
