//! Delimited-text frame log reader
//!
//! Reads logs of the form
//!
//! ```text
//! timestamp,busChannel,ide,data
//! 2024-05-02 10:15:01.250,2,1A0,0102030405060708
//! ```
//!
//! `ide` is the frame ID in hex without a `0x` prefix and `data` is the
//! payload as hex pairs in transmission order. Columns are located by header
//! name, so extra columns and any column order are accepted.

use crate::types::{FrameRecord, SourceError, Timestamp};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::{BufRead, Lines};

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time"];
const FRAME_ID_COLUMNS: &[&str] = &["ide", "frame_id", "id"];
const PAYLOAD_COLUMNS: &[&str] = &["data", "payload"];
const CHANNEL_COLUMNS: &[&str] = &["buschannel", "channel"];

/// Positions of the columns we read
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    timestamp: usize,
    frame_id: usize,
    payload: usize,
    channel: Option<usize>,
}

impl ColumnIndex {
    fn from_header(header: &str, delimiter: char) -> Result<Self, SourceError> {
        let names: Vec<String> = split_fields(header.trim_start_matches('\u{feff}'), delimiter)
            .into_iter()
            .map(|name| clean_field(name).to_ascii_lowercase())
            .collect();

        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));

        Ok(Self {
            timestamp: find(TIMESTAMP_COLUMNS).ok_or(SourceError::MissingColumn("timestamp"))?,
            frame_id: find(FRAME_ID_COLUMNS).ok_or(SourceError::MissingColumn("ide"))?,
            payload: find(PAYLOAD_COLUMNS).ok_or(SourceError::MissingColumn("data"))?,
            channel: find(CHANNEL_COLUMNS),
        })
    }
}

/// Reader yielding one `FrameRecord` per data row
pub struct DelimitedFrameReader<R> {
    lines: Lines<R>,
    /// `None` for an input with no header line at all
    columns: Option<ColumnIndex>,
    delimiter: char,
    line_no: usize,
    source: Option<String>,
    finished: bool,
}

impl<R: BufRead> DelimitedFrameReader<R> {
    /// Create a reader, consuming and validating the header line
    pub fn new(reader: R, delimiter: char) -> Result<Self, SourceError> {
        let mut lines = reader.lines();
        let mut line_no = 0;

        let columns = loop {
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    line_no += 1;
                    if !line.trim().is_empty() {
                        break Some(ColumnIndex::from_header(&line, delimiter)?);
                    }
                }
                None => break None,
            }
        };

        if columns.is_none() {
            log::debug!("Frame log is empty");
        }

        Ok(Self {
            lines,
            columns,
            delimiter,
            line_no,
            source: None,
            finished: false,
        })
    }

    /// Builder method: label every frame with this source name
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    fn parse_row(&self, columns: ColumnIndex, line: &str) -> Result<FrameRecord, SourceError> {
        let invalid = |reason: String| SourceError::InvalidRecord {
            line: self.line_no,
            reason,
        };

        let fields: Vec<&str> = split_fields(line, self.delimiter)
            .into_iter()
            .map(clean_field)
            .collect();
        let field = |idx: usize, name: &str| {
            fields
                .get(idx)
                .copied()
                .ok_or_else(|| invalid(format!("missing '{}' field", name)))
        };

        let ts_text = field(columns.timestamp, "timestamp")?;
        let timestamp = parse_timestamp(ts_text)
            .ok_or_else(|| invalid(format!("unparseable timestamp '{}'", ts_text)))?;

        let id_text = field(columns.frame_id, "ide")?;
        let id_digits = id_text
            .strip_prefix("0x")
            .or_else(|| id_text.strip_prefix("0X"))
            .unwrap_or(id_text);
        let frame_id = u32::from_str_radix(id_digits, 16)
            .map_err(|e| invalid(format!("bad frame ID '{}': {}", id_text, e)))?;

        let payload_text: String = field(columns.payload, "data")?.split_whitespace().collect();
        let payload = hex::decode(&payload_text)
            .map_err(|e| invalid(format!("bad payload '{}': {}", payload_text, e)))?;

        let channel = columns
            .channel
            .and_then(|idx| fields.get(idx))
            .filter(|text| !text.is_empty())
            .map(|text| text.to_string());

        Ok(FrameRecord {
            frame_id,
            payload,
            timestamp,
            channel,
            source: self.source.clone(),
        })
    }
}

impl<R: BufRead> Iterator for DelimitedFrameReader<R> {
    type Item = Result<FrameRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let columns = self.columns?;

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(SourceError::Io(e)));
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }
            return Some(self.parse_row(columns, &line));
        }
    }
}

/// Split a row on `delimiter`, ignoring delimiters inside double quotes
///
/// Quotes are kept in the returned fields; `clean_field` removes them.
/// Escaped quotes (`""`) are not unescaped.
fn split_fields(line: &str, delimiter: char) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut quoted = false;

    for (idx, ch) in line.char_indices() {
        if ch == '"' {
            quoted = !quoted;
        } else if ch == delimiter && !quoted {
            fields.push(&line[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    fields.push(&line[start..]);
    fields
}

/// Trim whitespace and one level of surrounding double quotes
fn clean_field(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

/// Parse a log timestamp
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (with a space or `T`,
/// taken as UTC) or epoch seconds with an optional fraction.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    let epoch: f64 = text.parse().ok()?;
    if !epoch.is_finite() {
        return None;
    }
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}
