//! Decoded sample writers
//!
//! Samples are written as soon as they are decoded; nothing is buffered
//! beyond the underlying `BufWriter`.

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use can_signal_decoder::DecodedSample;
use chrono::SecondsFormat;
use serde::Serialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const COLUMNS: [&str; 8] = [
    "identifier",
    "signal_id",
    "physical_value",
    "result_time",
    "raw_value",
    "unit",
    "source",
    "frame_index",
];

/// Destination for decoded samples
pub trait SampleSink {
    fn write_sample(&mut self, sample: &DecodedSample) -> Result<()>;

    /// Flush everything written so far
    fn finish(&mut self) -> Result<()>;
}

/// Flattened output row
#[derive(Debug, Serialize)]
struct OutputRecord<'a> {
    identifier: String,
    signal_id: &'a str,
    physical_value: f64,
    result_time: String,
    raw_value: i128,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    frame_index: u64,
}

impl<'a> From<&'a DecodedSample> for OutputRecord<'a> {
    fn from(sample: &'a DecodedSample) -> Self {
        Self {
            identifier: sample.identifier(),
            signal_id: &sample.signal_id,
            physical_value: sample.physical_value,
            result_time: sample.result_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            raw_value: sample.raw_value,
            unit: sample.unit.as_deref(),
            source: sample.source.as_deref(),
            frame_index: sample.frame_index,
        }
    }
}

/// One JSON object per line
pub struct JsonLinesWriter<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> SampleSink for JsonLinesWriter<W> {
    fn write_sample(&mut self, sample: &DecodedSample) -> Result<()> {
        serde_json::to_writer(&mut self.out, &OutputRecord::from(sample))?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Delimited text with a header row
pub struct DelimitedWriter<W: Write> {
    out: W,
    delimiter: char,
    header_written: bool,
}

impl<W: Write> DelimitedWriter<W> {
    pub fn new(out: W, delimiter: char) -> Self {
        Self {
            out,
            delimiter,
            header_written: false,
        }
    }

    fn write_row(&mut self, fields: &[&str]) -> io::Result<()> {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                write!(self.out, "{}", self.delimiter)?;
            }
            let field = quote(field, self.delimiter);
            self.out.write_all(field.as_bytes())?;
        }
        writeln!(self.out)
    }
}

/// Quote a field if it contains the delimiter, a quote or a line break
fn quote(field: &str, delimiter: char) -> Cow<'_, str> {
    if field.contains(delimiter) || field.contains(['"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}

impl<W: Write> SampleSink for DelimitedWriter<W> {
    fn write_sample(&mut self, sample: &DecodedSample) -> Result<()> {
        if !self.header_written {
            self.write_row(&COLUMNS)?;
            self.header_written = true;
        }

        let record = OutputRecord::from(sample);
        let value = record.physical_value.to_string();
        let raw = record.raw_value.to_string();
        let frame_index = record.frame_index.to_string();
        self.write_row(&[
            &record.identifier,
            record.signal_id,
            &value,
            &record.result_time,
            &raw,
            record.unit.unwrap_or(""),
            record.source.unwrap_or(""),
            &frame_index,
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.header_written {
            self.write_row(&COLUMNS)?;
            self.header_written = true;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Open the configured sink: a file if `path` is given, stdout otherwise
pub fn open_sink(format: OutputFormat, path: Option<&Path>, delimiter: char) -> Result<Box<dyn SampleSink>> {
    let out: Box<dyn Write> = match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    Ok(match format {
        OutputFormat::Jsonl => Box::new(JsonLinesWriter::new(out)),
        OutputFormat::Csv => Box::new(DelimitedWriter::new(out, delimiter)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(unit: Option<&str>) -> DecodedSample {
        DecodedSample {
            signal_id: "EngineSpeed".to_string(),
            result_time: Utc.with_ymd_and_hms(2024, 5, 2, 10, 15, 1).unwrap(),
            physical_value: 1000.5,
            raw_value: 4002,
            sequence: 3,
            frame_index: 2,
            unit: unit.map(str::to_string),
            source: Some("can2_sniffer".to_string()),
        }
    }

    #[test]
    fn test_json_lines() {
        let mut buf = Vec::new();
        {
            let mut writer = JsonLinesWriter::new(&mut buf);
            writer.write_sample(&sample(Some("rpm"))).unwrap();
            writer.write_sample(&sample(None)).unwrap();
            writer.finish().unwrap();
        }

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["identifier"], "EngineSpeed_20240502101501_3");
        assert_eq!(first["physical_value"], 1000.5);
        assert_eq!(first["result_time"], "2024-05-02T10:15:01.000Z");
        assert_eq!(first["unit"], "rpm");
        assert_eq!(first["frame_index"], 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second.get("unit").is_none());
    }

    #[test]
    fn test_delimited_output() {
        let mut buf = Vec::new();
        {
            let mut writer = DelimitedWriter::new(&mut buf, ';');
            writer.write_sample(&sample(Some("km;h"))).unwrap();
            writer.finish().unwrap();
        }

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "identifier;signal_id;physical_value;result_time;raw_value;unit;source;frame_index"
        );
        assert_eq!(
            lines[1],
            "EngineSpeed_20240502101501_3;EngineSpeed;1000.5;2024-05-02T10:15:01.000Z;4002;\"km;h\";can2_sniffer;2"
        );
    }

    #[test]
    fn test_delimited_header_without_samples() {
        let mut buf = Vec::new();
        DelimitedWriter::new(&mut buf, ',').finish().unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "identifier,signal_id,physical_value,result_time,raw_value,unit,source,frame_index\n"
        );
    }
}
