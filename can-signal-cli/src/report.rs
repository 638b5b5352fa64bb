//! End-of-run report
//!
//! Plain text summary of a decode run plus an optional preview of the
//! first decoded samples.

use can_signal_decoder::{CatalogStats, DecodedSample, RunStats};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════";

/// Everything the summary needs about a finished run
pub struct RunReport<'a> {
    pub catalog: CatalogStats,
    pub files: usize,
    pub stats: &'a RunStats,
    pub preview: &'a [DecodedSample],
    /// Set when the run ended on an error
    pub failure: Option<String>,
}

impl RunReport<'_> {
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", RULE)?;
        writeln!(out, "  CAN Signal Decoder - Run Summary")?;
        writeln!(out, "{}", RULE)?;
        writeln!(
            out,
            "  Catalog:          {} frame(s), {} signal(s)",
            self.catalog.num_frames, self.catalog.num_signals
        )?;
        writeln!(out, "  Frame logs:       {}", self.files)?;
        writeln!(out, "  Frames read:      {}", self.stats.frames_read)?;
        writeln!(out, "  Frames matched:   {}", self.stats.frames_matched)?;
        writeln!(out, "  Frames unmatched: {}", self.stats.frames_unmatched)?;
        if self.stats.frames_filtered > 0 {
            writeln!(out, "  Frames filtered:  {}", self.stats.frames_filtered)?;
        }
        writeln!(out, "  Samples decoded:  {}", self.stats.samples_decoded)?;
        writeln!(out, "  Records skipped:  {}", self.stats.total_skipped())?;
        for (reason, count) in &self.stats.skipped {
            writeln!(out, "    {:<20} {}", format!("{}:", reason), count)?;
        }

        match &self.failure {
            Some(reason) => writeln!(out, "  Status:           aborted ({})", reason)?,
            None => writeln!(out, "  Status:           complete")?,
        }

        if !self.preview.is_empty() {
            writeln!(out)?;
            write_preview(out, self.preview)?;
        }
        Ok(())
    }
}

/// Aligned table of samples
pub fn write_preview(out: &mut dyn Write, samples: &[DecodedSample]) -> io::Result<()> {
    let headers = ["identifier", "physical_value", "raw_value", "unit"];
    let rows: Vec<[String; 4]> = samples
        .iter()
        .map(|s| {
            [
                s.identifier(),
                s.physical_value.to_string(),
                s.raw_value.to_string(),
                s.unit.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    writeln!(
        out,
        "  {:<w0$}  {:>w1$}  {:>w2$}  {:<w3$}",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3]
    )?;
    for row in &rows {
        writeln!(
            out,
            "  {:<w0$}  {:>w1$}  {:>w2$}  {:<w3$}",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3]
        )?;
    }
    Ok(())
}
