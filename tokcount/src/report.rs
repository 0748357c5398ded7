//! Per-entry and whole-run token statistics, and how they're printed.
use crate::input::InputEntry;
use instoken::{Resolution, TokenInt};
use serde::Serialize;
use std::fmt::{self, Write};

/// Previews are cut to this many characters
pub const PREVIEW_CHARS: usize = 60;

/// Only this many token IDs are shown per row in the text rendering
pub const PREVIEW_TOKEN_IDS: usize = 20;

/// What the run counted with
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportHeader {
    /// Name of the encoding used for every entry
    pub encoding: String,

    pub model_hint: Option<String>,

    /// A model hint was given, but no encoding is known for it
    pub unrecognized_hint: bool,
}

impl ReportHeader {
    pub fn new(resolution: &Resolution, model_hint: Option<&str>) -> Self {
        Self {
            encoding: resolution.encoding().name().to_string(),
            model_hint: model_hint.map(String::from),
            unrecognized_hint: resolution.is_fallback()
                && model_hint.map_or(false, |hint| !hint.trim().is_empty()),
        }
    }
}

/// The statistics for one entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub position: usize,
    pub token_count: usize,

    /// The start of the entry's text, with newlines escaped so it fits on one line
    pub preview: String,

    pub token_ids: Vec<TokenInt>,
}

impl ReportRow {
    pub fn new(entry: &InputEntry, token_ids: Vec<TokenInt>) -> Self {
        Self {
            position: entry.position,
            token_count: token_ids.len(),
            preview: preview(&entry.text),
            token_ids,
        }
    }
}

/// Escape newlines as `\n`, then keep at most [`PREVIEW_CHARS`] characters.
fn preview(text: &str) -> String {
    text.replace('\n', "\\n").chars().take(PREVIEW_CHARS).collect()
}

/// Totals over all rows of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_entries: usize,
    pub total_tokens: usize,
}

impl RunSummary {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        Self {
            total_entries: rows.len(),
            total_tokens: rows.iter().map(|row| row.token_count).sum(),
        }
    }
}

/// The complete result of a counting run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    header: ReportHeader,
    rows: Vec<ReportRow>,
    summary: RunSummary,
}

impl Report {
    pub fn new(header: ReportHeader, rows: Vec<ReportRow>) -> Self {
        let summary = RunSummary::from_rows(&rows);

        Self {
            header,
            rows,
            summary,
        }
    }

    pub fn header(&self) -> &ReportHeader {
        &self.header
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Render as human readable text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        // Writing to a String can't fail
        let _ = self.write_text(&mut out);

        out
    }

    /// Render as pretty printed JSON, with every token ID of every row.
    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn write_text(&self, out: &mut impl Write) -> fmt::Result {
        let header = &self.header;
        writeln!(
            out,
            "Encoding: {} (model hint: {})",
            header.encoding,
            header.model_hint.as_deref().unwrap_or("None")
        )?;
        if header.unrecognized_hint {
            writeln!(
                out,
                "No encoding is known for this model; using the baseline encoding"
            )?;
        }
        writeln!(out)?;

        for row in &self.rows {
            writeln!(
                out,
                "{:>2}. tokens={:>4} | {}",
                row.position, row.token_count, row.preview
            )?;

            let shown = &row.token_ids[..row.token_ids.len().min(PREVIEW_TOKEN_IDS)];
            write!(out, "    ids=[")?;
            for (i, id) in shown.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "{id}")?;
            }
            write!(out, "]")?;
            if row.token_ids.len() > PREVIEW_TOKEN_IDS {
                write!(out, "...")?;
            }
            writeln!(out)?;
        }

        writeln!(out)?;
        writeln!(out, "Summary:")?;
        writeln!(out, "  Text entries: {}", self.summary.total_entries)?;
        writeln!(out, "  Total tokens: {}", self.summary.total_tokens)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_text(f)
    }
}
