//! Human-facing record of a traversal.
//!
//! Recorders keep their own depth: entering a folder indents everything that
//! follows until the matching exit, so the report reads as an outline of the
//! folder tree.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const REPORT_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute][second]");

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),
}

pub trait TraceRecorder {
    fn enter_folder(&mut self, name: &str, url: &str) -> Result<(), TraceError>;

    fn exit_folder(&mut self) -> Result<(), TraceError>;

    fn visit_file(&mut self, name: &str, url: &str) -> Result<(), TraceError>;

    fn record_conversion(
        &mut self,
        original_name: &str,
        original_url: &str,
        converted_name: &str,
        converted_url: &str,
    ) -> Result<(), TraceError>;

    fn record_failure(&mut self, name: &str, url: &str, reason: &str) -> Result<(), TraceError>;

    /// Continues a walk that an earlier run started, `depth` folders deep.
    fn resume_at(&mut self, depth: usize) -> Result<(), TraceError>;

    fn depth(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    EnterFolder {
        name: String,
        url: String,
        depth: usize,
    },
    ExitFolder {
        depth: usize,
    },
    VisitFile {
        name: String,
        url: String,
        depth: usize,
    },
    Conversion {
        original_name: String,
        original_url: String,
        converted_name: String,
        converted_url: String,
        depth: usize,
    },
    Failure {
        name: String,
        url: String,
        reason: String,
        depth: usize,
    },
}

/// Keeps every event in memory for inspecting a traversal programmatically.
#[derive(Debug, Default)]
pub struct MemoryTrace {
    events: Vec<TraceEvent>,
    depth: usize,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Names of entered folders in the order they were entered.
    pub fn entered_folders(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::EnterFolder { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl TraceRecorder for MemoryTrace {
    fn enter_folder(&mut self, name: &str, url: &str) -> Result<(), TraceError> {
        self.events.push(TraceEvent::EnterFolder {
            name: name.to_string(),
            url: url.to_string(),
            depth: self.depth,
        });
        self.depth += 1;
        Ok(())
    }

    fn exit_folder(&mut self) -> Result<(), TraceError> {
        self.depth = self.depth.saturating_sub(1);
        self.events.push(TraceEvent::ExitFolder { depth: self.depth });
        Ok(())
    }

    fn visit_file(&mut self, name: &str, url: &str) -> Result<(), TraceError> {
        self.events.push(TraceEvent::VisitFile {
            name: name.to_string(),
            url: url.to_string(),
            depth: self.depth,
        });
        Ok(())
    }

    fn record_conversion(
        &mut self,
        original_name: &str,
        original_url: &str,
        converted_name: &str,
        converted_url: &str,
    ) -> Result<(), TraceError> {
        self.events.push(TraceEvent::Conversion {
            original_name: original_name.to_string(),
            original_url: original_url.to_string(),
            converted_name: converted_name.to_string(),
            converted_url: converted_url.to_string(),
            depth: self.depth,
        });
        Ok(())
    }

    fn record_failure(&mut self, name: &str, url: &str, reason: &str) -> Result<(), TraceError> {
        self.events.push(TraceEvent::Failure {
            name: name.to_string(),
            url: url.to_string(),
            reason: reason.to_string(),
            depth: self.depth,
        });
        Ok(())
    }

    fn resume_at(&mut self, depth: usize) -> Result<(), TraceError> {
        self.depth = depth;
        Ok(())
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

/// Tab-separated report meant to be opened as a spreadsheet. Each event is one
/// row whose first cell is shifted right by the current depth; links become
/// `HYPERLINK` formulas.
pub struct SheetTrace<W: Write> {
    out: W,
    depth: usize,
    rows: usize,
}

impl SheetTrace<BufWriter<File>> {
    /// Creates a fresh report file in `dir`, one per run.
    pub fn create_in(dir: &Path) -> Result<(Self, PathBuf), TraceError> {
        fs::create_dir_all(dir)?;
        let stamp = OffsetDateTime::now_utc().format(REPORT_STAMP)?;
        let path = dir.join(format!("trace-{stamp}.tsv"));
        let file = File::create(&path)?;
        Ok((Self::new(BufWriter::new(file)), path))
    }
}

impl<W: Write> SheetTrace<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            depth: 0,
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_row(&mut self, cells: &[String]) -> Result<(), TraceError> {
        let mut line = "\t".repeat(self.depth);
        line.push_str(&cells.join("\t"));
        line.push('\n');
        self.out.write_all(line.as_bytes())?;
        // Rows must survive the process being killed right after.
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }
}

impl<W: Write> TraceRecorder for SheetTrace<W> {
    fn enter_folder(&mut self, name: &str, url: &str) -> Result<(), TraceError> {
        self.write_row(&[link_cell(name, url)])?;
        self.depth += 1;
        Ok(())
    }

    fn exit_folder(&mut self) -> Result<(), TraceError> {
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn visit_file(&mut self, name: &str, _url: &str) -> Result<(), TraceError> {
        self.write_row(&[text_cell(name)])
    }

    fn record_conversion(
        &mut self,
        original_name: &str,
        original_url: &str,
        converted_name: &str,
        converted_url: &str,
    ) -> Result<(), TraceError> {
        self.write_row(&[
            link_cell(original_name, original_url),
            "--->".to_string(),
            link_cell(converted_name, converted_url),
        ])
    }

    fn record_failure(&mut self, name: &str, url: &str, reason: &str) -> Result<(), TraceError> {
        self.write_row(&[
            link_cell(name, url),
            "FAILED".to_string(),
            text_cell(reason),
        ])
    }

    fn resume_at(&mut self, depth: usize) -> Result<(), TraceError> {
        self.depth = depth;
        Ok(())
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

fn text_cell(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

fn link_cell(text: &str, url: &str) -> String {
    if url.is_empty() {
        return text_cell(text);
    }
    format!(
        "=HYPERLINK(\"{}\",\"{}\")",
        text_cell(url).replace('"', "\"\""),
        text_cell(text).replace('"', "\"\"")
    )
}
