//! Fixed-width records: every column occupies a window of a known number of
//! characters.

use crate::error::FlatFileError;
use crate::schema::{Alignment, Schema, Truncation};

mod reader;
mod tokenizer;
mod writer;

pub use reader::{FixedWidthReader, FixedWidthReaderBuilder};
pub use writer::{FixedWidthWriter, FixedWidthWriterBuilder};

/// What to do with a record shorter than the schema's window total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialRecordPolicy {
    /// Windows past the end of the record become empty fields.
    #[default]
    FillEmpty,
    /// A short record is a syntax error.
    Error,
}

/// Options shared by fixed-width readers and writers.
#[derive(Debug, Clone)]
pub struct FixedWidthOptions {
    pub(crate) fill_character: char,
    pub(crate) alignment: Alignment,
    pub(crate) truncation: Truncation,
    /// Whether records are terminated by a separator at all. Without one,
    /// every record is exactly the window total long.
    pub(crate) has_record_separator: bool,
    pub(crate) record_separator: Option<String>,
    pub(crate) is_first_record_header: bool,
    pub(crate) partial_record_policy: PartialRecordPolicy,
}

impl Default for FixedWidthOptions {
    fn default() -> Self {
        FixedWidthOptions {
            fill_character: ' ',
            alignment: Alignment::LeftAligned,
            truncation: Truncation::TruncateTrailing,
            has_record_separator: true,
            record_separator: None,
            is_first_record_header: false,
            partial_record_policy: PartialRecordPolicy::default(),
        }
    }
}

impl FixedWidthOptions {
    pub fn new() -> Self {
        FixedWidthOptions::default()
    }

    pub fn fill_character(mut self, fill: char) -> Self {
        self.fill_character = fill;
        self
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn has_record_separator(mut self, yes: bool) -> Self {
        self.has_record_separator = yes;
        self
    }

    pub fn record_separator(mut self, separator: impl Into<String>) -> Self {
        self.record_separator = Some(separator.into());
        self
    }

    pub fn has_headers(mut self, yes: bool) -> Self {
        self.is_first_record_header = yes;
        self
    }

    pub fn partial_record_policy(mut self, policy: PartialRecordPolicy) -> Self {
        self.partial_record_policy = policy;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), FlatFileError> {
        if let Some(record_separator) = &self.record_separator {
            if record_separator.is_empty() {
                return Err(FlatFileError::InvalidOptions(
                    "the record separator must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Record-separator candidates for the read side, longest first.
    pub(crate) fn record_separator_candidates(&self) -> Vec<String> {
        match &self.record_separator {
            Some(separator) => vec![separator.clone()],
            None => vec!["\r\n".to_string(), "\r".to_string(), "\n".to_string()],
        }
    }

    pub(crate) fn written_record_separator(&self) -> &str {
        self.record_separator.as_deref().unwrap_or("\n")
    }
}

/// A column window with every per-column override folded against the
/// format-level defaults.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedWindow {
    pub(crate) width: usize,
    pub(crate) alignment: Alignment,
    pub(crate) fill: char,
    pub(crate) truncation: Truncation,
}

/// Resolves the windows of every field-occupying column. Fails if a data or
/// ignored column has no window, or a window is zero-wide.
pub(crate) fn resolve_windows(
    schema: &Schema,
    options: &FixedWidthOptions,
) -> Result<Vec<ResolvedWindow>, FlatFileError> {
    let mut windows = Vec::with_capacity(schema.logical_count());
    for column in schema.columns() {
        if column.is_metadata() {
            continue;
        }
        let window = column
            .window_spec()
            .ok_or_else(|| FlatFileError::MissingWindow(column.name().to_string()))?;
        if window.width() == 0 {
            return Err(FlatFileError::InvalidOptions(format!(
                "column '{}' has a zero-width window",
                column.name()
            )));
        }
        windows.push(ResolvedWindow {
            width: window.width(),
            alignment: window.alignment.unwrap_or(options.alignment),
            fill: window.fill.unwrap_or(options.fill_character),
            truncation: window.truncation.unwrap_or(options.truncation),
        });
    }
    Ok(windows)
}
