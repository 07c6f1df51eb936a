//! Separator-based records: `a,b,"c,d"` and friends.

use crate::error::FlatFileError;

mod reader;
mod tokenizer;
mod writer;

pub use reader::{DelimitedReader, DelimitedReaderBuilder};
pub use writer::{DelimitedWriter, DelimitedWriterBuilder};

/// When the writer wraps a field in quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteBehavior {
    /// Quote only fields that would otherwise be ambiguous: ones containing
    /// the field separator, a record-separator character, the quote itself,
    /// or leading/trailing whitespace.
    #[default]
    AsNeeded,
    Always,
    /// Never quote. The write-side mirror of partitioned reading.
    Never,
}

/// Options shared by delimited readers and writers.
///
/// Mutated through the chainable setters, usually via the matching builder
/// methods on [`DelimitedReaderBuilder`] and [`DelimitedWriterBuilder`].
#[derive(Debug, Clone)]
pub struct DelimitedOptions {
    pub(crate) separator: String,
    /// `None` means: accept any of `\r\n`, `\r`, `\n` on read and emit `\n`
    /// on write.
    pub(crate) record_separator: Option<String>,
    pub(crate) quote: char,
    pub(crate) is_first_record_header: bool,
    pub(crate) preserve_whitespace: bool,
    /// Partitioned mode: quotes are ordinary characters.
    pub(crate) partitioned: bool,
    pub(crate) allow_embedded_line_endings: bool,
    pub(crate) quote_behavior: QuoteBehavior,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        DelimitedOptions {
            separator: ",".to_string(),
            record_separator: None,
            quote: '"',
            is_first_record_header: false,
            preserve_whitespace: false,
            partitioned: false,
            allow_embedded_line_endings: true,
            quote_behavior: QuoteBehavior::default(),
        }
    }
}

impl DelimitedOptions {
    pub fn new() -> Self {
        DelimitedOptions::default()
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn record_separator(mut self, separator: impl Into<String>) -> Self {
        self.record_separator = Some(separator.into());
        self
    }

    pub fn quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    pub fn has_headers(mut self, yes: bool) -> Self {
        self.is_first_record_header = yes;
        self
    }

    pub fn preserve_whitespace(mut self, yes: bool) -> Self {
        self.preserve_whitespace = yes;
        self
    }

    pub fn partitioned(mut self, yes: bool) -> Self {
        self.partitioned = yes;
        self
    }

    pub fn allow_embedded_line_endings(mut self, yes: bool) -> Self {
        self.allow_embedded_line_endings = yes;
        self
    }

    pub fn quote_behavior(mut self, behavior: QuoteBehavior) -> Self {
        self.quote_behavior = behavior;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), FlatFileError> {
        if self.separator.is_empty() {
            return Err(FlatFileError::InvalidOptions(
                "the field separator must not be empty".to_string(),
            ));
        }
        if self.separator.contains(self.quote) {
            return Err(FlatFileError::InvalidOptions(
                "the field separator must not contain the quote character".to_string(),
            ));
        }
        if let Some(record_separator) = &self.record_separator {
            if record_separator.is_empty() {
                return Err(FlatFileError::InvalidOptions(
                    "the record separator must not be empty".to_string(),
                ));
            }
            if record_separator == &self.separator {
                return Err(FlatFileError::InvalidOptions(
                    "the record separator must differ from the field separator".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Record-separator candidates for the read side, longest first.
    pub(crate) fn record_separator_candidates(&self) -> Vec<&str> {
        match &self.record_separator {
            Some(separator) => vec![separator.as_str()],
            None => vec!["\r\n", "\r", "\n"],
        }
    }

    /// What the write side emits between records.
    pub(crate) fn written_record_separator(&self) -> &str {
        self.record_separator.as_deref().unwrap_or("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_format() {
        let options = DelimitedOptions::default();
        assert_eq!(options.separator, ",");
        assert_eq!(options.quote, '"');
        assert!(options.allow_embedded_line_endings);
        assert_eq!(options.record_separator_candidates(), ["\r\n", "\r", "\n"]);
        assert_eq!(options.written_record_separator(), "\n");
    }

    #[test]
    fn empty_separator_is_rejected() {
        let options = DelimitedOptions::new().separator("");
        assert!(matches!(
            options.validate(),
            Err(FlatFileError::InvalidOptions(_))
        ));
    }

    #[test]
    fn quote_inside_separator_is_rejected() {
        let options = DelimitedOptions::new().separator("\",\"");
        assert!(options.validate().is_err());
    }
}
