use thiserror::Error;

/// Maximum number of characters of offending raw text carried inside an
/// error value. Longer text is clipped with a trailing ellipsis.
const RAW_TEXT_LIMIT: usize = 64;

#[derive(Error, Debug)]
/// Flat file error
///
/// Every failure surfaced by a reader or writer is one of these variants.
/// Record-scoped variants carry the physical record number (1-based, counting
/// every raw record consumed, including headers and skipped records) so the
/// offending line can be located in the source file.
pub enum FlatFileError {
    /// The underlying character source failed. Always fatal.
    #[error("i/o error at record {record}")]
    SourceIo {
        record: u64,
        #[source]
        source: std::io::Error,
    },

    /// The tokenizer could not make sense of the raw record, for example an
    /// unterminated quoted field.
    #[error("syntax error at record {record}: {message}")]
    Syntax { record: u64, message: String },

    /// A column codec rejected the raw text of one field.
    #[error("record {record}, column '{column}': cannot convert {text:?}: {message}")]
    ColumnConversion {
        record: u64,
        column: String,
        text: String,
        message: String,
    },

    /// The record did not have the number of fields the schema expects.
    #[error("record {record} has {actual} fields, schema expects {expected}")]
    RecordShape {
        record: u64,
        actual: usize,
        expected: usize,
    },

    /// No selector predicate matched the record and no fallback schema was
    /// configured.
    #[error("no schema matched record {record}")]
    SchemaSelection { record: u64 },

    /// A column was added whose name collides (case-insensitively) with an
    /// existing column.
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    /// A fixed-width schema column has no window.
    #[error("column '{0}' has no fixed-width window")]
    MissingWindow(String),

    /// A reader or writer was built from options that violate an invariant,
    /// for example an empty field separator.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The reader or writer was used out of order, for example `get_values`
    /// before the first successful read, or any operation after a fatal
    /// error. Never routed through an event handler.
    #[error("{0}")]
    State(&'static str),
}

/// Bounds raw text destined for an error value.
pub(crate) fn clip(text: &str) -> String {
    if text.chars().count() <= RAW_TEXT_LIMIT {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(RAW_TEXT_LIMIT).collect();
    clipped.push('…');
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("apple"), "apple");
    }

    #[test]
    fn clip_bounds_long_text() {
        let long = "x".repeat(500);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), RAW_TEXT_LIMIT + 1);
        assert!(clipped.ends_with('…'));
    }

    #[test]
    fn display_carries_record_number() {
        let err = FlatFileError::RecordShape {
            record: 7,
            actual: 2,
            expected: 3,
        };
        assert_eq!(err.to_string(), "record 7 has 2 fields, schema expects 3");
    }
}
