//! Shared machinery for the record streams: per-record context, the event
//! surface, and the state both readers and writers advance through.
//!
//! Events are plain callbacks folded with short-circuit semantics instead of
//! mutable "handled" flags: a handler returns an action, and the first
//! handler that resolves an error wins. Column-level resolutions substitute
//! a value and let the remaining columns proceed; record-level resolutions
//! discard the offending record and let the stream continue.

use crate::error::FlatFileError;
use crate::schema::Schema;
use crate::value::Value;

/// Per-record state handed to codecs and event handlers.
///
/// `physical_record_number` counts every raw record consumed from the
/// source, including headers and skipped records; `logical_record_number`
/// counts only successfully parsed, non-skipped records. Both are the
/// numbers of the record currently in flight.
pub struct RecordContext<'a> {
    pub schema: &'a Schema,
    /// The exact unparsed record span, without its record separator. Empty
    /// on the write path.
    pub record_text: &'a str,
    pub raw_fields: &'a [String],
    pub physical_record_number: u64,
    pub logical_record_number: u64,
}

/// Fired after tokenization, before parsing. Handlers see the raw fields
/// and may drop the record.
pub struct RecordReadEvent<'a> {
    pub record: u64,
    pub record_text: &'a str,
    pub raw_fields: &'a [String],
}

/// What a [`RecordReadEvent`] handler wants done with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAction {
    Keep,
    /// Drop the record without parsing it. Skipped records do not advance
    /// the logical record number.
    Skip,
}

/// Fired after a record parsed successfully.
pub struct RecordParsedEvent<'a> {
    pub record: u64,
    pub logical_record: u64,
    pub values: &'a [Option<Value>],
}

/// Fired before a record's values are formatted.
pub struct RecordWriteEvent<'a> {
    pub record: u64,
    pub values: &'a [Option<Value>],
}

/// Fired after a record has been emitted to the sink.
pub struct RecordWrittenEvent<'a> {
    pub record: u64,
    pub raw_fields: &'a [String],
}

/// One column codec failed.
pub struct ColumnErrorEvent<'a> {
    pub record: u64,
    pub column: &'a str,
    pub raw_text: &'a str,
    pub error: &'a FlatFileError,
}

/// Resolution of a [`ColumnErrorEvent`].
pub enum ColumnErrorAction {
    /// Use this value in place of the unconvertible field and keep
    /// processing the remaining columns.
    Substitute(Option<Value>),
    Unhandled,
}

/// A whole record failed: bad syntax, wrong shape, no schema, or an
/// unresolved column error.
pub struct RecordErrorEvent<'a> {
    pub record: u64,
    /// Raw fields, when tokenization got far enough to produce them.
    pub raw_fields: &'a [String],
    pub error: &'a FlatFileError,
}

/// Resolution of a [`RecordErrorEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordErrorAction {
    /// Suppress the record and keep streaming.
    Discard,
    Unhandled,
}

/// Where a stream is in its lifecycle. Any error that escapes its event
/// handler moves the stream to `Errored`, and every operation after that
/// fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamState {
    Fresh,
    Active,
    Drained,
    Errored,
}

/// A tokenized raw record: the field vector plus the exact unparsed span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub fields: Vec<String>,
    pub text: String,
}

/// Tokenizer-level failure, before record numbers are known. The stream
/// layer attaches the number.
#[derive(Debug)]
pub(crate) enum TokenizeError {
    Io(std::io::Error),
    Syntax(String),
}

impl TokenizeError {
    pub(crate) fn at_record(self, record: u64) -> FlatFileError {
        match self {
            TokenizeError::Io(source) => FlatFileError::SourceIo { record, source },
            TokenizeError::Syntax(message) => FlatFileError::Syntax { record, message },
        }
    }
}

impl From<std::io::Error> for TokenizeError {
    fn from(source: std::io::Error) -> Self {
        TokenizeError::Io(source)
    }
}

type RecordReadHandler = Box<dyn FnMut(&RecordReadEvent<'_>) -> ReadAction>;
type RecordParsedHandler = Box<dyn FnMut(&RecordParsedEvent<'_>)>;
type RecordWriteHandler = Box<dyn FnMut(&RecordWriteEvent<'_>)>;
type RecordWrittenHandler = Box<dyn FnMut(&RecordWrittenEvent<'_>)>;
type ColumnErrorHandler = Box<dyn FnMut(&ColumnErrorEvent<'_>) -> ColumnErrorAction>;
type RecordErrorHandler = Box<dyn FnMut(&RecordErrorEvent<'_>) -> RecordErrorAction>;

/// Ordered subscriber lists for the read path.
#[derive(Default)]
pub(crate) struct ReaderHooks {
    pub(crate) record_read: Vec<RecordReadHandler>,
    pub(crate) record_parsed: Vec<RecordParsedHandler>,
    pub(crate) column_error: Vec<ColumnErrorHandler>,
    pub(crate) record_error: Vec<RecordErrorHandler>,
}

impl ReaderHooks {
    /// Any subscriber asking for a skip wins.
    pub(crate) fn fire_record_read(&mut self, event: &RecordReadEvent<'_>) -> ReadAction {
        let mut action = ReadAction::Keep;
        for handler in &mut self.record_read {
            if handler(event) == ReadAction::Skip {
                action = ReadAction::Skip;
            }
        }
        action
    }

    pub(crate) fn fire_record_parsed(&mut self, event: &RecordParsedEvent<'_>) {
        for handler in &mut self.record_parsed {
            handler(event);
        }
    }

    /// First substitution wins.
    pub(crate) fn fire_column_error(&mut self, event: &ColumnErrorEvent<'_>) -> ColumnErrorAction {
        for handler in &mut self.column_error {
            if let ColumnErrorAction::Substitute(value) = handler(event) {
                return ColumnErrorAction::Substitute(value);
            }
        }
        ColumnErrorAction::Unhandled
    }

    /// First discard wins.
    pub(crate) fn fire_record_error(&mut self, event: &RecordErrorEvent<'_>) -> RecordErrorAction {
        for handler in &mut self.record_error {
            if handler(event) == RecordErrorAction::Discard {
                return RecordErrorAction::Discard;
            }
        }
        RecordErrorAction::Unhandled
    }
}

/// Ordered subscriber lists for the write path.
#[derive(Default)]
pub(crate) struct WriterHooks {
    pub(crate) record_write: Vec<RecordWriteHandler>,
    pub(crate) record_written: Vec<RecordWrittenHandler>,
    pub(crate) column_error: Vec<ColumnErrorHandler>,
    pub(crate) record_error: Vec<RecordErrorHandler>,
}

impl WriterHooks {
    pub(crate) fn fire_record_write(&mut self, event: &RecordWriteEvent<'_>) {
        for handler in &mut self.record_write {
            handler(event);
        }
    }

    pub(crate) fn fire_record_written(&mut self, event: &RecordWrittenEvent<'_>) {
        for handler in &mut self.record_written {
            handler(event);
        }
    }

    pub(crate) fn fire_column_error(&mut self, event: &ColumnErrorEvent<'_>) -> ColumnErrorAction {
        for handler in &mut self.column_error {
            if let ColumnErrorAction::Substitute(value) = handler(event) {
                return ColumnErrorAction::Substitute(value);
            }
        }
        ColumnErrorAction::Unhandled
    }

    pub(crate) fn fire_record_error(&mut self, event: &RecordErrorEvent<'_>) -> RecordErrorAction {
        for handler in &mut self.record_error {
            if handler(event) == RecordErrorAction::Discard {
                return RecordErrorAction::Discard;
            }
        }
        RecordErrorAction::Unhandled
    }
}
