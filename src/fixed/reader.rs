use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::FlatFileError;
use crate::fixed::tokenizer::{partition, FixedWindowTokenizer};
use crate::fixed::{resolve_windows, FixedWidthOptions, PartialRecordPolicy, ResolvedWindow};
use crate::schema::{Schema, SchemaSelector};
use crate::source::{CharSource, IoSource, StringSource};
use crate::stream::{
    ColumnErrorAction, ColumnErrorEvent, ReadAction, ReaderHooks, RecordContext,
    RecordErrorAction, RecordErrorEvent, RecordParsedEvent, RecordReadEvent, StreamState,
};
use crate::value::Value;

enum SchemaSource {
    Provided {
        schema: Arc<Schema>,
        windows: Vec<ResolvedWindow>,
        total_width: usize,
    },
    /// Predicates probe the raw record text: fields only exist once a
    /// schema's windows are known.
    Selector(SchemaSelector<str>),
}

/// Configures and builds a [`FixedWidthReader`].
///
/// ```
/// use flatrec::{Column, FixedWidthReaderBuilder, Schema, Value, Window};
///
/// # fn main() -> Result<(), flatrec::FlatFileError> {
/// let schema = Schema::new()
///     .add_column(Column::string("name").window(Window::new(10)))?
///     .add_column(Column::int32("weight").window(Window::new(5)))?;
///
/// let mut reader = FixedWidthReaderBuilder::new()
///     .schema(schema)
///     .from_str("bob         185\n")?;
/// assert!(reader.read()?);
/// assert_eq!(reader.get_values()?[1], Some(Value::Int(185)));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct FixedWidthReaderBuilder {
    options: FixedWidthOptions,
    schema: Option<Schema>,
    selector: Option<SchemaSelector<str>>,
    verify_header: bool,
}

impl FixedWidthReaderBuilder {
    pub fn new() -> Self {
        FixedWidthReaderBuilder {
            options: FixedWidthOptions::default(),
            schema: None,
            selector: None,
            verify_header: false,
        }
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Picks a schema per record by probing the raw record text. Requires a
    /// record separator, since the record boundary must be findable without
    /// knowing any schema's windows.
    pub fn selector(mut self, selector: SchemaSelector<str>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn options(mut self, options: FixedWidthOptions) -> Self {
        self.options = options;
        self
    }

    pub fn fill_character(mut self, fill: char) -> Self {
        self.options = self.options.fill_character(fill);
        self
    }

    pub fn alignment(mut self, alignment: crate::schema::Alignment) -> Self {
        self.options = self.options.alignment(alignment);
        self
    }

    pub fn has_record_separator(mut self, yes: bool) -> Self {
        self.options = self.options.has_record_separator(yes);
        self
    }

    pub fn record_separator(mut self, separator: impl Into<String>) -> Self {
        self.options = self.options.record_separator(separator);
        self
    }

    /// Consumes and discards the first record before streaming begins.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.options = self.options.has_headers(yes);
        self
    }

    pub fn partial_record_policy(mut self, policy: PartialRecordPolicy) -> Self {
        self.options = self.options.partial_record_policy(policy);
        self
    }

    /// Checks the discarded header record against the schema's column names
    /// and routes a mismatch through the record-level error path.
    pub fn verify_header(mut self, yes: bool) -> Self {
        self.verify_header = yes;
        self
    }

    /// Creates a `FixedWidthReader` over a string.
    ///
    /// # Parameters
    /// - `data`: The fixed-width text to read
    ///
    /// # Returns
    /// A reader over the string, or an error if the options, schema or
    /// windows are invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, FixedWidthReaderBuilder, Schema, Value, Window};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("label").window(Window::new(6)))?
    ///     .add_column(Column::int32("amount").window(Window::new(4)))?;
    ///
    /// let mut reader = FixedWidthReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("taxes   42\n")?;
    /// assert!(reader.read()?);
    /// assert_eq!(reader.get_values()?[1], Some(Value::Int(42)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_str(self, data: &str) -> Result<FixedWidthReader<StringSource>, FlatFileError> {
        self.from_source(StringSource::new(data))
    }

    /// Creates a `FixedWidthReader` from any [`Read`] implementation. The
    /// bytes are decoded as UTF-8 and buffered internally.
    ///
    /// # Parameters
    /// - `reader`: The reader providing the fixed-width bytes
    ///
    /// # Returns
    /// A reader over the decoded text, or an error if the configuration is
    /// invalid.
    pub fn from_reader<R: Read>(
        self,
        reader: R,
    ) -> Result<FixedWidthReader<IoSource<R>>, FlatFileError> {
        self.from_source(IoSource::new(reader))
    }

    /// Creates a `FixedWidthReader` over a file.
    ///
    /// # Parameters
    /// - `path`: The path of the file to read
    ///
    /// # Returns
    /// A reader over the file, or an error if the file cannot be opened or
    /// the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flatrec::{Column, FixedWidthReaderBuilder, Schema, Window};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name").window(Window::new(10)))?
    ///     .add_column(Column::int32("weight").window(Window::new(5)))?;
    ///
    /// let mut reader = FixedWidthReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_path("people.dat")?;
    /// while reader.read()? {
    ///     println!("{:?}", reader.get_values()?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path(
        self,
        path: impl AsRef<Path>,
    ) -> Result<FixedWidthReader<IoSource<File>>, FlatFileError> {
        let file = File::open(path).map_err(|source| FlatFileError::SourceIo {
            record: 0,
            source,
        })?;
        self.from_source(IoSource::new(file))
    }

    /// Creates a `FixedWidthReader` over any [`CharSource`].
    ///
    /// This is the terminal every other `from_*` method funnels into, and
    /// where the configuration is validated: the options are checked,
    /// every schema the reader can encounter must have a window on each
    /// field-occupying column, and a selector requires a record separator.
    ///
    /// # Parameters
    /// - `source`: The character source feeding the tokenizer
    ///
    /// # Returns
    /// A reader over the source, or an error describing the configuration
    /// problem.
    pub fn from_source<S: CharSource>(
        self,
        source: S,
    ) -> Result<FixedWidthReader<S>, FlatFileError> {
        let FixedWidthReaderBuilder {
            options,
            schema,
            selector,
            verify_header,
        } = self;
        options.validate()?;
        let schema_source = match (schema, selector) {
            (Some(_), Some(_)) => {
                return Err(FlatFileError::InvalidOptions(
                    "supply a schema or a selector, not both".to_string(),
                ))
            }
            (Some(schema), None) => {
                let windows = resolve_windows(&schema, &options)?;
                let total_width = windows.iter().map(|w| w.width).sum();
                SchemaSource::Provided {
                    schema: Arc::new(schema),
                    windows,
                    total_width,
                }
            }
            (None, Some(selector)) => {
                if !options.has_record_separator {
                    return Err(FlatFileError::InvalidOptions(
                        "a schema selector requires a record separator".to_string(),
                    ));
                }
                for schema in selector.schemas() {
                    resolve_windows(schema, &options)?;
                }
                SchemaSource::Selector(selector)
            }
            (None, None) => {
                return Err(FlatFileError::InvalidOptions(
                    "a schema or a selector is required; fixed-width layouts cannot be inferred"
                        .to_string(),
                ))
            }
        };
        Ok(FixedWidthReader {
            tokenizer: FixedWindowTokenizer::new(source, &options),
            schema_source,
            hooks: ReaderHooks::default(),
            state: StreamState::Fresh,
            verify_header,
            options,
            physical: 0,
            logical: 0,
            values: None,
        })
    }
}

/// Streams typed records out of fixed-width text: the windowed counterpart
/// of [`DelimitedReader`](crate::delimited::DelimitedReader), with the same
/// state machine, events, and error policy.
///
/// # Type Parameters
///
/// - `S`: The character source feeding the tokenizer. Built through
///   [`FixedWidthReaderBuilder`], which picks the source type for you.
///
/// # Implementation Details
///
/// - Each record is cut out of the stream first (by record separator, or
///   by the schema's window total when separators are disabled) and only
///   then sliced into fields, so schema selection can probe the raw text
/// - Fill characters are stripped at tokenization time, on the side the
///   window's alignment pads
/// - Records shorter than the window total are governed by
///   [`PartialRecordPolicy`]; characters past the total are dropped
///
/// # Examples
///
/// ```
/// use flatrec::{Column, FixedWidthReaderBuilder, Schema, Value, Window};
///
/// # fn main() -> Result<(), flatrec::FlatFileError> {
/// let schema = Schema::new()
///     .add_column(Column::string("name").window(Window::new(10)))?
///     .add_column(Column::int32("weight").window(Window::new(5)))?;
///
/// let mut reader = FixedWidthReaderBuilder::new()
///     .schema(schema)
///     .from_str("bob         185\nalice       121\n")?;
///
/// assert!(reader.read()?);
/// assert_eq!(reader.get_values()?[0], Some(Value::from("bob")));
/// assert!(reader.read()?);
/// assert!(!reader.read()?);
/// # Ok(())
/// # }
/// ```
pub struct FixedWidthReader<S: CharSource> {
    tokenizer: FixedWindowTokenizer<S>,
    schema_source: SchemaSource,
    hooks: ReaderHooks,
    state: StreamState,
    verify_header: bool,
    options: FixedWidthOptions,
    physical: u64,
    logical: u64,
    values: Option<Vec<Option<Value>>>,
}

impl<S: CharSource> FixedWidthReader<S> {
    /// Advances to the next parsed record.
    ///
    /// # Reading Process
    ///
    /// 1. Cuts the next raw record text out of the stream; end of input
    ///    drains the stream
    /// 2. Picks the schema (fixed, or via the text-probing selector)
    /// 3. Slices the text into fields by the schema's windows, stripping
    ///    fill characters
    /// 4. Fires the record-read event; a subscriber may skip the record
    /// 5. Parses the fields through the column codecs, with the same
    ///    column- and record-level error policy as the delimited reader
    ///
    /// # Returns
    /// - `Ok(true)` when a record parsed; its values are available through
    ///   [`get_values`](Self::get_values)
    /// - `Ok(false)` once the input is exhausted
    /// - `Err(error)` when an error was left unhandled; the reader is
    ///   unusable afterwards
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, FixedWidthReaderBuilder, Schema, Window};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name").window(Window::new(10)))?
    ///     .add_column(Column::int32("weight").window(Window::new(5)))?;
    ///
    /// let mut reader = FixedWidthReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("bob         185\n")?;
    ///
    /// let mut count = 0;
    /// while reader.read()? {
    ///     count += 1;
    /// }
    /// assert_eq!(count, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn read(&mut self) -> Result<bool, FlatFileError> {
        match self.state {
            StreamState::Errored => return Err(FlatFileError::State("reading with errors")),
            StreamState::Drained => return Ok(false),
            StreamState::Fresh => self.handle_header()?,
            StreamState::Active => {}
        }
        if self.state == StreamState::Drained {
            return Ok(false);
        }
        loop {
            let text = match self.next_text() {
                Ok(Some(text)) => text,
                Ok(None) => {
                    self.values = None;
                    self.state = StreamState::Drained;
                    return Ok(false);
                }
                Err(error) => {
                    let error = error.at_record(self.physical + 1);
                    if matches!(error, FlatFileError::SourceIo { .. }) {
                        self.state = StreamState::Errored;
                        return Err(error);
                    }
                    self.physical += 1;
                    self.resolve_record_error(&[], error)?;
                    continue;
                }
            };
            self.physical += 1;
            let (schema, windows) = match self.schema_for(&text) {
                Ok(chosen) => chosen,
                Err(error) => {
                    self.resolve_record_error(&[], error)?;
                    continue;
                }
            };
            let fields =
                match partition(&text, &windows, self.options.partial_record_policy) {
                    Ok(fields) => fields,
                    Err(error) => {
                        let error = error.at_record(self.physical);
                        self.resolve_record_error(&[], error)?;
                        continue;
                    }
                };
            let read_event = RecordReadEvent {
                record: self.physical,
                record_text: &text,
                raw_fields: &fields,
            };
            if self.hooks.fire_record_read(&read_event) == ReadAction::Skip {
                debug!("record {} skipped by subscriber", self.physical);
                continue;
            }
            let ctx = RecordContext {
                schema: &schema,
                record_text: &text,
                raw_fields: &fields,
                physical_record_number: self.physical,
                logical_record_number: self.logical + 1,
            };
            let hooks = &mut self.hooks;
            let mut on_column_error = |event: &ColumnErrorEvent<'_>| {
                let action = hooks.fire_column_error(event);
                if matches!(action, ColumnErrorAction::Substitute(_)) {
                    warn!(
                        "column '{}' substituted at record {}: {}",
                        event.column, event.record, event.error
                    );
                }
                action
            };
            match schema.parse_record(&ctx, &fields, &mut on_column_error) {
                Ok(values) => {
                    self.logical += 1;
                    let parsed_event = RecordParsedEvent {
                        record: self.physical,
                        logical_record: self.logical,
                        values: &values,
                    };
                    self.hooks.fire_record_parsed(&parsed_event);
                    self.values = Some(values);
                    return Ok(true);
                }
                Err(error) => {
                    self.resolve_record_error(&fields, error)?;
                    continue;
                }
            }
        }
    }

    /// Cuts out and discards one record without parsing it.
    ///
    /// Only the physical record number advances; no events fire and no
    /// codecs run.
    ///
    /// # Returns
    /// - `Ok(true)` when a record was consumed
    /// - `Ok(false)` once the input is exhausted
    /// - `Err(error)` on an unhandled failure
    pub fn skip(&mut self) -> Result<bool, FlatFileError> {
        match self.state {
            StreamState::Errored => return Err(FlatFileError::State("reading with errors")),
            StreamState::Drained => return Ok(false),
            StreamState::Fresh => self.handle_header()?,
            StreamState::Active => {}
        }
        if self.state == StreamState::Drained {
            return Ok(false);
        }
        match self.next_text() {
            Ok(Some(_)) => {
                self.physical += 1;
                debug!("record {} skipped", self.physical);
                Ok(true)
            }
            Ok(None) => {
                self.values = None;
                self.state = StreamState::Drained;
                Ok(false)
            }
            Err(error) => {
                let error = error.at_record(self.physical + 1);
                if matches!(error, FlatFileError::SourceIo { .. }) {
                    self.state = StreamState::Errored;
                    return Err(error);
                }
                self.physical += 1;
                self.resolve_record_error(&[], error)?;
                Ok(true)
            }
        }
    }

    /// A defensive copy of the current record's values.
    ///
    /// The vector has one entry per non-ignored column: `None` for nulls,
    /// `Some(value)` otherwise, in schema order.
    ///
    /// # Returns
    /// The value vector of the most recently parsed record, or a state
    /// error before the first successful read, after the stream drains, or
    /// after a fatal error.
    pub fn get_values(&self) -> Result<Vec<Option<Value>>, FlatFileError> {
        match self.state {
            StreamState::Errored => Err(FlatFileError::State("reading with errors")),
            StreamState::Drained => Err(FlatFileError::State("the stream is drained")),
            _ => self
                .values
                .clone()
                .ok_or(FlatFileError::State("no record has been read yet")),
        }
    }

    /// The supplied schema, or `None` for selector-driven readers (the
    /// schema varies per record).
    pub fn schema(&self) -> Option<&Schema> {
        match &self.schema_source {
            SchemaSource::Provided { schema, .. } => Some(schema),
            SchemaSource::Selector(_) => None,
        }
    }

    /// Raw records consumed so far, headers and skips included. Never
    /// smaller than [`logical_record_number`](Self::logical_record_number).
    pub fn physical_record_number(&self) -> u64 {
        self.physical
    }

    /// Successfully parsed, non-skipped records so far.
    pub fn logical_record_number(&self) -> u64 {
        self.logical
    }

    /// Subscribes to tokenized records before parsing; returning
    /// [`ReadAction::Skip`] drops the record without running any codec.
    pub fn on_record_read(
        &mut self,
        handler: impl FnMut(&RecordReadEvent<'_>) -> ReadAction + 'static,
    ) {
        self.hooks.record_read.push(Box::new(handler));
    }

    /// Subscribes to successfully parsed records; fires once per logical
    /// record, before [`read`](Self::read) returns.
    pub fn on_record_parsed(&mut self, handler: impl FnMut(&RecordParsedEvent<'_>) + 'static) {
        self.hooks.record_parsed.push(Box::new(handler));
    }

    /// Subscribes to column conversion failures; the first subscriber that
    /// substitutes a value resolves the failure and the remaining columns
    /// are still processed.
    pub fn on_column_error(
        &mut self,
        handler: impl FnMut(&ColumnErrorEvent<'_>) -> ColumnErrorAction + 'static,
    ) {
        self.hooks.column_error.push(Box::new(handler));
    }

    /// Subscribes to record-level failures; the first subscriber that
    /// discards the record keeps the stream alive.
    pub fn on_record_error(
        &mut self,
        handler: impl FnMut(&RecordErrorEvent<'_>) -> RecordErrorAction + 'static,
    ) {
        self.hooks.record_error.push(Box::new(handler));
    }

    fn next_text(&mut self) -> Result<Option<String>, crate::stream::TokenizeError> {
        let exact_len = match &self.schema_source {
            SchemaSource::Provided { total_width, .. } if !self.options.has_record_separator => {
                Some(*total_width)
            }
            _ => None,
        };
        self.tokenizer.next_text(exact_len)
    }

    fn handle_header(&mut self) -> Result<(), FlatFileError> {
        self.state = StreamState::Active;
        if !self.options.is_first_record_header {
            return Ok(());
        }
        let text = match self.next_text() {
            Ok(Some(text)) => text,
            Ok(None) => {
                self.state = StreamState::Drained;
                return Ok(());
            }
            Err(error) => {
                let error = error.at_record(self.physical + 1);
                self.state = StreamState::Errored;
                return Err(error);
            }
        };
        self.physical += 1;
        let mismatch = if self.verify_header {
            match &self.schema_source {
                SchemaSource::Provided {
                    schema, windows, ..
                } => {
                    match partition(&text, windows, PartialRecordPolicy::FillEmpty) {
                        Ok(fields) => {
                            let expected = schema.header_names();
                            !(expected.len() == fields.len()
                                && expected
                                    .iter()
                                    .zip(fields.iter())
                                    .all(|(name, field)| name.eq_ignore_ascii_case(field.trim())))
                        }
                        Err(_) => true,
                    }
                }
                SchemaSource::Selector(_) => false,
            }
        } else {
            false
        };
        if mismatch {
            let error = FlatFileError::Syntax {
                record: self.physical,
                message: "header names do not match the schema".to_string(),
            };
            self.resolve_record_error(&[], error)?;
        } else {
            debug!("discarded header record {}", self.physical);
        }
        Ok(())
    }

    fn schema_for(&self, text: &str) -> Result<(Arc<Schema>, Vec<ResolvedWindow>), FlatFileError> {
        match &self.schema_source {
            SchemaSource::Provided {
                schema, windows, ..
            } => Ok((schema.clone(), windows.clone())),
            SchemaSource::Selector(selector) => {
                let schema = selector
                    .select(text)
                    .cloned()
                    .ok_or(FlatFileError::SchemaSelection {
                        record: self.physical,
                    })?;
                // Validated when the reader was built; resolving again here
                // just materializes the windows for this record's schema.
                let windows = resolve_windows(&schema, &self.options)?;
                Ok((schema, windows))
            }
        }
    }

    fn resolve_record_error(
        &mut self,
        raw_fields: &[String],
        error: FlatFileError,
    ) -> Result<(), FlatFileError> {
        let event = RecordErrorEvent {
            record: self.physical,
            raw_fields,
            error: &error,
        };
        match self.hooks.fire_record_error(&event) {
            RecordErrorAction::Discard => {
                warn!("record {} discarded: {error}", self.physical);
                Ok(())
            }
            RecordErrorAction::Unhandled => {
                self.state = StreamState::Errored;
                self.values = None;
                Err(error)
            }
        }
    }
}
