use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::delimited::tokenizer::DelimitedTokenizer;
use crate::delimited::DelimitedOptions;
use crate::error::FlatFileError;
use crate::schema::{Schema, SchemaSelector};
use crate::source::{CharSource, IoSource, StringSource};
use crate::stream::{
    ColumnErrorAction, ColumnErrorEvent, RawRecord, ReadAction, ReaderHooks, RecordContext,
    RecordErrorAction, RecordErrorEvent, RecordParsedEvent, RecordReadEvent, StreamState,
};
use crate::value::Value;

enum SchemaSource {
    Provided(Arc<Schema>),
    Selector(SchemaSelector<[String]>),
    /// Filled in from the header tokens on the first read.
    Inferred(Option<Arc<Schema>>),
}

/// Configures and builds a [`DelimitedReader`].
///
/// ```
/// use flatrec::{Column, DelimitedReaderBuilder, Schema, Value};
///
/// # fn main() -> Result<(), flatrec::FlatFileError> {
/// let schema = Schema::new()
///     .add_column(Column::string("name"))?
///     .add_column(Column::int32("quantity"))?;
///
/// let mut reader = DelimitedReaderBuilder::new()
///     .schema(schema)
///     .from_str("apple,5\npear,3\n")?;
///
/// assert!(reader.read()?);
/// assert_eq!(reader.get_values()?[1], Some(Value::Int(5)));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct DelimitedReaderBuilder {
    options: DelimitedOptions,
    schema: Option<Schema>,
    selector: Option<SchemaSelector<[String]>>,
    verify_header: bool,
}

impl DelimitedReaderBuilder {
    pub fn new() -> Self {
        DelimitedReaderBuilder {
            options: DelimitedOptions::default(),
            schema: None,
            selector: None,
            verify_header: false,
        }
    }

    /// Uses one schema for every record.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Picks a schema per record by probing the raw fields.
    pub fn selector(mut self, selector: SchemaSelector<[String]>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Replaces the whole option set at once.
    pub fn options(mut self, options: DelimitedOptions) -> Self {
        self.options = options;
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.options = self.options.separator(separator);
        self
    }

    pub fn record_separator(mut self, separator: impl Into<String>) -> Self {
        self.options = self.options.record_separator(separator);
        self
    }

    pub fn quote(mut self, quote: char) -> Self {
        self.options = self.options.quote(quote);
        self
    }

    /// Treats the first record as a header. Without a schema or selector,
    /// the header names an inferred schema of untyped string columns; with
    /// one, the header is consumed and discarded.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.options = self.options.has_headers(yes);
        self
    }

    pub fn preserve_whitespace(mut self, yes: bool) -> Self {
        self.options = self.options.preserve_whitespace(yes);
        self
    }

    pub fn partitioned(mut self, yes: bool) -> Self {
        self.options = self.options.partitioned(yes);
        self
    }

    pub fn allow_embedded_line_endings(mut self, yes: bool) -> Self {
        self.options = self.options.allow_embedded_line_endings(yes);
        self
    }

    /// Checks the discarded header record against the schema's column names
    /// and routes a mismatch through the record-level error path.
    pub fn verify_header(mut self, yes: bool) -> Self {
        self.verify_header = yes;
        self
    }

    /// Creates a `DelimitedReader` over a string.
    ///
    /// # Parameters
    /// - `data`: The delimited text to read
    ///
    /// # Returns
    /// A reader over the string, or an error if the options or schema
    /// configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, DelimitedReaderBuilder, Schema};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new().add_column(Column::string("word"))?;
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("alpha\nbeta\n")?;
    /// assert!(reader.read()?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_str(self, data: &str) -> Result<DelimitedReader<StringSource>, FlatFileError> {
        self.from_source(StringSource::new(data))
    }

    /// Creates a `DelimitedReader` from any [`Read`] implementation.
    ///
    /// The bytes are decoded as UTF-8 and buffered internally, so files,
    /// sockets and in-memory slices all work.
    ///
    /// # Parameters
    /// - `reader`: The reader providing the delimited bytes
    ///
    /// # Returns
    /// A reader over the decoded text, or an error if the options or schema
    /// configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, DelimitedReaderBuilder, Schema, Value};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("city"))?
    ///     .add_column(Column::int64("population"))?;
    ///
    /// let data = "Boston,4628910\nConcord,42695\n";
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_reader(data.as_bytes())?;
    ///
    /// assert!(reader.read()?);
    /// assert_eq!(reader.get_values()?[1], Some(Value::Long(4628910)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_reader<R: Read>(
        self,
        reader: R,
    ) -> Result<DelimitedReader<IoSource<R>>, FlatFileError> {
        self.from_source(IoSource::new(reader))
    }

    /// Creates a `DelimitedReader` over a file.
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
    /// use flatrec::{Column, DelimitedReaderBuilder, Schema};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name"))?
    ///     .add_column(Column::float64("price"))?;
    ///
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .has_headers(true)
    ///     .from_path("products.csv")?;
    ///
    /// while reader.read()? {
    ///     println!("{:?}", reader.get_values()?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path(
        self,
        path: impl AsRef<Path>,
    ) -> Result<DelimitedReader<IoSource<File>>, FlatFileError> {
        let file = File::open(path).map_err(|source| FlatFileError::SourceIo {
            record: 0,
            source,
        })?;
        self.from_source(IoSource::new(file))
    }

    /// Creates a `DelimitedReader` over any [`CharSource`].
    ///
    /// This is the terminal every other `from_*` method funnels into, and
    /// where the configuration is validated: the options are checked, and
    /// exactly one of a schema, a selector, or header inference must be in
    /// play.
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
    ) -> Result<DelimitedReader<S>, FlatFileError> {
        let DelimitedReaderBuilder {
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
            (Some(schema), None) => SchemaSource::Provided(Arc::new(schema)),
            (None, Some(selector)) => SchemaSource::Selector(selector),
            (None, None) if options.is_first_record_header => SchemaSource::Inferred(None),
            (None, None) => {
                return Err(FlatFileError::InvalidOptions(
                    "a schema, a selector, or a header record is required".to_string(),
                ))
            }
        };
        let is_first_record_header = options.is_first_record_header;
        Ok(DelimitedReader {
            tokenizer: DelimitedTokenizer::new(source, options),
            schema_source,
            hooks: ReaderHooks::default(),
            state: StreamState::Fresh,
            is_first_record_header,
            verify_header,
            physical: 0,
            logical: 0,
            values: None,
        })
    }
}

/// Streams typed records out of delimited text.
///
/// Records come back strictly in input order. Each call to [`read`] parses
/// at most one record; a `true` return makes its values available through
/// [`get_values`]. Any error a subscriber leaves unhandled moves the reader
/// into a terminal failed state, and every later operation fails fast.
///
/// # Type Parameters
///
/// - `S`: The character source feeding the tokenizer. Built through
///   [`DelimitedReaderBuilder`], which picks the source type for you
///   (`from_str`, `from_reader`, `from_path`, `from_source`).
///
/// # Implementation Details
///
/// - The first `read` or `skip` performs header handling: discarding,
///   verifying, or inferring a schema from the first record, depending on
///   the configuration
/// - Events for one record complete before the next record is tokenized
/// - The physical record number counts every raw record consumed; the
///   logical record number counts only successfully parsed, non-skipped
///   records
///
/// # Examples
///
/// ```
/// use flatrec::{Column, DelimitedReaderBuilder, Schema, Value};
///
/// # fn main() -> Result<(), flatrec::FlatFileError> {
/// let schema = Schema::new()
///     .add_column(Column::string("make"))?
///     .add_column(Column::int32("year"))?;
///
/// let mut reader = DelimitedReaderBuilder::new()
///     .schema(schema)
///     .from_str("Porsche,1948\nFord,1967\n")?;
///
/// assert!(reader.read()?);
/// assert_eq!(reader.get_values()?[0], Some(Value::from("Porsche")));
/// assert!(reader.read()?);
/// assert!(!reader.read()?);
/// # Ok(())
/// # }
/// ```
///
/// [`read`]: DelimitedReader::read
/// [`get_values`]: DelimitedReader::get_values
pub struct DelimitedReader<S: CharSource> {
    tokenizer: DelimitedTokenizer<S>,
    schema_source: SchemaSource,
    hooks: ReaderHooks,
    state: StreamState,
    is_first_record_header: bool,
    verify_header: bool,
    physical: u64,
    logical: u64,
    values: Option<Vec<Option<Value>>>,
}

impl<S: CharSource> DelimitedReader<S> {
    /// Advances to the next parsed record.
    ///
    /// # Reading Process
    ///
    /// 1. Tokenizes the next raw record; end of input drains the stream
    /// 2. Picks the schema (fixed, inferred, or via the selector)
    /// 3. Fires the record-read event; a subscriber may skip the record
    /// 4. Parses the raw fields through the column codecs, offering each
    ///    failure to the column-error subscribers
    /// 5. On a record-level failure, offers it to the record-error
    ///    subscribers; discarded records are suppressed and the loop
    ///    continues with the next raw record
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
    /// use flatrec::{Column, DelimitedReaderBuilder, Schema};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("city"))?
    ///     .add_column(Column::int64("population"))?;
    ///
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("Boston,4628910\nConcord,42695\n")?;
    ///
    /// let mut count = 0;
    /// while reader.read()? {
    ///     count += 1;
    /// }
    /// assert_eq!(count, 2);
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
            let raw = match self.tokenizer.next_record() {
                Ok(Some(raw)) => raw,
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
            let schema = match self.schema_for(&raw) {
                Ok(schema) => schema,
                Err(error) => {
                    self.resolve_record_error(&raw.fields, error)?;
                    continue;
                }
            };
            let read_event = RecordReadEvent {
                record: self.physical,
                record_text: &raw.text,
                raw_fields: &raw.fields,
            };
            if self.hooks.fire_record_read(&read_event) == ReadAction::Skip {
                debug!("record {} skipped by subscriber", self.physical);
                continue;
            }
            let ctx = RecordContext {
                schema: &schema,
                record_text: &raw.text,
                raw_fields: &raw.fields,
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
            match schema.parse_record(&ctx, &raw.fields, &mut on_column_error) {
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
                    self.resolve_record_error(&raw.fields, error)?;
                    continue;
                }
            }
        }
    }

    /// Tokenizes and discards one record without parsing it.
    ///
    /// Only the physical record number advances; no events fire and no
    /// codecs run, so a skipped record can hold anything tokenizable.
    ///
    /// # Returns
    /// - `Ok(true)` when a record was consumed
    /// - `Ok(false)` once the input is exhausted
    /// - `Err(error)` on an unhandled failure
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, DelimitedReaderBuilder, Schema};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new().add_column(Column::string("word"))?;
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("banner text\nalpha\n")?;
    ///
    /// assert!(reader.skip()?);
    /// assert!(reader.read()?);
    /// assert_eq!(reader.physical_record_number(), 2);
    /// assert_eq!(reader.logical_record_number(), 1);
    /// # Ok(())
    /// # }
    /// ```
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
        match self.tokenizer.next_record() {
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
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, DelimitedReaderBuilder, Schema, Value};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name"))?
    ///     .add_column(Column::int32("quantity"))?;
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("apple,5\n")?;
    ///
    /// // Nothing has been read yet.
    /// assert!(reader.get_values().is_err());
    ///
    /// reader.read()?;
    /// assert_eq!(reader.get_values()?[1], Some(Value::Int(5)));
    /// # Ok(())
    /// # }
    /// ```
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

    /// The schema in effect, once one exists.
    ///
    /// # Returns
    /// The supplied or header-inferred schema; `None` for selector-driven
    /// readers (the schema varies per record) and before header inference
    /// has run.
    pub fn schema(&self) -> Option<&Schema> {
        match &self.schema_source {
            SchemaSource::Provided(schema) | SchemaSource::Inferred(Some(schema)) => Some(schema),
            _ => None,
        }
    }

    /// Raw records consumed so far, headers and skips included.
    ///
    /// # Returns
    /// The 1-based count of records taken off the source, whether or not
    /// they produced values. Never smaller than
    /// [`logical_record_number`](Self::logical_record_number).
    pub fn physical_record_number(&self) -> u64 {
        self.physical
    }

    /// Successfully parsed, non-skipped records so far.
    ///
    /// # Returns
    /// The 1-based count of records that produced a value vector. Headers,
    /// skips and discarded records are excluded.
    pub fn logical_record_number(&self) -> u64 {
        self.logical
    }

    /// Subscribes to tokenized records before parsing.
    ///
    /// Handlers see the raw fields and the unparsed record text; returning
    /// [`ReadAction::Skip`] drops the record without running any codec and
    /// without advancing the logical record number.
    ///
    /// # Examples
    ///
    /// Skipping the empty line between record groups:
    ///
    /// ```
    /// use flatrec::{Column, DelimitedReaderBuilder, ReadAction, Schema};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("a"))?
    ///     .add_column(Column::string("b"))?;
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("x,1\n\ny,2\n")?;
    ///
    /// reader.on_record_read(|event| {
    ///     if event.raw_fields.len() == 1 && event.raw_fields[0].is_empty() {
    ///         ReadAction::Skip
    ///     } else {
    ///         ReadAction::Keep
    ///     }
    /// });
    ///
    /// while reader.read()? {}
    /// assert_eq!(reader.logical_record_number(), 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn on_record_read(
        &mut self,
        handler: impl FnMut(&RecordReadEvent<'_>) -> ReadAction + 'static,
    ) {
        self.hooks.record_read.push(Box::new(handler));
    }

    /// Subscribes to successfully parsed records.
    ///
    /// Fires once per logical record, after the value vector is complete
    /// and before [`read`](Self::read) returns.
    pub fn on_record_parsed(&mut self, handler: impl FnMut(&RecordParsedEvent<'_>) + 'static) {
        self.hooks.record_parsed.push(Box::new(handler));
    }

    /// Subscribes to column conversion failures.
    ///
    /// The first subscriber that substitutes a value resolves the failure;
    /// the remaining columns of the record are still processed. An
    /// unresolved column failure becomes a record-level error.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, ColumnErrorAction, DelimitedReaderBuilder, Schema, Value};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name"))?
    ///     .add_column(Column::int32("quantity"))?;
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("apple,unknown\n")?;
    ///
    /// reader.on_column_error(|event| {
    ///     assert_eq!(event.column, "quantity");
    ///     ColumnErrorAction::Substitute(Some(Value::Int(0)))
    /// });
    ///
    /// assert!(reader.read()?);
    /// assert_eq!(reader.get_values()?[1], Some(Value::Int(0)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn on_column_error(
        &mut self,
        handler: impl FnMut(&ColumnErrorEvent<'_>) -> ColumnErrorAction + 'static,
    ) {
        self.hooks.column_error.push(Box::new(handler));
    }

    /// Subscribes to record-level failures.
    ///
    /// The first subscriber that discards the record keeps the stream
    /// alive; a failure every subscriber leaves unhandled stops the stream
    /// for good.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, DelimitedReaderBuilder, RecordErrorAction, Schema};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("a"))?
    ///     .add_column(Column::string("b"))?;
    /// let mut reader = DelimitedReaderBuilder::new()
    ///     .schema(schema)
    ///     .from_str("only-one-field\nx,y\n")?;
    ///
    /// reader.on_record_error(|_| RecordErrorAction::Discard);
    ///
    /// assert!(reader.read()?);
    /// assert_eq!(reader.logical_record_number(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn on_record_error(
        &mut self,
        handler: impl FnMut(&RecordErrorEvent<'_>) -> RecordErrorAction + 'static,
    ) {
        self.hooks.record_error.push(Box::new(handler));
    }

    fn handle_header(&mut self) -> Result<(), FlatFileError> {
        self.state = StreamState::Active;
        if !self.is_first_record_header {
            return Ok(());
        }
        let raw = match self.tokenizer.next_record() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.state = StreamState::Drained;
                return Ok(());
            }
            // The header is structural; failing to tokenize it poisons
            // everything after it.
            Err(error) => {
                let error = error.at_record(self.physical + 1);
                self.state = StreamState::Errored;
                return Err(error);
            }
        };
        self.physical += 1;
        if matches!(self.schema_source, SchemaSource::Inferred(_)) {
            match Schema::from_header(&raw.fields) {
                Ok(schema) => {
                    debug!(
                        "inferred a schema of {} string columns from the header",
                        schema.physical_count()
                    );
                    self.schema_source = SchemaSource::Inferred(Some(Arc::new(schema)));
                }
                Err(error) => {
                    self.state = StreamState::Errored;
                    return Err(error);
                }
            }
            return Ok(());
        }
        let mismatch = if self.verify_header {
            match &self.schema_source {
                SchemaSource::Provided(schema) => {
                    let expected = schema.header_names();
                    let matched = expected.len() == raw.fields.len()
                        && expected
                            .iter()
                            .zip(raw.fields.iter())
                            .all(|(name, field)| name.eq_ignore_ascii_case(field.trim()));
                    !matched
                }
                _ => false,
            }
        } else {
            false
        };
        if mismatch {
            let error = FlatFileError::Syntax {
                record: self.physical,
                message: "header names do not match the schema".to_string(),
            };
            self.resolve_record_error(&raw.fields, error)?;
        } else {
            debug!("discarded header record {}", self.physical);
        }
        Ok(())
    }

    fn schema_for(&self, raw: &RawRecord) -> Result<Arc<Schema>, FlatFileError> {
        match &self.schema_source {
            SchemaSource::Provided(schema) => Ok(schema.clone()),
            SchemaSource::Inferred(Some(schema)) => Ok(schema.clone()),
            SchemaSource::Inferred(None) => {
                Err(FlatFileError::State("no schema was inferred from the header"))
            }
            SchemaSource::Selector(selector) => selector
                .select(&raw.fields)
                .cloned()
                .ok_or(FlatFileError::SchemaSelection {
                    record: self.physical,
                }),
        }
    }

    /// Offers a record-level error to subscribers; unhandled errors end the
    /// stream.
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
