use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::delimited::{DelimitedOptions, QuoteBehavior};
use crate::error::FlatFileError;
use crate::schema::selector::WriteSchemaSelector;
use crate::schema::Schema;
use crate::stream::{
    ColumnErrorAction, ColumnErrorEvent, RecordContext, RecordErrorAction, RecordErrorEvent,
    RecordWriteEvent, RecordWrittenEvent, StreamState, WriterHooks,
};
use crate::value::Value;

enum WriteSchemaSource {
    Provided(Arc<Schema>),
    Selector(WriteSchemaSelector),
}

/// Configures and builds a [`DelimitedWriter`].
#[derive(Default)]
pub struct DelimitedWriterBuilder {
    options: DelimitedOptions,
    schema: Option<Schema>,
    selector: Option<WriteSchemaSelector>,
}

impl DelimitedWriterBuilder {
    pub fn new() -> Self {
        DelimitedWriterBuilder {
            options: DelimitedOptions::default(),
            schema: None,
            selector: None,
        }
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Picks a schema per record by probing the typed values.
    pub fn selector(mut self, selector: WriteSchemaSelector) -> Self {
        self.selector = Some(selector);
        self
    }

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

    pub fn quote_behavior(mut self, behavior: QuoteBehavior) -> Self {
        self.options = self.options.quote_behavior(behavior);
        self
    }

    /// Creates a `DelimitedWriter` over any [`Write`] implementation.
    ///
    /// This is where the configuration is validated: the options are
    /// checked, and exactly one of a schema or a selector must be
    /// supplied.
    ///
    /// # Parameters
    /// - `sink`: Where the encoded records go
    ///
    /// # Returns
    /// A writer over the sink, or an error describing the configuration
    /// problem.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, DelimitedWriterBuilder, Schema, Value};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("city"))?
    ///     .add_column(Column::int64("population"))?;
    ///
    /// let mut out = Vec::new();
    /// let mut writer = DelimitedWriterBuilder::new()
    ///     .schema(schema)
    ///     .from_writer(&mut out)?;
    /// writer.write(&[Some(Value::from("Boston")), Some(Value::Long(4628910))])?;
    /// drop(writer);
    ///
    /// assert_eq!(String::from_utf8(out).unwrap(), "Boston,4628910\n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_writer<W: Write>(self, sink: W) -> Result<DelimitedWriter<W>, FlatFileError> {
        let DelimitedWriterBuilder {
            options,
            schema,
            selector,
        } = self;
        options.validate()?;
        let schema_source = match (schema, selector) {
            (Some(_), Some(_)) => {
                return Err(FlatFileError::InvalidOptions(
                    "supply a schema or a selector, not both".to_string(),
                ))
            }
            (Some(schema), None) => WriteSchemaSource::Provided(Arc::new(schema)),
            (None, Some(selector)) => WriteSchemaSource::Selector(selector),
            (None, None) => {
                return Err(FlatFileError::InvalidOptions(
                    "a schema or a selector is required".to_string(),
                ))
            }
        };
        Ok(DelimitedWriter {
            sink,
            options,
            schema_source,
            hooks: WriterHooks::default(),
            state: StreamState::Fresh,
            physical: 0,
            logical: 0,
        })
    }

    /// Creates a `DelimitedWriter` over a file, truncating it if it
    /// exists.
    ///
    /// # Parameters
    /// - `path`: The path of the file to write
    ///
    /// # Returns
    /// A writer over the file, or an error if the file cannot be created
    /// or the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flatrec::{Column, DelimitedWriterBuilder, Schema, Value};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name"))?
    ///     .add_column(Column::float64("price"))?;
    ///
    /// let mut writer = DelimitedWriterBuilder::new()
    ///     .schema(schema)
    ///     .from_path("products.csv")?;
    /// writer.write_schema()?;
    /// writer.write(&[Some(Value::from("apple")), Some(Value::Double(0.5))])?;
    /// writer.flush()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path(
        self,
        path: impl AsRef<Path>,
    ) -> Result<DelimitedWriter<File>, FlatFileError> {
        let file = File::create(path).map_err(|source| FlatFileError::SourceIo {
            record: 0,
            source,
        })?;
        self.from_writer(file)
    }
}

/// Streams typed records into delimited text: the mirror of
/// [`DelimitedReader`](crate::delimited::DelimitedReader).
///
/// ```
/// use flatrec::{Column, DelimitedWriterBuilder, Schema, Value};
///
/// # fn main() -> Result<(), flatrec::FlatFileError> {
/// let schema = Schema::new()
///     .add_column(Column::string("name"))?
///     .add_column(Column::int32("quantity"))?;
///
/// let mut out = Vec::new();
/// let mut writer = DelimitedWriterBuilder::new()
///     .schema(schema)
///     .from_writer(&mut out)?;
/// writer.write(&[Some(Value::from("apple")), Some(Value::Int(5))])?;
/// drop(writer);
///
/// assert_eq!(String::from_utf8(out).unwrap(), "apple,5\n");
/// # Ok(())
/// # }
/// ```
pub struct DelimitedWriter<W: Write> {
    sink: W,
    options: DelimitedOptions,
    schema_source: WriteSchemaSource,
    hooks: WriterHooks,
    state: StreamState,
    physical: u64,
    logical: u64,
}

impl<W: Write> DelimitedWriter<W> {
    /// Formats and emits one record.
    ///
    /// The value vector must have one entry per non-ignored column, in
    /// schema order; metadata slots are present but skipped, so a vector
    /// produced by a reader's `get_values` can be handed straight back in.
    ///
    /// # Writing Process
    ///
    /// 1. Picks the schema (fixed, or via the write-side selector)
    /// 2. Fires the record-write event with the values visible
    /// 3. Formats each value through its column codec, offering failures
    ///    to the column-error subscribers
    /// 4. Quotes fields per the active [`QuoteBehavior`], joins them with
    ///    the separator, and emits the record separator
    /// 5. Fires the record-written event
    ///
    /// # Returns
    /// - `Ok(())` when the record was emitted, or when a record-level
    ///   failure was discarded by a subscriber (nothing is emitted then)
    /// - `Err(error)` when a failure was left unhandled; the writer is
    ///   unusable afterwards
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, DelimitedWriterBuilder, Schema, Value};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("note"))?
    ///     .add_column(Column::int32("n"))?;
    ///
    /// let mut out = Vec::new();
    /// let mut writer = DelimitedWriterBuilder::new()
    ///     .schema(schema)
    ///     .from_writer(&mut out)?;
    /// // The embedded separator forces quoting.
    /// writer.write(&[Some(Value::from("a,b")), Some(Value::Int(1))])?;
    /// writer.write(&[None, Some(Value::Int(2))])?;
    /// drop(writer);
    ///
    /// assert_eq!(String::from_utf8(out).unwrap(), "\"a,b\",1\n,2\n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn write(&mut self, values: &[Option<Value>]) -> Result<(), FlatFileError> {
        if self.state == StreamState::Errored {
            return Err(FlatFileError::State("writing with errors"));
        }
        let record = self.physical + 1;
        let schema = match &self.schema_source {
            WriteSchemaSource::Provided(schema) => schema.clone(),
            WriteSchemaSource::Selector(selector) => match selector.select(values) {
                Some(schema) => schema.clone(),
                None => {
                    let error = FlatFileError::SchemaSelection { record };
                    return self.resolve_record_error(error);
                }
            },
        };
        let write_event = RecordWriteEvent { record, values };
        self.hooks.fire_record_write(&write_event);
        let ctx = RecordContext {
            schema: &schema,
            record_text: "",
            raw_fields: &[],
            physical_record_number: record,
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
        let fields = match schema.format_record(&ctx, values, &mut on_column_error) {
            Ok(fields) => fields,
            Err(error) => return self.resolve_record_error(error),
        };
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push_str(&self.options.separator);
            }
            line.push_str(&encode_field(field, &self.options));
        }
        line.push_str(self.options.written_record_separator());
        if let Err(source) = self.sink.write_all(line.as_bytes()) {
            self.state = StreamState::Errored;
            return Err(FlatFileError::SourceIo { record, source });
        }
        self.state = StreamState::Active;
        self.physical = record;
        self.logical += 1;
        let written_event = RecordWrittenEvent {
            record,
            raw_fields: &fields,
        };
        self.hooks.fire_record_written(&written_event);
        Ok(())
    }

    /// Emits one record holding the column names of every non-metadata
    /// column.
    ///
    /// Headers are always written explicitly; the writer never emits one
    /// on its own. The header counts physically but not logically.
    ///
    /// # Returns
    /// `Ok(())` when the header was emitted, or an error if the sink
    /// failed or the writer is selector-driven (there is no single set of
    /// names to write).
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, DelimitedWriterBuilder, Schema, Value};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name"))?
    ///     .add_column(Column::int32("quantity"))?;
    ///
    /// let mut out = Vec::new();
    /// let mut writer = DelimitedWriterBuilder::new()
    ///     .schema(schema)
    ///     .from_writer(&mut out)?;
    /// writer.write_schema()?;
    /// writer.write(&[Some(Value::from("apple")), Some(Value::Int(5))])?;
    /// drop(writer);
    ///
    /// assert_eq!(String::from_utf8(out).unwrap(), "name,quantity\napple,5\n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_schema(&mut self) -> Result<(), FlatFileError> {
        if self.state == StreamState::Errored {
            return Err(FlatFileError::State("writing with errors"));
        }
        let schema = match &self.schema_source {
            WriteSchemaSource::Provided(schema) => schema.clone(),
            WriteSchemaSource::Selector(_) => {
                return Err(FlatFileError::InvalidOptions(
                    "cannot write a header with a schema selector".to_string(),
                ))
            }
        };
        let record = self.physical + 1;
        let mut line = String::new();
        for (i, name) in schema.header_names().iter().enumerate() {
            if i > 0 {
                line.push_str(&self.options.separator);
            }
            line.push_str(&encode_field(name, &self.options));
        }
        line.push_str(self.options.written_record_separator());
        if let Err(source) = self.sink.write_all(line.as_bytes()) {
            self.state = StreamState::Errored;
            return Err(FlatFileError::SourceIo { record, source });
        }
        self.state = StreamState::Active;
        self.physical = record;
        debug!("header record written");
        Ok(())
    }

    /// Flushes the underlying sink.
    ///
    /// # Returns
    /// `Ok(())` when the flush succeeds, or the sink's error otherwise.
    pub fn flush(&mut self) -> Result<(), FlatFileError> {
        self.sink.flush().map_err(|source| FlatFileError::SourceIo {
            record: self.physical,
            source,
        })
    }

    /// Records emitted so far, headers included.
    pub fn physical_record_number(&self) -> u64 {
        self.physical
    }

    /// Data records emitted so far, headers excluded.
    pub fn logical_record_number(&self) -> u64 {
        self.logical
    }

    /// Subscribes to records about to be formatted.
    pub fn on_record_write(&mut self, handler: impl FnMut(&RecordWriteEvent<'_>) + 'static) {
        self.hooks.record_write.push(Box::new(handler));
    }

    /// Subscribes to records after they reach the sink.
    pub fn on_record_written(&mut self, handler: impl FnMut(&RecordWrittenEvent<'_>) + 'static) {
        self.hooks.record_written.push(Box::new(handler));
    }

    /// Subscribes to column formatting failures; the first subscriber that
    /// substitutes a value has the substitute formatted in its place.
    pub fn on_column_error(
        &mut self,
        handler: impl FnMut(&ColumnErrorEvent<'_>) -> ColumnErrorAction + 'static,
    ) {
        self.hooks.column_error.push(Box::new(handler));
    }

    /// Subscribes to record-level failures; the first subscriber that
    /// discards the record suppresses it and keeps the writer alive.
    pub fn on_record_error(
        &mut self,
        handler: impl FnMut(&RecordErrorEvent<'_>) -> RecordErrorAction + 'static,
    ) {
        self.hooks.record_error.push(Box::new(handler));
    }

    fn resolve_record_error(&mut self, error: FlatFileError) -> Result<(), FlatFileError> {
        let event = RecordErrorEvent {
            record: self.physical + 1,
            raw_fields: &[],
            error: &error,
        };
        match self.hooks.fire_record_error(&event) {
            RecordErrorAction::Discard => {
                warn!("record {} suppressed: {error}", self.physical + 1);
                Ok(())
            }
            RecordErrorAction::Unhandled => {
                self.state = StreamState::Errored;
                Err(error)
            }
        }
    }
}

fn needs_quotes(text: &str, options: &DelimitedOptions) -> bool {
    if text.contains(&options.separator) || text.contains(options.quote) {
        return true;
    }
    if text.contains('\r') || text.contains('\n') {
        return true;
    }
    if let Some(record_separator) = &options.record_separator {
        if text.contains(record_separator.as_str()) {
            return true;
        }
    }
    text.len() != text.trim().len()
}

/// Wraps a field in quotes when the active policy calls for it, doubling
/// embedded quotes.
fn encode_field(text: &str, options: &DelimitedOptions) -> String {
    let quote = match options.quote_behavior {
        QuoteBehavior::Never => false,
        QuoteBehavior::Always => true,
        QuoteBehavior::AsNeeded => needs_quotes(text, options),
    };
    if !quote {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push(options.quote);
    for ch in text.chars() {
        if ch == options.quote {
            out.push(ch);
        }
        out.push(ch);
    }
    out.push(options.quote);
    out
}
