use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::FlatFileError;
use crate::fixed::tokenizer::fit_window;
use crate::fixed::{resolve_windows, FixedWidthOptions, ResolvedWindow};
use crate::schema::selector::WriteSchemaSelector;
use crate::schema::Schema;
use crate::stream::{
    ColumnErrorAction, ColumnErrorEvent, RecordContext, RecordErrorAction, RecordErrorEvent,
    RecordWriteEvent, RecordWrittenEvent, StreamState, WriterHooks,
};
use crate::value::Value;

enum WriteSchemaSource {
    Provided {
        schema: Arc<Schema>,
        windows: Vec<ResolvedWindow>,
    },
    Selector(WriteSchemaSelector),
}

/// Configures and builds a [`FixedWidthWriter`].
#[derive(Default)]
pub struct FixedWidthWriterBuilder {
    options: FixedWidthOptions,
    schema: Option<Schema>,
    selector: Option<WriteSchemaSelector>,
}

impl FixedWidthWriterBuilder {
    pub fn new() -> Self {
        FixedWidthWriterBuilder {
            options: FixedWidthOptions::default(),
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

    pub fn truncation(mut self, truncation: crate::schema::Truncation) -> Self {
        self.options = self.options.truncation(truncation);
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

    /// Creates a `FixedWidthWriter` over any [`Write`] implementation.
    ///
    /// This is where the configuration is validated: the options are
    /// checked, exactly one of a schema or a selector must be supplied,
    /// and every schema must have a window on each field-occupying column.
    ///
    /// # Parameters
    /// - `sink`: Where the padded records go
    ///
    /// # Returns
    /// A writer over the sink, or an error describing the configuration
    /// problem.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, FixedWidthWriterBuilder, Schema, Value, Window};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("label").window(Window::new(6)))?
    ///     .add_column(Column::int32("amount").window(Window::new(4)))?;
    ///
    /// let mut out = Vec::new();
    /// let mut writer = FixedWidthWriterBuilder::new()
    ///     .schema(schema)
    ///     .from_writer(&mut out)?;
    /// writer.write(&[Some(Value::from("taxes")), Some(Value::Int(42))])?;
    /// drop(writer);
    ///
    /// assert_eq!(String::from_utf8(out).unwrap(), "taxes 42  \n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_writer<W: Write>(self, sink: W) -> Result<FixedWidthWriter<W>, FlatFileError> {
        let FixedWidthWriterBuilder {
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
            (Some(schema), None) => {
                let windows = resolve_windows(&schema, &options)?;
                WriteSchemaSource::Provided {
                    schema: Arc::new(schema),
                    windows,
                }
            }
            (None, Some(selector)) => {
                for schema in selector.schemas() {
                    resolve_windows(schema, &options)?;
                }
                WriteSchemaSource::Selector(selector)
            }
            (None, None) => {
                return Err(FlatFileError::InvalidOptions(
                    "a schema or a selector is required".to_string(),
                ))
            }
        };
        Ok(FixedWidthWriter {
            sink,
            options,
            schema_source,
            hooks: WriterHooks::default(),
            state: StreamState::Fresh,
            physical: 0,
            logical: 0,
        })
    }

    /// Creates a `FixedWidthWriter` over a file, truncating it if it
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
    /// use flatrec::{Column, FixedWidthWriterBuilder, Schema, Value, Window};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name").window(Window::new(10)))?
    ///     .add_column(Column::int32("weight").window(Window::new(5)))?;
    ///
    /// let mut writer = FixedWidthWriterBuilder::new()
    ///     .schema(schema)
    ///     .from_path("people.dat")?;
    /// writer.write(&[Some(Value::from("bob")), Some(Value::Int(185))])?;
    /// writer.flush()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path(
        self,
        path: impl AsRef<Path>,
    ) -> Result<FixedWidthWriter<File>, FlatFileError> {
        let file = File::create(path).map_err(|source| FlatFileError::SourceIo {
            record: 0,
            source,
        })?;
        self.from_writer(file)
    }
}

/// Streams typed records into fixed-width text. Every emitted record is
/// exactly the schema's window total long, plus the record separator when
/// one is configured.
///
/// ```
/// use flatrec::{Alignment, Column, FixedWidthWriterBuilder, Schema, Value, Window};
///
/// # fn main() -> Result<(), flatrec::FlatFileError> {
/// let schema = Schema::new()
///     .add_column(Column::string("name").window(Window::new(8)))?
///     .add_column(Column::int32("weight").window(
///         Window::new(5).align(Alignment::RightAligned),
///     ))?;
///
/// let mut out = Vec::new();
/// let mut writer = FixedWidthWriterBuilder::new()
///     .schema(schema)
///     .from_writer(&mut out)?;
/// writer.write(&[Some(Value::from("bob")), Some(Value::Int(185))])?;
/// drop(writer);
///
/// assert_eq!(String::from_utf8(out).unwrap(), "bob       185\n");
/// # Ok(())
/// # }
/// ```
pub struct FixedWidthWriter<W: Write> {
    sink: W,
    options: FixedWidthOptions,
    schema_source: WriteSchemaSource,
    hooks: WriterHooks,
    state: StreamState,
    physical: u64,
    logical: u64,
}

impl<W: Write> FixedWidthWriter<W> {
    /// Formats and emits one record, padding or truncating every field
    /// into its window.
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
    /// 4. Pads each field with its window's fill character (or truncates
    ///    it per the window's truncation policy) and concatenates, so the
    ///    record is exactly the window total long
    /// 5. Emits the record separator when one is configured, then fires
    ///    the record-written event
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
    /// use flatrec::{Alignment, Column, FixedWidthWriterBuilder, Schema, Value, Window};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("label").window(Window::new(6)))?
    ///     .add_column(Column::int32("amount").window(
    ///         Window::new(5).align(Alignment::RightAligned).fill('0'),
    ///     ))?;
    ///
    /// let mut out = Vec::new();
    /// let mut writer = FixedWidthWriterBuilder::new()
    ///     .schema(schema)
    ///     .from_writer(&mut out)?;
    /// writer.write(&[Some(Value::from("taxes")), Some(Value::Int(42))])?;
    /// drop(writer);
    ///
    /// assert_eq!(String::from_utf8(out).unwrap(), "taxes 00042\n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn write(&mut self, values: &[Option<Value>]) -> Result<(), FlatFileError> {
        if self.state == StreamState::Errored {
            return Err(FlatFileError::State("writing with errors"));
        }
        let record = self.physical + 1;
        let (schema, windows) = match &self.schema_source {
            WriteSchemaSource::Provided { schema, windows } => {
                (schema.clone(), windows.clone())
            }
            WriteSchemaSource::Selector(selector) => match selector.select(values) {
                Some(schema) => {
                    let schema = schema.clone();
                    let windows = resolve_windows(&schema, &self.options)?;
                    (schema, windows)
                }
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
        self.emit(record, &fields, &windows)?;
        self.logical += 1;
        let written_event = RecordWrittenEvent {
            record,
            raw_fields: &fields,
        };
        self.hooks.fire_record_written(&written_event);
        Ok(())
    }

    /// Emits one record holding the column names of every non-metadata
    /// column, padded or truncated into the same windows as data records.
    ///
    /// # Returns
    /// `Ok(())` when the header was emitted, or an error if the sink
    /// failed or the writer is selector-driven (there is no single set of
    /// names to write).
    ///
    /// # Examples
    ///
    /// ```
    /// use flatrec::{Column, FixedWidthWriterBuilder, Schema, Value, Window};
    ///
    /// # fn main() -> Result<(), flatrec::FlatFileError> {
    /// let schema = Schema::new()
    ///     .add_column(Column::string("name").window(Window::new(6)))?
    ///     .add_column(Column::int32("qty").window(Window::new(4)))?;
    ///
    /// let mut out = Vec::new();
    /// let mut writer = FixedWidthWriterBuilder::new()
    ///     .schema(schema)
    ///     .from_writer(&mut out)?;
    /// writer.write_schema()?;
    /// writer.write(&[Some(Value::from("apple")), Some(Value::Int(5))])?;
    /// drop(writer);
    ///
    /// assert_eq!(String::from_utf8(out).unwrap(), "name  qty \napple 5   \n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_schema(&mut self) -> Result<(), FlatFileError> {
        if self.state == StreamState::Errored {
            return Err(FlatFileError::State("writing with errors"));
        }
        let (schema, windows) = match &self.schema_source {
            WriteSchemaSource::Provided { schema, windows } => {
                (schema.clone(), windows.clone())
            }
            WriteSchemaSource::Selector(_) => {
                return Err(FlatFileError::InvalidOptions(
                    "cannot write a header with a schema selector".to_string(),
                ))
            }
        };
        let record = self.physical + 1;
        let names: Vec<String> = schema
            .header_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        self.emit(record, &names, &windows)?;
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

    fn emit(
        &mut self,
        record: u64,
        fields: &[String],
        windows: &[ResolvedWindow],
    ) -> Result<(), FlatFileError> {
        let mut line = String::new();
        for (field, window) in fields.iter().zip(windows.iter()) {
            line.push_str(&fit_window(field, window));
        }
        if self.options.has_record_separator {
            line.push_str(self.options.written_record_separator());
        }
        if let Err(source) = self.sink.write_all(line.as_bytes()) {
            self.state = StreamState::Errored;
            return Err(FlatFileError::SourceIo { record, source });
        }
        self.state = StreamState::Active;
        self.physical = record;
        Ok(())
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
