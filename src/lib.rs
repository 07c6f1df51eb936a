/*!
 # flatrec

 Schema-driven reading and writing of flat-file records, in two formats:
 delimited (separator-based) and fixed-width (windowed).

 A [`Schema`] names, orders and types the columns of a record. Readers drive
 a tokenizer over a character source, hand the raw fields to the schema's
 column codecs, and surface typed values; writers mirror the path. Error
 handling is subscription-based: column- and record-level failures are
 offered to handlers that may substitute a value or discard the record, and
 anything left unhandled stops the stream.

 ## Reading delimited text

 ```rust
 use flatrec::{Column, DelimitedReaderBuilder, Schema};

 fn main() -> Result<(), flatrec::FlatFileError> {
     let schema = Schema::new()
         .add_column(Column::string("make"))?
         .add_column(Column::int32("year"))?
         .add_column(Column::float64("price"))?;

     let mut reader = DelimitedReaderBuilder::new()
         .schema(schema)
         .from_str("Porsche,1948,9999.5\nFord,1967,1500.0\n")?;

     while reader.read()? {
         let values = reader.get_values()?;
         assert_eq!(values.len(), 3);
     }
     assert_eq!(reader.logical_record_number(), 2);
     Ok(())
 }
 ```

 ## Writing fixed-width text

 ```rust
 use flatrec::{Column, FixedWidthWriterBuilder, Schema, Value, Window};

 fn main() -> Result<(), flatrec::FlatFileError> {
     let schema = Schema::new()
         .add_column(Column::string("name").window(Window::new(10)))?
         .add_column(Column::int32("weight").window(Window::new(5)))?;

     let mut out = Vec::new();
     let mut writer = FixedWidthWriterBuilder::new()
         .schema(schema)
         .from_writer(&mut out)?;
     writer.write(&[Some(Value::from("bob")), Some(Value::Int(185))])?;
     writer.flush()?;
     Ok(())
 }
 ```

 ## Features

 + Delimited tokenizer: multi-character separators, quoted fields with
   doubled-quote escapes, embedded line endings, partitioned (never-quote)
   mode
 + Fixed-width tokenizer: per-column windows with alignment, fill and
   truncation policies
 + Column codecs for the usual scalar kinds plus dates, times, GUIDs,
   decimals, enumerations and custom conversions
 + Schema selection by predicate for files that mix record layouts
 + Header handling: discard, verify against the schema, or infer an untyped
   schema from the header names
 + Record skipping and column-level substitution driven by subscribers
*/

pub mod delimited;
pub mod error;
pub mod fixed;
pub mod schema;
pub mod source;
pub mod stream;
pub mod value;

#[doc(inline)]
pub use error::FlatFileError;

#[doc(inline)]
pub use value::Value;

#[doc(inline)]
pub use schema::{
    Alignment, Column, ColumnKind, CustomCodec, MetadataKind, NullMode, Schema, SchemaSelector,
    TrimMode, Truncation, Window,
};

pub use schema::selector::WriteSchemaSelector;

pub use stream::{
    ColumnErrorAction, ColumnErrorEvent, RawRecord, ReadAction, RecordContext, RecordErrorAction,
    RecordErrorEvent, RecordParsedEvent, RecordReadEvent, RecordWriteEvent, RecordWrittenEvent,
};

#[doc(inline)]
pub use delimited::{
    DelimitedOptions, DelimitedReader, DelimitedReaderBuilder, DelimitedWriter,
    DelimitedWriterBuilder, QuoteBehavior,
};

#[doc(inline)]
pub use fixed::{
    FixedWidthOptions, FixedWidthReader, FixedWidthReaderBuilder, FixedWidthWriter,
    FixedWidthWriterBuilder, PartialRecordPolicy,
};

pub use source::{CharSource, IoSource, RetryReader, StringSource};
