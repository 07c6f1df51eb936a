//! Schemas: ordered, uniquely-named column sets and the per-record
//! parse/format pipeline they drive.

use std::collections::HashMap;

use crate::error::FlatFileError;
use crate::stream::{ColumnErrorAction, ColumnErrorEvent, RecordContext};
use crate::value::Value;

pub mod column;
pub(crate) mod codec;
pub mod selector;

pub use column::{
    Alignment, Column, ColumnKind, CustomCodec, MetadataKind, NullMode, TrimMode, Truncation,
    Window,
};
pub use selector::SchemaSelector;

use column::MetadataKind as Meta;

/// An ordered sequence of columns keyed by case-insensitive name.
///
/// Insertion order is serialization order. A schema is immutable once it is
/// attached to a reader or writer (attachment takes ownership, so the type
/// system enforces it).
///
/// ```
/// use flatrec::{Column, Schema};
///
/// # fn main() -> Result<(), flatrec::FlatFileError> {
/// let schema = Schema::new()
///     .add_column(Column::string("first_name"))?
///     .add_column(Column::string("last_name"))?
///     .add_column(Column::int32("weight"))?;
/// assert_eq!(schema.physical_count(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    metadata_count: usize,
    ignored_count: usize,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Appends a column, returning the schema for chaining. Fails if the
    /// name duplicates an existing column under case-insensitive comparison.
    pub fn add_column(mut self, column: Column) -> Result<Self, FlatFileError> {
        let key = column.name().to_lowercase();
        if self.index.contains_key(&key) {
            return Err(FlatFileError::DuplicateColumn(column.name().to_string()));
        }
        if column.is_metadata() {
            self.metadata_count += 1;
        }
        if column.is_ignored() {
            self.ignored_count += 1;
        }
        self.index.insert(key, self.columns.len());
        self.columns.push(column);
        Ok(self)
    }

    /// The ordered, read-only column view.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks a column up by case-insensitive name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.columns[i])
    }

    /// Total number of columns, in serialization order.
    pub fn physical_count(&self) -> usize {
        self.columns.len()
    }

    /// Physical count minus metadata columns: the number of raw fields a
    /// record of this schema occupies in the file.
    pub fn logical_count(&self) -> usize {
        self.columns.len() - self.metadata_count
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata_count
    }

    pub fn ignored_count(&self) -> usize {
        self.ignored_count
    }

    /// Length of the surfaced value vector: every column except the ignored
    /// ones. Read output and write input share this shape, so a parsed
    /// record can be handed straight back to a writer.
    pub fn value_count(&self) -> usize {
        self.columns.len() - self.ignored_count
    }

    /// Names of the columns that occupy raw fields, in order. This is the
    /// record a header row holds.
    pub fn header_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !c.is_metadata())
            .map(|c| c.name())
            .collect()
    }

    /// Builds the untyped schema used when the first record is a header and
    /// no schema was supplied: one string column per header token.
    pub(crate) fn from_header(fields: &[String]) -> Result<Self, FlatFileError> {
        let mut schema = Schema::new();
        for field in fields {
            schema = schema.add_column(Column::string(field.trim()))?;
        }
        Ok(schema)
    }

    /// Walks the columns in order, converting raw fields into typed values.
    /// Metadata columns synthesize their value from the context without
    /// consuming a field; ignored columns consume a field without producing
    /// a value. Codec failures are offered to `on_column_error`, which may
    /// substitute a value; an unhandled failure aborts the record.
    pub(crate) fn parse_record(
        &self,
        ctx: &RecordContext<'_>,
        raw_fields: &[String],
        on_column_error: &mut dyn FnMut(&ColumnErrorEvent<'_>) -> ColumnErrorAction,
    ) -> Result<Vec<Option<Value>>, FlatFileError> {
        let expected = self.logical_count();
        if raw_fields.len() != expected {
            return Err(FlatFileError::RecordShape {
                record: ctx.physical_record_number,
                actual: raw_fields.len(),
                expected,
            });
        }
        let mut values = Vec::with_capacity(self.value_count());
        let mut field_index = 0;
        for column in &self.columns {
            match column.kind() {
                ColumnKind::Metadata(kind) => values.push(Some(metadata_value(*kind, ctx))),
                ColumnKind::Ignored => field_index += 1,
                _ => {
                    let raw = &raw_fields[field_index];
                    field_index += 1;
                    match codec::parse_value(column, raw, ctx) {
                        Ok(value) => values.push(value),
                        Err(error) => {
                            let event = ColumnErrorEvent {
                                record: ctx.physical_record_number,
                                column: column.name(),
                                raw_text: raw,
                                error: &error,
                            };
                            match on_column_error(&event) {
                                ColumnErrorAction::Substitute(substitute) => {
                                    values.push(substitute)
                                }
                                ColumnErrorAction::Unhandled => return Err(error),
                            }
                        }
                    }
                }
            }
        }
        Ok(values)
    }

    /// The write-side mirror of [`parse_record`](Self::parse_record): emits
    /// one raw field per non-metadata column. Metadata slots in the value
    /// vector are present but skipped; ignored columns emit a blank field.
    pub(crate) fn format_record(
        &self,
        ctx: &RecordContext<'_>,
        values: &[Option<Value>],
        on_column_error: &mut dyn FnMut(&ColumnErrorEvent<'_>) -> ColumnErrorAction,
    ) -> Result<Vec<String>, FlatFileError> {
        if values.len() != self.value_count() {
            return Err(FlatFileError::RecordShape {
                record: ctx.physical_record_number,
                actual: values.len(),
                expected: self.value_count(),
            });
        }
        let mut fields = Vec::with_capacity(self.logical_count());
        let mut value_index = 0;
        for column in &self.columns {
            match column.kind() {
                ColumnKind::Metadata(_) => value_index += 1,
                ColumnKind::Ignored => fields.push(String::new()),
                _ => {
                    let value = values[value_index].as_ref();
                    value_index += 1;
                    match codec::format_value(column, value, ctx) {
                        Ok(text) => fields.push(text),
                        Err(error) => {
                            let event = ColumnErrorEvent {
                                record: ctx.physical_record_number,
                                column: column.name(),
                                raw_text: "",
                                error: &error,
                            };
                            match on_column_error(&event) {
                                ColumnErrorAction::Substitute(substitute) => {
                                    let text =
                                        codec::format_value(column, substitute.as_ref(), ctx)?;
                                    fields.push(text);
                                }
                                ColumnErrorAction::Unhandled => return Err(error),
                            }
                        }
                    }
                }
            }
        }
        Ok(fields)
    }
}

fn metadata_value(kind: Meta, ctx: &RecordContext<'_>) -> Value {
    match kind {
        Meta::PhysicalRecordNumber => Value::Long(ctx.physical_record_number as i64),
        Meta::LogicalRecordNumber => Value::Long(ctx.logical_record_number as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhandled(_: &ColumnErrorEvent<'_>) -> ColumnErrorAction {
        ColumnErrorAction::Unhandled
    }

    fn ctx<'a>(schema: &'a Schema, raw_fields: &'a [String]) -> RecordContext<'a> {
        RecordContext {
            schema,
            record_text: "",
            raw_fields,
            physical_record_number: 1,
            logical_record_number: 1,
        }
    }

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn names_are_unique_case_insensitively() {
        let result = Schema::new()
            .add_column(Column::string("Name"))
            .and_then(|s| s.add_column(Column::int32("NAME")));
        assert!(matches!(result, Err(FlatFileError::DuplicateColumn(_))));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let schema = Schema::new()
            .add_column(Column::string("Name"))
            .unwrap();
        assert!(schema.column("nAmE").is_some());
        assert!(schema.column("other").is_none());
    }

    #[test]
    fn counts_track_structural_columns() {
        let schema = Schema::new()
            .add_column(Column::string("a"))
            .unwrap()
            .add_column(Column::ignored("filler"))
            .unwrap()
            .add_column(Column::physical_record_number("row"))
            .unwrap();
        assert_eq!(schema.physical_count(), 3);
        assert_eq!(schema.logical_count(), 2);
        assert_eq!(schema.metadata_count(), 1);
        assert_eq!(schema.ignored_count(), 1);
        assert_eq!(schema.value_count(), 2);
        assert_eq!(schema.header_names(), vec!["a", "filler"]);
    }

    #[test]
    fn parse_skips_ignored_and_synthesizes_metadata() {
        let schema = Schema::new()
            .add_column(Column::string("name"))
            .unwrap()
            .add_column(Column::ignored("filler"))
            .unwrap()
            .add_column(Column::physical_record_number("row"))
            .unwrap();
        let raw = fields(&["bob", "junk"]);
        let context = ctx(&schema, &raw);
        let values = schema
            .parse_record(&context, &raw, &mut unhandled)
            .unwrap();
        assert_eq!(
            values,
            vec![Some(Value::String("bob".to_string())), Some(Value::Long(1))]
        );
    }

    #[test]
    fn format_mirrors_parse_shape() {
        let schema = Schema::new()
            .add_column(Column::string("name"))
            .unwrap()
            .add_column(Column::ignored("filler"))
            .unwrap()
            .add_column(Column::physical_record_number("row"))
            .unwrap();
        let raw: Vec<String> = Vec::new();
        let context = ctx(&schema, &raw);
        let values = vec![Some(Value::String("bob".to_string())), Some(Value::Long(9))];
        let emitted = schema
            .format_record(&context, &values, &mut unhandled)
            .unwrap();
        assert_eq!(emitted, vec!["bob".to_string(), String::new()]);
    }

    #[test]
    fn wrong_field_count_is_a_shape_error() {
        let schema = Schema::new()
            .add_column(Column::string("a"))
            .unwrap()
            .add_column(Column::string("b"))
            .unwrap()
            .add_column(Column::string("c"))
            .unwrap();
        let raw = fields(&["x", "y"]);
        let context = ctx(&schema, &raw);
        let err = schema
            .parse_record(&context, &raw, &mut unhandled)
            .unwrap_err();
        assert!(matches!(
            err,
            FlatFileError::RecordShape {
                actual: 2,
                expected: 3,
                ..
            }
        ));
    }

    #[test]
    fn column_error_substitution_keeps_the_record() {
        let schema = Schema::new()
            .add_column(Column::int32("a"))
            .unwrap()
            .add_column(Column::int32("b"))
            .unwrap();
        let raw = fields(&["pear", "7"]);
        let context = ctx(&schema, &raw);
        let mut handler = |event: &ColumnErrorEvent<'_>| {
            assert_eq!(event.column, "a");
            ColumnErrorAction::Substitute(Some(Value::Int(-1)))
        };
        let values = schema.parse_record(&context, &raw, &mut handler).unwrap();
        assert_eq!(values, vec![Some(Value::Int(-1)), Some(Value::Int(7))]);
    }
}
