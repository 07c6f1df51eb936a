//! Predicate-driven schema selection for streams that interleave more than
//! one record layout.

use std::sync::Arc;

use crate::schema::Schema;
use crate::value::Value;

/// Chooses one schema per record from an ordered list of predicates.
///
/// The probe type `T` depends on where the selector sits: delimited readers
/// probe the raw field vector (`[String]`), fixed-width readers probe the
/// raw record text (`str`, since fields only exist once a schema's windows
/// are known), and writers probe the typed value vector
/// (`[Option<Value>]`).
///
/// The first matching predicate wins, in insertion order. When nothing
/// matches, the fallback schema is used if one was configured; otherwise the
/// stream raises a schema-selection error for that record.
///
/// ```
/// use flatrec::{Column, Schema, SchemaSelector};
///
/// # fn main() -> Result<(), flatrec::FlatFileError> {
/// let order = Schema::new().add_column(Column::string("order_id"))?;
/// let line = Schema::new()
///     .add_column(Column::string("order_id"))?
///     .add_column(Column::int32("quantity"))?;
///
/// let selector = SchemaSelector::new()
///     .when(|fields: &[String]| fields.len() == 1, order)
///     .otherwise(line);
///
/// let probe = vec!["ord-17".to_string()];
/// assert_eq!(selector.select(&probe).unwrap().physical_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct SchemaSelector<T: ?Sized = [String]> {
    arms: Vec<Arm<T>>,
    fallback: Option<Arc<Schema>>,
}

struct Arm<T: ?Sized> {
    matches: Box<dyn Fn(&T) -> bool>,
    schema: Arc<Schema>,
}

impl<T: ?Sized> SchemaSelector<T> {
    pub fn new() -> Self {
        SchemaSelector {
            arms: Vec::new(),
            fallback: None,
        }
    }

    /// Appends a predicate→schema arm. Arms are tried in the order they
    /// were added.
    pub fn when(mut self, predicate: impl Fn(&T) -> bool + 'static, schema: Schema) -> Self {
        self.arms.push(Arm {
            matches: Box::new(predicate),
            schema: Arc::new(schema),
        });
        self
    }

    /// Sets the schema used when no predicate matches.
    pub fn otherwise(mut self, schema: Schema) -> Self {
        self.fallback = Some(Arc::new(schema));
        self
    }

    /// Every schema the selector can yield, arms first, fallback last.
    pub(crate) fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.arms
            .iter()
            .map(|arm| &arm.schema)
            .chain(self.fallback.iter())
    }

    /// Picks the schema for one record, or `None` when nothing matches and
    /// no fallback exists.
    pub fn select(&self, probe: &T) -> Option<&Arc<Schema>> {
        for arm in &self.arms {
            if (arm.matches)(probe) {
                return Some(&arm.schema);
            }
        }
        self.fallback.as_ref()
    }
}

impl<T: ?Sized> Default for SchemaSelector<T> {
    fn default() -> Self {
        SchemaSelector::new()
    }
}

/// Write-side selector: predicates probe the typed values about to be
/// formatted.
pub type WriteSchemaSelector = SchemaSelector<[Option<Value>]>;
