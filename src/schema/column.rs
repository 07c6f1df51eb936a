use std::fmt;
use std::sync::Arc;

use time::format_description::{self, OwnedFormatItem};

use crate::error::FlatFileError;
use crate::stream::RecordContext;
use crate::value::Value;

/// Horizontal placement of a value inside its fixed-width window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    LeftAligned,
    RightAligned,
}

/// Which end of an over-long value is dropped when it does not fit its
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    /// Drop leading characters, keeping the last `width`.
    TruncateLeading,
    /// Drop trailing characters, keeping the first `width`.
    TruncateTrailing,
}

/// How a column recognizes and emits missing values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NullMode {
    /// The empty string reads as null; null writes as the empty string.
    #[default]
    EmptyIsNull,
    /// The given sentinel reads as null; null writes as the sentinel. The
    /// empty string is ordinary text in this mode.
    Sentinel(String),
}

/// Whether surrounding whitespace is stripped before a codec sees the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimMode {
    #[default]
    Trim,
    Preserve,
}

/// What a metadata column derives its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// The 1-based count of raw records consumed, including headers and
    /// skipped records.
    PhysicalRecordNumber,
    /// The 1-based count of successfully parsed, non-skipped records.
    LogicalRecordNumber,
}

/// Fixed-width column descriptor: how many characters the column occupies
/// and how its value sits inside them.
///
/// Alignment, fill and truncation left unset here fall back to the defaults
/// on [`FixedWidthOptions`](crate::fixed::FixedWidthOptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub(crate) width: usize,
    pub(crate) alignment: Option<Alignment>,
    pub(crate) fill: Option<char>,
    pub(crate) truncation: Option<Truncation>,
}

impl Window {
    /// A window of `width` characters with every policy inherited from the
    /// format options. Width must be at least one; zero-width windows are
    /// rejected when the schema is attached to a reader or writer.
    pub fn new(width: usize) -> Self {
        Window {
            width,
            alignment: None,
            fill: None,
            truncation: None,
        }
    }

    pub fn align(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn fill(mut self, fill: char) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn truncate(mut self, truncation: Truncation) -> Self {
        self.truncation = Some(truncation);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

type ParseFn = dyn Fn(&str, &RecordContext<'_>) -> Result<Option<Value>, String> + Send + Sync;
type FormatFn = dyn Fn(&Value, &RecordContext<'_>) -> Result<String, String> + Send + Sync;

/// A user-supplied text↔value conversion pair for [`ColumnKind::Custom`]
/// columns.
///
/// Both directions report failure as a plain message; the schema wraps it
/// into a [`FlatFileError::ColumnConversion`] carrying the column name and
/// record number.
#[derive(Clone)]
pub struct CustomCodec {
    pub(crate) parse: Arc<ParseFn>,
    pub(crate) format: Arc<FormatFn>,
}

impl CustomCodec {
    pub fn new(
        parse: impl Fn(&str, &RecordContext<'_>) -> Result<Option<Value>, String>
            + Send
            + Sync
            + 'static,
        format: impl Fn(&Value, &RecordContext<'_>) -> Result<String, String>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        CustomCodec {
            parse: Arc::new(parse),
            format: Arc::new(format),
        }
    }
}

impl fmt::Debug for CustomCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomCodec")
    }
}

/// The closed set of logical column kinds.
///
/// Data-bearing kinds map one-to-one onto [`Value`] variants. `Ignored` and
/// `Metadata` are structural: an ignored column consumes a raw field on read
/// and emits a blank one on write without ever surfacing a value, while a
/// metadata column synthesizes its value from the record context without
/// consuming a field.
#[derive(Debug, Clone)]
pub enum ColumnKind {
    Bool,
    Byte,
    Short,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Char,
    String,
    Guid,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Enum { variants: Vec<(String, i64)> },
    Bytes,
    Chars,
    Ignored,
    Metadata(MetadataKind),
    Custom(CustomCodec),
}

impl ColumnKind {
    fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnKind::Date
                | ColumnKind::Time
                | ColumnKind::DateTime
                | ColumnKind::DateTimeOffset
        )
    }
}

/// One column of a schema: a unique name, a logical kind, and the policies
/// applied around its codec.
///
/// Columns are built through the per-kind constructors and configured by
/// chaining:
///
/// ```
/// use flatrec::{Column, TrimMode, Window};
///
/// let price = Column::decimal("price").null_sentinel("n/a");
/// let name = Column::string("name")
///     .trim_mode(TrimMode::Preserve)
///     .window(Window::new(20));
/// ```
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    null_mode: NullMode,
    trim_mode: TrimMode,
    format: Option<OwnedFormatItem>,
    window: Option<Window>,
}

impl Column {
    fn with_kind(name: impl Into<String>, kind: ColumnKind) -> Self {
        Column {
            name: name.into(),
            kind,
            null_mode: NullMode::default(),
            trim_mode: TrimMode::default(),
            format: None,
            window: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Bool)
    }

    pub fn byte(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Byte)
    }

    pub fn short(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Short)
    }

    pub fn int32(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Int32)
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Int64)
    }

    pub fn float32(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Float32)
    }

    pub fn float64(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Float64)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Decimal)
    }

    pub fn char(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Char)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::String)
    }

    pub fn guid(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Guid)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Date)
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Time)
    }

    pub fn date_time(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::DateTime)
    }

    pub fn date_time_offset(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::DateTimeOffset)
    }

    pub fn time_span(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::TimeSpan)
    }

    /// An enumeration column. Text matching a variant name
    /// (case-insensitively) or a listed discriminant parses to
    /// [`Value::Enum`]; values format back to the variant name.
    pub fn enumeration(name: impl Into<String>, variants: Vec<(String, i64)>) -> Self {
        Self::with_kind(name, ColumnKind::Enum { variants })
    }

    /// A byte-array column carried as hexadecimal text.
    pub fn bytes(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Bytes)
    }

    pub fn chars(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Chars)
    }

    /// A column that is present in the file but never surfaced: its raw
    /// field is consumed on read and written back blank.
    pub fn ignored(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Ignored)
    }

    /// A metadata column carrying the physical record number.
    pub fn physical_record_number(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            ColumnKind::Metadata(MetadataKind::PhysicalRecordNumber),
        )
    }

    /// A metadata column carrying the logical record number.
    pub fn logical_record_number(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Metadata(MetadataKind::LogicalRecordNumber))
    }

    /// A column converted by user-supplied functions.
    pub fn custom(name: impl Into<String>, codec: CustomCodec) -> Self {
        Self::with_kind(name, ColumnKind::Custom(codec))
    }

    /// Treats the given sentinel as null on read and emits it for null on
    /// write. Replaces the default empty-string-is-null behavior.
    pub fn null_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.null_mode = NullMode::Sentinel(sentinel.into());
        self
    }

    pub fn trim_mode(mut self, trim_mode: TrimMode) -> Self {
        self.trim_mode = trim_mode;
        self
    }

    /// Sets the format description used to parse and render this column's
    /// temporal values, in [`time::format_description`] syntax, e.g.
    /// `"[year][month][day]"`. The description is validated here so a typo
    /// fails at schema-building time rather than once per record.
    ///
    /// Returns an error for non-temporal kinds.
    pub fn with_format(mut self, description: &str) -> Result<Self, FlatFileError> {
        if !self.kind.is_temporal() {
            return Err(FlatFileError::InvalidOptions(format!(
                "column '{}' does not take a format description",
                self.name
            )));
        }
        let parsed = format_description::parse_owned::<2>(description)
            .map_err(|e| FlatFileError::InvalidOptions(e.to_string()))?;
        self.format = Some(parsed);
        Ok(self)
    }

    /// Attaches the fixed-width window. Only consulted by fixed-width
    /// readers and writers; delimited schemas ignore it.
    pub fn window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn null_mode(&self) -> &NullMode {
        &self.null_mode
    }

    pub fn trim(&self) -> TrimMode {
        self.trim_mode
    }

    pub fn window_spec(&self) -> Option<&Window> {
        self.window.as_ref()
    }

    pub(crate) fn format_description(&self) -> Option<&OwnedFormatItem> {
        self.format.as_ref()
    }

    pub fn is_metadata(&self) -> bool {
        matches!(self.kind, ColumnKind::Metadata(_))
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self.kind, ColumnKind::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_description_validates_on_set() {
        assert!(Column::date("d").with_format("[year][month][day]").is_ok());
        assert!(Column::date("d").with_format("[not-a-component]").is_err());
    }

    #[test]
    fn format_description_rejected_for_numbers() {
        let err = Column::int32("n").with_format("[year]").unwrap_err();
        assert!(matches!(err, FlatFileError::InvalidOptions(_)));
    }

    #[test]
    fn window_policies_are_optional() {
        let window = Window::new(8).align(Alignment::RightAligned).fill('0');
        assert_eq!(window.width(), 8);
        assert_eq!(window.alignment, Some(Alignment::RightAligned));
        assert_eq!(window.truncation, None);
    }
}
