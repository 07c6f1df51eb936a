//! Per-column text↔value conversion.
//!
//! A codec run is the same three steps in both directions: null-sentinel
//! handling, whitespace policy, then a dispatch on the column kind. The
//! dispatch is a plain `match` over [`ColumnKind`] so every conversion is a
//! direct call; custom columns carry their own function objects.

use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

use crate::error::{clip, FlatFileError};
use crate::schema::column::{Column, ColumnKind, NullMode, TrimMode};
use crate::stream::RecordContext;
use crate::value::Value;

/// Converts one raw field into a typed value, or null.
///
/// Structural columns never reach this function; the schema walk handles
/// them before dispatch.
pub(crate) fn parse_value(
    column: &Column,
    raw: &str,
    ctx: &RecordContext<'_>,
) -> Result<Option<Value>, FlatFileError> {
    let text = match column.trim() {
        TrimMode::Trim => raw.trim(),
        TrimMode::Preserve => raw,
    };
    match column.null_mode() {
        NullMode::EmptyIsNull if text.is_empty() => return Ok(None),
        NullMode::Sentinel(sentinel) if text == sentinel => return Ok(None),
        _ => {}
    }
    let value = match column.kind() {
        ColumnKind::Bool => {
            if text.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if text.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                return Err(conversion_error(ctx, column, raw, "expected true or false"));
            }
        }
        ColumnKind::Byte => Value::Byte(parse_number(ctx, column, raw, text)?),
        ColumnKind::Short => Value::Short(parse_number(ctx, column, raw, text)?),
        ColumnKind::Int32 => Value::Int(parse_number(ctx, column, raw, text)?),
        ColumnKind::Int64 => Value::Long(parse_number(ctx, column, raw, text)?),
        ColumnKind::Float32 => Value::Float(parse_number(ctx, column, raw, text)?),
        ColumnKind::Float64 => Value::Double(parse_number(ctx, column, raw, text)?),
        ColumnKind::Decimal => Value::Decimal(
            text.parse::<Decimal>()
                .map_err(|e| conversion_error(ctx, column, raw, e.to_string()))?,
        ),
        ColumnKind::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Value::Char(ch),
                _ => {
                    return Err(conversion_error(
                        ctx,
                        column,
                        raw,
                        "expected exactly one character",
                    ))
                }
            }
        }
        ColumnKind::String => Value::String(text.to_string()),
        ColumnKind::Guid => Value::Guid(
            Uuid::parse_str(text).map_err(|e| conversion_error(ctx, column, raw, e.to_string()))?,
        ),
        ColumnKind::Date => {
            let parsed = match column.format_description() {
                Some(fmt) => Date::parse(text, fmt),
                None => Date::parse(text, format_description!("[year]-[month]-[day]")),
            };
            Value::Date(parsed.map_err(|e| conversion_error(ctx, column, raw, e.to_string()))?)
        }
        ColumnKind::Time => {
            let parsed = match column.format_description() {
                Some(fmt) => Time::parse(text, fmt),
                None => Time::parse(text, format_description!("[hour]:[minute]:[second]")),
            };
            Value::Time(parsed.map_err(|e| conversion_error(ctx, column, raw, e.to_string()))?)
        }
        ColumnKind::DateTime => {
            let parsed = match column.format_description() {
                Some(fmt) => PrimitiveDateTime::parse(text, fmt),
                None => PrimitiveDateTime::parse(
                    text,
                    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
                ),
            };
            Value::DateTime(parsed.map_err(|e| conversion_error(ctx, column, raw, e.to_string()))?)
        }
        ColumnKind::DateTimeOffset => {
            let parsed = match column.format_description() {
                Some(fmt) => OffsetDateTime::parse(text, fmt),
                None => OffsetDateTime::parse(text, &Rfc3339),
            };
            Value::DateTimeOffset(
                parsed.map_err(|e| conversion_error(ctx, column, raw, e.to_string()))?,
            )
        }
        ColumnKind::TimeSpan => {
            Value::Span(parse_span(text).map_err(|m| conversion_error(ctx, column, raw, m))?)
        }
        ColumnKind::Enum { variants } => {
            let by_name = variants
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(text));
            match by_name {
                Some((_, discriminant)) => Value::Enum(*discriminant),
                None => match text.parse::<i64>() {
                    Ok(n) if variants.iter().any(|(_, d)| *d == n) => Value::Enum(n),
                    _ => {
                        return Err(conversion_error(
                            ctx,
                            column,
                            raw,
                            "not a known enumeration variant",
                        ))
                    }
                },
            }
        }
        ColumnKind::Bytes => {
            Value::Bytes(decode_hex(text).map_err(|m| conversion_error(ctx, column, raw, m))?)
        }
        ColumnKind::Chars => Value::Chars(text.chars().collect()),
        ColumnKind::Custom(codec) => {
            return (codec.parse)(text, ctx).map_err(|m| conversion_error(ctx, column, raw, m))
        }
        ColumnKind::Ignored | ColumnKind::Metadata(_) => return Ok(None),
    };
    Ok(Some(value))
}

/// Renders one typed value (or null) back into raw text. Fixed-width
/// padding happens later, in the window layer.
pub(crate) fn format_value(
    column: &Column,
    value: Option<&Value>,
    ctx: &RecordContext<'_>,
) -> Result<String, FlatFileError> {
    let value = match value {
        None => {
            return Ok(match column.null_mode() {
                NullMode::EmptyIsNull => String::new(),
                NullMode::Sentinel(sentinel) => sentinel.clone(),
            })
        }
        Some(value) => value,
    };
    let text = match (column.kind(), value) {
        (ColumnKind::Bool, Value::Bool(v)) => v.to_string(),
        (ColumnKind::Byte, Value::Byte(v)) => v.to_string(),
        (ColumnKind::Short, Value::Short(v)) => v.to_string(),
        (ColumnKind::Int32, Value::Int(v)) => v.to_string(),
        (ColumnKind::Int64, Value::Long(v)) => v.to_string(),
        (ColumnKind::Float32, Value::Float(v)) => v.to_string(),
        (ColumnKind::Float64, Value::Double(v)) => v.to_string(),
        (ColumnKind::Decimal, Value::Decimal(v)) => v.to_string(),
        (ColumnKind::Char, Value::Char(v)) => v.to_string(),
        (ColumnKind::String, Value::String(v)) => v.clone(),
        (ColumnKind::Guid, Value::Guid(v)) => v.to_string(),
        (ColumnKind::Date, Value::Date(v)) => match column.format_description() {
            Some(fmt) => v
                .format(fmt)
                .map_err(|e| conversion_error(ctx, column, "", e.to_string()))?,
            None => v
                .format(format_description!("[year]-[month]-[day]"))
                .map_err(|e| conversion_error(ctx, column, "", e.to_string()))?,
        },
        (ColumnKind::Time, Value::Time(v)) => match column.format_description() {
            Some(fmt) => v
                .format(fmt)
                .map_err(|e| conversion_error(ctx, column, "", e.to_string()))?,
            None => v
                .format(format_description!("[hour]:[minute]:[second]"))
                .map_err(|e| conversion_error(ctx, column, "", e.to_string()))?,
        },
        (ColumnKind::DateTime, Value::DateTime(v)) => match column.format_description() {
            Some(fmt) => v
                .format(fmt)
                .map_err(|e| conversion_error(ctx, column, "", e.to_string()))?,
            None => v
                .format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second]"
                ))
                .map_err(|e| conversion_error(ctx, column, "", e.to_string()))?,
        },
        (ColumnKind::DateTimeOffset, Value::DateTimeOffset(v)) => {
            match column.format_description() {
                Some(fmt) => v
                    .format(fmt)
                    .map_err(|e| conversion_error(ctx, column, "", e.to_string()))?,
                None => v
                    .format(&Rfc3339)
                    .map_err(|e| conversion_error(ctx, column, "", e.to_string()))?,
            }
        }
        (ColumnKind::TimeSpan, Value::Span(v)) => format_span(*v),
        (ColumnKind::Enum { variants }, Value::Enum(discriminant)) => variants
            .iter()
            .find(|(_, d)| d == discriminant)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| discriminant.to_string()),
        (ColumnKind::Bytes, Value::Bytes(v)) => encode_hex(v),
        (ColumnKind::Chars, Value::Chars(v)) => v.iter().collect(),
        (ColumnKind::Custom(codec), v) => {
            return (codec.format)(v, ctx).map_err(|m| conversion_error(ctx, column, "", m))
        }
        (ColumnKind::Ignored | ColumnKind::Metadata(_), _) => String::new(),
        (_, other) => {
            return Err(conversion_error(
                ctx,
                column,
                "",
                format!("value of type {} does not match the column", other.type_name()),
            ))
        }
    };
    Ok(text)
}

fn parse_number<T: std::str::FromStr>(
    ctx: &RecordContext<'_>,
    column: &Column,
    raw: &str,
    text: &str,
) -> Result<T, FlatFileError>
where
    T::Err: std::fmt::Display,
{
    text.parse::<T>()
        .map_err(|e| conversion_error(ctx, column, raw, e.to_string()))
}

fn conversion_error(
    ctx: &RecordContext<'_>,
    column: &Column,
    raw: &str,
    message: impl Into<String>,
) -> FlatFileError {
    FlatFileError::ColumnConversion {
        record: ctx.physical_record_number,
        column: column.name().to_string(),
        text: clip(raw),
        message: message.into(),
    }
}

/// Parses the `[-][d.]hh:mm:ss[.fraction]` span layout.
fn parse_span(text: &str) -> Result<Duration, String> {
    const LAYOUT: &str = "expected [-][d.]hh:mm:ss[.fraction]";
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parts: Vec<&str> = rest.split(':').collect();
    if parts.len() != 3 {
        return Err(LAYOUT.to_string());
    }
    let (days, hours) = match parts[0].split_once('.') {
        Some((days, hours)) => (
            days.parse::<i64>().map_err(|_| LAYOUT.to_string())?,
            hours.parse::<i64>().map_err(|_| LAYOUT.to_string())?,
        ),
        None => (0, parts[0].parse::<i64>().map_err(|_| LAYOUT.to_string())?),
    };
    let minutes = parts[1].parse::<i64>().map_err(|_| LAYOUT.to_string())?;
    let (seconds, nanos) = match parts[2].split_once('.') {
        Some((seconds, fraction)) => {
            if fraction.is_empty()
                || fraction.len() > 9
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(LAYOUT.to_string());
            }
            let mut padded = fraction.to_string();
            while padded.len() < 9 {
                padded.push('0');
            }
            (
                seconds.parse::<i64>().map_err(|_| LAYOUT.to_string())?,
                padded.parse::<i32>().map_err(|_| LAYOUT.to_string())?,
            )
        }
        None => (parts[2].parse::<i64>().map_err(|_| LAYOUT.to_string())?, 0),
    };
    if !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return Err(LAYOUT.to_string());
    }
    let total_seconds = ((days * 24 + hours) * 60 + minutes) * 60 + seconds;
    let span = Duration::new(total_seconds, nanos);
    Ok(if negative { -span } else { span })
}

fn format_span(span: Duration) -> String {
    let negative = span.is_negative();
    let span = span.abs();
    let days = span.whole_days();
    let hours = span.whole_hours() - days * 24;
    let minutes = span.whole_minutes() - span.whole_hours() * 60;
    let seconds = span.whole_seconds() - span.whole_minutes() * 60;
    let nanos = span.subsec_nanoseconds();
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if days > 0 {
        out.push_str(&days.to_string());
        out.push('.');
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if nanos > 0 {
        out.push('.');
        let fraction = format!("{nanos:09}");
        out.push_str(fraction.trim_end_matches('0'));
    }
    out
}

fn decode_hex(text: &str) -> Result<Vec<u8>, String> {
    if !text.is_ascii() || text.len() % 2 != 0 {
        return Err("expected an even number of hex digits".to_string());
    }
    let mut bytes = Vec::with_capacity(text.len() / 2);
    for pair in text.as_bytes().chunks(2) {
        let digits =
            std::str::from_utf8(pair).map_err(|_| "expected hex digits".to_string())?;
        let byte = u8::from_str_radix(digits, 16)
            .map_err(|_| format!("invalid hex digits {digits:?}"))?;
        bytes.push(byte);
    }
    Ok(bytes)
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use time::Month;

    fn ctx_over(schema: &Schema) -> RecordContext<'_> {
        RecordContext {
            schema,
            record_text: "",
            raw_fields: &[],
            physical_record_number: 1,
            logical_record_number: 0,
        }
    }

    fn empty_schema() -> Schema {
        Schema::new()
    }

    #[test]
    fn parses_and_formats_numbers() {
        let schema = empty_schema();
        let ctx = ctx_over(&schema);
        let column = Column::float64("weight");
        let value = parse_value(&column, " 5.12 ", &ctx).unwrap();
        assert_eq!(value, Some(Value::Double(5.12)));
        assert_eq!(format_value(&column, value.as_ref(), &ctx).unwrap(), "5.12");
    }

    #[test]
    fn null_sentinel_round_trips() {
        let schema = empty_schema();
        let ctx = ctx_over(&schema);
        let column = Column::int32("count").null_sentinel("----");
        assert_eq!(parse_value(&column, "----", &ctx).unwrap(), None);
        assert_eq!(format_value(&column, None, &ctx).unwrap(), "----");
    }

    #[test]
    fn empty_is_ordinary_text_under_sentinel_mode() {
        let schema = empty_schema();
        let ctx = ctx_over(&schema);
        let column = Column::int32("count").null_sentinel("n/a");
        assert!(parse_value(&column, "", &ctx).is_err());
    }

    #[test]
    fn date_with_custom_format() {
        let schema = empty_schema();
        let ctx = ctx_over(&schema);
        let column = Column::date("birth").with_format("[year][month][day]").unwrap();
        let value = parse_value(&column, "20120123", &ctx).unwrap();
        let expected = Date::from_calendar_date(2012, Month::January, 23).unwrap();
        assert_eq!(value, Some(Value::Date(expected)));
        assert_eq!(
            format_value(&column, value.as_ref(), &ctx).unwrap(),
            "20120123"
        );
    }

    #[test]
    fn conversion_failure_names_the_column() {
        let schema = empty_schema();
        let ctx = ctx_over(&schema);
        let column = Column::int32("count");
        let err = parse_value(&column, "pear", &ctx).unwrap_err();
        match err {
            FlatFileError::ColumnConversion { column, text, .. } => {
                assert_eq!(column, "count");
                assert_eq!(text, "pear");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn kind_mismatch_on_write() {
        let schema = empty_schema();
        let ctx = ctx_over(&schema);
        let column = Column::int32("count");
        let err = format_value(&column, Some(&Value::Bool(true)), &ctx).unwrap_err();
        assert!(matches!(err, FlatFileError::ColumnConversion { .. }));
    }

    #[test]
    fn span_layout_round_trips() {
        let span = parse_span("1.02:30:00").unwrap();
        assert_eq!(span, Duration::hours(26) + Duration::minutes(30));
        assert_eq!(format_span(span), "1.02:30:00");

        let negative = parse_span("-00:00:01.5").unwrap();
        assert_eq!(negative, -(Duration::seconds(1) + Duration::milliseconds(500)));
        assert_eq!(format_span(negative), "-00:00:01.5");
    }

    #[test]
    fn hex_bytes_round_trip() {
        assert_eq!(decode_hex("0aff").unwrap(), vec![0x0a, 0xff]);
        assert_eq!(encode_hex(&[0x0a, 0xff]), "0aff");
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn enum_accepts_name_or_discriminant() {
        let schema = empty_schema();
        let ctx = ctx_over(&schema);
        let column = Column::enumeration(
            "status",
            vec![("active".to_string(), 0), ("retired".to_string(), 1)],
        );
        assert_eq!(
            parse_value(&column, "Active", &ctx).unwrap(),
            Some(Value::Enum(0))
        );
        assert_eq!(
            parse_value(&column, "1", &ctx).unwrap(),
            Some(Value::Enum(1))
        );
        assert!(parse_value(&column, "2", &ctx).is_err());
        assert_eq!(
            format_value(&column, Some(&Value::Enum(1)), &ctx).unwrap(),
            "retired"
        );
    }
}
