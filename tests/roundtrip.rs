//! Write-then-read (and read-then-write) equivalence across both formats.

use std::error::Error;

use flatrec::{
    Column, DelimitedReaderBuilder, DelimitedWriterBuilder, FixedWidthReaderBuilder,
    FixedWidthWriterBuilder, FlatFileError, QuoteBehavior, Schema, Value, Window,
};
use rust_decimal::Decimal;
use time::macros::{date, time};
use uuid::Uuid;

fn typed_schema() -> Result<Schema, FlatFileError> {
    Ok(Schema::new()
        .add_column(Column::string("label"))?
        .add_column(Column::bool("active"))?
        .add_column(Column::int64("count"))?
        .add_column(Column::decimal("price"))?
        .add_column(Column::guid("id"))?
        .add_column(Column::date("opened"))?
        .add_column(Column::time("at"))?
        .add_column(Column::time_span("elapsed"))?)
}

fn sample_values() -> Vec<Option<Value>> {
    vec![
        Some(Value::from("fruit, fresh")),
        Some(Value::Bool(true)),
        Some(Value::Long(-7)),
        Some(Value::Decimal(Decimal::new(512, 2))),
        Some(Value::Guid(
            Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap(),
        )),
        Some(Value::Date(date!(2024 - 02 - 29))),
        Some(Value::Time(time!(23:59:07))),
        Some(Value::Span(
            time::Duration::hours(26) + time::Duration::minutes(30),
        )),
    ]
}

#[test]
fn delimited_values_survive_a_round_trip() -> Result<(), Box<dyn Error>> {
    let values = sample_values();
    let mut out = Vec::new();
    let mut writer = DelimitedWriterBuilder::new()
        .schema(typed_schema()?)
        .from_writer(&mut out)?;
    writer.write(&values)?;
    drop(writer);

    let text = String::from_utf8(out)?;
    let mut reader = DelimitedReaderBuilder::new()
        .schema(typed_schema()?)
        .from_str(&text)?;
    assert!(reader.read()?);
    assert_eq!(reader.get_values()?, values);
    Ok(())
}

#[test]
fn nulls_survive_a_delimited_round_trip() -> Result<(), Box<dyn Error>> {
    let values: Vec<Option<Value>> = vec![None; 8];
    let mut out = Vec::new();
    let mut writer = DelimitedWriterBuilder::new()
        .schema(typed_schema()?)
        .from_writer(&mut out)?;
    writer.write(&values)?;
    drop(writer);

    let mut reader = DelimitedReaderBuilder::new()
        .schema(typed_schema()?)
        .from_str(&String::from_utf8(out)?)?;
    assert!(reader.read()?);
    assert_eq!(reader.get_values()?, values);
    Ok(())
}

#[test]
fn forced_quoting_parses_to_the_same_values() -> Result<(), Box<dyn Error>> {
    // A field with no separator, terminator or quote parses identically
    // whether or not the writer wrapped it in quotes.
    let schema = || -> Result<Schema, FlatFileError> {
        Schema::new()
            .add_column(Column::string("a"))?
            .add_column(Column::int32("n"))
    };
    let values = vec![Some(Value::from("plain")), Some(Value::Int(3))];

    let mut bare = Vec::new();
    let mut writer = DelimitedWriterBuilder::new()
        .schema(schema()?)
        .from_writer(&mut bare)?;
    writer.write(&values)?;
    drop(writer);

    let mut quoted = Vec::new();
    let mut writer = DelimitedWriterBuilder::new()
        .schema(schema()?)
        .quote_behavior(QuoteBehavior::Always)
        .from_writer(&mut quoted)?;
    writer.write(&values)?;
    drop(writer);

    assert_ne!(bare, quoted);
    for text in [String::from_utf8(bare)?, String::from_utf8(quoted)?] {
        let mut reader = DelimitedReaderBuilder::new()
            .schema(schema()?)
            .from_str(&text)?;
        assert!(reader.read()?);
        assert_eq!(reader.get_values()?, values);
    }
    Ok(())
}

#[test]
fn doubled_quote_escape_inverts_exactly() -> Result<(), Box<dyn Error>> {
    let awkward = [
        "she said \"hi\"",
        "\"",
        "\"\"",
        "trailing\"",
        "\"leading",
        "comma, and \"quote\"",
    ];
    for field in awkward {
        let schema = Schema::new().add_column(Column::string("only"))?;
        let mut out = Vec::new();
        let mut writer = DelimitedWriterBuilder::new()
            .schema(schema)
            .from_writer(&mut out)?;
        writer.write(&[Some(Value::from(field))])?;
        drop(writer);

        let schema = Schema::new().add_column(Column::string("only"))?;
        let mut reader = DelimitedReaderBuilder::new()
            .schema(schema)
            .from_str(&String::from_utf8(out)?)?;
        assert!(reader.read()?);
        assert_eq!(reader.get_values()?, vec![Some(Value::from(field))]);
    }
    Ok(())
}

#[test]
fn fixed_width_round_trip_preserves_record_length() -> Result<(), Box<dyn Error>> {
    let schema = || -> Result<Schema, FlatFileError> {
        Schema::new()
            .add_column(Column::string("name").window(Window::new(12)))?
            .add_column(Column::decimal("price").window(Window::new(8)))?
            .add_column(Column::date("stocked").window(Window::new(10)))
    };
    let values = vec![
        Some(Value::from("granny smith")),
        Some(Value::Decimal(Decimal::new(199, 2))),
        Some(Value::Date(date!(2023 - 11 - 05))),
    ];
    let mut out = Vec::new();
    let mut writer = FixedWidthWriterBuilder::new()
        .schema(schema()?)
        .from_writer(&mut out)?;
    writer.write(&values)?;
    drop(writer);

    let text = String::from_utf8(out)?;
    assert_eq!(text.len(), 12 + 8 + 10 + 1);

    let mut reader = FixedWidthReaderBuilder::new()
        .schema(schema()?)
        .from_str(&text)?;
    assert!(reader.read()?);
    assert_eq!(reader.get_values()?, values);
    Ok(())
}

#[test]
fn embedded_line_endings_round_trip_inside_quotes() -> Result<(), Box<dyn Error>> {
    let schema = || -> Result<Schema, FlatFileError> {
        Schema::new()
            .add_column(Column::string("note"))?
            .add_column(Column::int32("n"))
    };
    let values = vec![Some(Value::from("line one\nline two")), Some(Value::Int(9))];
    let mut out = Vec::new();
    let mut writer = DelimitedWriterBuilder::new()
        .schema(schema()?)
        .from_writer(&mut out)?;
    writer.write(&values)?;
    drop(writer);

    let mut reader = DelimitedReaderBuilder::new()
        .schema(schema()?)
        .from_str(&String::from_utf8(out)?)?;
    assert!(reader.read()?);
    assert_eq!(reader.get_values()?, values);
    assert!(!reader.read()?);
    Ok(())
}
