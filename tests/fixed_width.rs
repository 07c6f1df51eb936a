use std::error::Error;

use flatrec::{
    Alignment, Column, FixedWidthReaderBuilder, FixedWidthWriterBuilder, FlatFileError,
    PartialRecordPolicy, RecordErrorAction, Schema, SchemaSelector, Truncation, Value, Window,
};
use time::macros::date;

fn person_schema() -> Result<Schema, FlatFileError> {
    Schema::new()
        .add_column(Column::string("first_name").window(Window::new(10)))?
        .add_column(Column::string("last_name").window(Window::new(10)))?
        .add_column(
            Column::date("birth_date")
                .with_format("[year][month][day]")?
                .window(Window::new(8)),
        )?
        .add_column(Column::int32("weight").window(Window::new(5)))
}

#[test]
fn parses_windowed_records() -> Result<(), Box<dyn Error>> {
    // 33 window characters padded out to 40.
    let data = "bob       smith     20120123  185       \n";
    let mut reader = FixedWidthReaderBuilder::new()
        .schema(person_schema()?)
        .from_str(data)?;
    assert!(reader.read()?);
    assert_eq!(
        reader.get_values()?,
        vec![
            Some(Value::from("bob")),
            Some(Value::from("smith")),
            Some(Value::Date(date!(2012 - 01 - 23))),
            Some(Value::Int(185)),
        ]
    );
    assert!(!reader.read()?);
    Ok(())
}

#[test]
fn records_without_a_separator_split_by_total_width() -> Result<(), Box<dyn Error>> {
    let schema = Schema::new()
        .add_column(Column::string("a").window(Window::new(3)))?
        .add_column(Column::int32("n").window(Window::new(2)))?;
    let mut reader = FixedWidthReaderBuilder::new()
        .schema(schema)
        .has_record_separator(false)
        .from_str("ab 12cd 34")?;
    assert!(reader.read()?);
    assert_eq!(
        reader.get_values()?,
        vec![Some(Value::from("ab")), Some(Value::Int(12))]
    );
    assert!(reader.read()?);
    assert_eq!(
        reader.get_values()?,
        vec![Some(Value::from("cd")), Some(Value::Int(34))]
    );
    assert!(!reader.read()?);
    Ok(())
}

#[test]
fn short_records_fill_with_nulls_by_default() -> Result<(), Box<dyn Error>> {
    let data = "bob       smith     20120123\n";
    let mut reader = FixedWidthReaderBuilder::new()
        .schema(person_schema()?)
        .from_str(data)?;
    assert!(reader.read()?);
    assert_eq!(reader.get_values()?[3], None);
    Ok(())
}

#[test]
fn short_records_can_be_a_syntax_error() -> Result<(), Box<dyn Error>> {
    let data = "bob       smith     20120123\n";
    let mut reader = FixedWidthReaderBuilder::new()
        .schema(person_schema()?)
        .partial_record_policy(PartialRecordPolicy::Error)
        .from_str(data)?;
    let err = reader.read().unwrap_err();
    assert!(matches!(err, FlatFileError::Syntax { record: 1, .. }));
    Ok(())
}

#[test]
fn written_records_occupy_the_window_total_exactly() -> Result<(), Box<dyn Error>> {
    let mut out = Vec::new();
    let mut writer = FixedWidthWriterBuilder::new()
        .schema(person_schema()?)
        .from_writer(&mut out)?;
    writer.write(&[
        Some(Value::from("bob")),
        Some(Value::from("smith")),
        Some(Value::Date(date!(2012 - 01 - 23))),
        Some(Value::Int(185)),
    ])?;
    drop(writer);
    let written = String::from_utf8(out)?;
    assert_eq!(written, "bob       smith     20120123185  \n");
    assert_eq!(written.len(), 33 + 1);
    Ok(())
}

#[test]
fn separator_free_writing_emits_bare_windows() -> Result<(), Box<dyn Error>> {
    let schema = Schema::new().add_column(Column::string("a").window(Window::new(4)))?;
    let mut out = Vec::new();
    let mut writer = FixedWidthWriterBuilder::new()
        .schema(schema)
        .has_record_separator(false)
        .from_writer(&mut out)?;
    writer.write(&[Some(Value::from("ab"))])?;
    writer.write(&[Some(Value::from("cd"))])?;
    drop(writer);
    assert_eq!(String::from_utf8(out)?, "ab  cd  ");
    Ok(())
}

#[test]
fn alignment_and_fill_round_trip() -> Result<(), Box<dyn Error>> {
    let schema = || -> Result<Schema, FlatFileError> {
        Schema::new()
            .add_column(Column::string("label").window(Window::new(6)))?
            .add_column(Column::int32("amount").window(
                Window::new(5).align(Alignment::RightAligned).fill('0'),
            ))
    };
    let mut out = Vec::new();
    let mut writer = FixedWidthWriterBuilder::new()
        .schema(schema()?)
        .from_writer(&mut out)?;
    writer.write(&[Some(Value::from("taxes")), Some(Value::Int(42))])?;
    drop(writer);
    let written = String::from_utf8(out)?;
    assert_eq!(written, "taxes 00042\n");

    let mut reader = FixedWidthReaderBuilder::new()
        .schema(schema()?)
        .from_str(&written)?;
    assert!(reader.read()?);
    assert_eq!(
        reader.get_values()?,
        vec![Some(Value::from("taxes")), Some(Value::Int(42))]
    );
    Ok(())
}

#[test]
fn truncation_policy_picks_which_end_survives() -> Result<(), Box<dyn Error>> {
    let keep_head = Schema::new().add_column(
        Column::string("a").window(Window::new(3).truncate(Truncation::TruncateTrailing)),
    )?;
    let mut out = Vec::new();
    let mut writer = FixedWidthWriterBuilder::new()
        .schema(keep_head)
        .from_writer(&mut out)?;
    writer.write(&[Some(Value::from("abcdef"))])?;
    drop(writer);
    assert_eq!(String::from_utf8(out)?, "abc\n");

    let keep_tail = Schema::new().add_column(
        Column::string("a").window(Window::new(3).truncate(Truncation::TruncateLeading)),
    )?;
    let mut out = Vec::new();
    let mut writer = FixedWidthWriterBuilder::new()
        .schema(keep_tail)
        .from_writer(&mut out)?;
    writer.write(&[Some(Value::from("abcdef"))])?;
    drop(writer);
    assert_eq!(String::from_utf8(out)?, "def\n");
    Ok(())
}

#[test]
fn selector_probes_the_raw_record_text() -> Result<(), Box<dyn Error>> {
    let header_line = Schema::new()
        .add_column(Column::string("tag").window(Window::new(1)))?
        .add_column(Column::string("batch").window(Window::new(8)))?;
    let detail_line = Schema::new()
        .add_column(Column::string("tag").window(Window::new(1)))?
        .add_column(Column::string("sku").window(Window::new(5)))?
        .add_column(Column::int32("count").window(Window::new(3)))?;
    let selector: SchemaSelector<str> = SchemaSelector::new()
        .when(|line: &str| line.starts_with('H'), header_line)
        .when(|line: &str| line.starts_with('D'), detail_line);

    let mut reader = FixedWidthReaderBuilder::new()
        .selector(selector)
        .from_str("HBATCH-07 \nDSKU01 12\n")?;
    assert!(reader.read()?);
    assert_eq!(reader.get_values()?.len(), 2);
    assert!(reader.read()?);
    assert_eq!(
        reader.get_values()?,
        vec![
            Some(Value::from("D")),
            Some(Value::from("SKU01")),
            Some(Value::Int(12)),
        ]
    );
    Ok(())
}

#[test]
fn selector_without_separator_is_rejected() -> Result<(), Box<dyn Error>> {
    let schema = Schema::new().add_column(Column::string("a").window(Window::new(4)))?;
    let selector: SchemaSelector<str> = SchemaSelector::new().when(|_: &str| true, schema);
    let result = FixedWidthReaderBuilder::new()
        .selector(selector)
        .has_record_separator(false)
        .from_str("abcd");
    assert!(matches!(result, Err(FlatFileError::InvalidOptions(_))));
    Ok(())
}

#[test]
fn missing_window_fails_at_build_time() -> Result<(), Box<dyn Error>> {
    let schema = Schema::new()
        .add_column(Column::string("a").window(Window::new(4)))?
        .add_column(Column::string("b"))?;
    let result = FixedWidthReaderBuilder::new().schema(schema).from_str("x");
    assert!(matches!(result, Err(FlatFileError::MissingWindow(name)) if name == "b"));
    Ok(())
}

#[test]
fn header_record_is_discarded() -> Result<(), Box<dyn Error>> {
    let data = "FIRST     LAST      BIRTHDATE WT \nbob       smith     20120123  185\n";
    let mut reader = FixedWidthReaderBuilder::new()
        .schema(person_schema()?)
        .has_headers(true)
        .from_str(data)?;
    assert!(reader.read()?);
    assert_eq!(reader.get_values()?[0], Some(Value::from("bob")));
    assert_eq!(reader.physical_record_number(), 2);
    assert_eq!(reader.logical_record_number(), 1);
    Ok(())
}

#[test]
fn write_schema_emits_padded_names() -> Result<(), Box<dyn Error>> {
    let schema = Schema::new()
        .add_column(Column::string("name").window(Window::new(6)))?
        .add_column(Column::int32("qty").window(Window::new(4)))?;
    let mut out = Vec::new();
    let mut writer = FixedWidthWriterBuilder::new()
        .schema(schema)
        .from_writer(&mut out)?;
    writer.write_schema()?;
    writer.write(&[Some(Value::from("apple")), Some(Value::Int(5))])?;
    drop(writer);
    assert_eq!(String::from_utf8(out)?, "name  qty \napple 5   \n");
    Ok(())
}

#[test]
fn record_errors_discard_and_keep_streaming() -> Result<(), Box<dyn Error>> {
    let schema = Schema::new()
        .add_column(Column::string("name").window(Window::new(4)))?
        .add_column(Column::int32("qty").window(Window::new(3)))?;
    let mut reader = FixedWidthReaderBuilder::new()
        .schema(schema)
        .from_str("bad xxx\ngood 12\n")?;
    reader.on_record_error(|event| {
        assert!(matches!(event.error, FlatFileError::ColumnConversion { .. }));
        RecordErrorAction::Discard
    });
    assert!(reader.read()?);
    assert_eq!(reader.get_values()?[1], Some(Value::Int(12)));
    assert_eq!(reader.physical_record_number(), 2);
    assert_eq!(reader.logical_record_number(), 1);
    Ok(())
}
