use super::*;

#[test]
fn parse_by_type() {
    assert_eq!(FieldValue::parse("", ValueType::Float), Ok(FieldValue::Empty));
    assert_eq!(FieldValue::parse("12.5", ValueType::Float), Ok(FieldValue::Float(12.5)));
    assert_eq!(FieldValue::parse("4", ValueType::Integer), Ok(FieldValue::Integer(4)));
    assert_eq!(FieldValue::parse("4.0", ValueType::Integer), Ok(FieldValue::Integer(4)));
    assert_eq!(FieldValue::parse("True", ValueType::Bool), Ok(FieldValue::Bool(true)));
    assert_eq!(FieldValue::parse("false", ValueType::Bool), Ok(FieldValue::Bool(false)));
    assert_eq!(
        FieldValue::parse("a, b,,c", ValueType::List),
        Ok(FieldValue::List(vec!["a".into(), "b".into(), "c".into()]))
    );
    assert!(FieldValue::parse("abc", ValueType::Integer).is_err());
    assert!(FieldValue::parse("maybe", ValueType::Bool).is_err());
}

#[test]
fn parse_dates() {
    let a = parse_datetime("2023-05-01 10:20:30").unwrap();
    let b = parse_datetime("2023-05-01T10:20:30.000Z").unwrap();
    assert_eq!(a, b);
    assert_eq!(
        parse_datetime("2023-05-01").unwrap().format(DATETIME_FORMAT).to_string(),
        "2023-05-01 00:00:00"
    );
    assert!(parse_datetime("yesterday").is_none());
}

#[test]
fn cell_text_form() {
    assert_eq!(FieldValue::Bool(true).to_cell(), "True");
    assert_eq!(FieldValue::Bool(false).to_cell(), "False");
    assert_eq!(FieldValue::Float(10.0).to_cell(), "10.0");
    assert_eq!(FieldValue::Float(9.99).to_cell(), "9.99");
    assert_eq!(FieldValue::Empty.to_cell(), "");
    assert_eq!(FieldValue::List(vec!["x".into(), "y".into()]).to_cell(), "x,y");
}

#[test]
fn coerce_goes_through_text() {
    assert_eq!(
        FieldValue::text("7").coerce(ValueType::Integer),
        Ok(FieldValue::Integer(7))
    );
    assert_eq!(
        FieldValue::Integer(3).coerce(ValueType::Float),
        Ok(FieldValue::Float(3.0))
    );
    assert_eq!(
        FieldValue::Bool(true).coerce(ValueType::Text),
        Ok(FieldValue::text("True"))
    );
}

#[test]
fn emptiness() {
    assert!(FieldValue::Empty.is_empty());
    assert!(FieldValue::text("  ").is_empty());
    assert!(FieldValue::List(vec![]).is_empty());
    assert!(!FieldValue::Bool(false).is_empty());
    assert!(!FieldValue::Float(0.0).is_empty());
}

#[test]
fn record_set_replaces_in_place() {
    let mut record = Record::new();
    record.set(field::ASSET_ID, "A1");
    record.set(field::PRICE, 3.5);
    record.set(field::ASSET_ID, "A2");
    assert_eq!(record.len(), 2);
    assert_eq!(record.asset_id(), Some("A2"));
    let names: Vec<&str> = record.field_names().collect();
    assert_eq!(names, vec![field::ASSET_ID, field::PRICE]);
}

#[test]
fn projection_and_schema_check() {
    let mut record = Record::new();
    record.set(field::TAGS, FieldValue::List(vec!["tag".into()]));
    record.set(field::ASSET_ID, "A1");

    let flat = record.project(BackendKind::FlatFile);
    assert_eq!(flat.len(), schema::field_count(BackendKind::FlatFile));
    assert!(!flat.contains(field::TAGS));
    assert!(flat.schema_check(BackendKind::FlatFile).is_ok());

    let err = record.schema_check(BackendKind::FlatFile).unwrap_err();
    assert_eq!(err.found, 2);
    assert_eq!(err.expected, schema::field_count(BackendKind::FlatFile));
}
