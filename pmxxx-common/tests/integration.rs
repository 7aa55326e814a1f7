//! Integration tests for the shared telemetry schema and configuration helpers.

use pmxxx_common::{FIELD_COUNT, Field, FieldValues, LogFormat, LoggingConfig, parse_config};
use serde::Deserialize;

#[test]
fn test_schema_wire_order() {
    let names: Vec<&str> = Field::ALL.iter().map(|f| f.as_str()).collect();

    assert_eq!(names.len(), FIELD_COUNT);
    assert_eq!(
        &names[..6],
        &["l1_volt", "l2_volt", "l3_volt", "l12_volt", "l23_volt", "l31_volt"]
    );
    assert_eq!(names[10], "frequency");
    assert_eq!(names[17], "pow_factor");
    assert_eq!(names[23], "demand_q");
    assert_eq!(names[FIELD_COUNT - 1], "thd_in");
}

#[test]
fn test_field_names_are_unique() {
    let mut names: Vec<&str> = Field::ALL.iter().map(|f| f.as_str()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), FIELD_COUNT);
}

#[test]
fn test_every_field_has_description() {
    for field in Field::ALL {
        assert!(!field.description().is_empty(), "{} has no description", field);
    }
}

#[test]
fn test_from_ordered_populates_every_field() {
    let mut raw = [0.0; FIELD_COUNT];
    for (i, slot) in raw.iter_mut().enumerate() {
        *slot = (i + 1) as f64;
    }

    let values = FieldValues::from_ordered(raw);

    assert_eq!(values.get(Field::L1Volt), Some(1.0));
    assert_eq!(values.get(Field::ThdIn), Some(FIELD_COUNT as f64));
    assert!(values.iter().all(|(_, v)| v.is_some()));
}

#[test]
fn test_independent_value_maps() {
    let mut a = FieldValues::new();
    let b = FieldValues::new();

    a.set(Field::TotP, Some(12.5));

    assert_eq!(a.get(Field::TotP), Some(12.5));
    assert_eq!(b.get(Field::TotP), None);
}

#[test]
fn test_logging_section_in_larger_config() {
    #[derive(Deserialize)]
    struct AppConfig {
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        name: String,
    }

    let config: AppConfig = parse_config(
        r#"{
            // comments are allowed in JSON5
            name: "meters",
            logging: { format: "json" },
        }"#,
    )
    .unwrap();

    assert_eq!(config.name, "meters");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Json);
}
