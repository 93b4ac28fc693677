use chrono::{NaiveDate, NaiveDateTime};

use meteoflow_core::config::{FiletypeDescriptor, FrequencySpec, VarEntry};
use meteoflow_core::PipelineError;
use meteoflow_parser::{ReadDirectives, RecordGroupSpec, RecordGroups, TimestampSpec};

fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn var(raw: &str) -> VarEntry {
    VarEntry {
        raw: raw.to_string(),
        field: None,
        measurement: "META".to_string(),
        units: None,
        gain: 1.0,
        offset: 0.0,
        correction: None,
        derive: None,
    }
}

fn descriptor(id: &str) -> FiletypeDescriptor {
    FiletypeDescriptor {
        id: id.to_string(),
        patterns: vec!["*.dat".to_string()],
        date_formats: vec!["mtime".to_string()],
        valid_from: ts(2023, 1, 1),
        valid_to: ts(2023, 12, 31),
        data_version: "raw".to_string(),
        required_ancestor: None,
        scanner_enabled: true,
        raw_frequency: FrequencySpec::One("10min".to_string()),
        read: ReadDirectives::default(),
        timestamp: TimestampSpec::Ymdhm,
        position_indices: true,
        locations: Vec::new(),
        record_groups: None,
        variables: vec![var("A")],
        variables2: Vec::new(),
    }
}

fn assert_config_error(result: meteoflow_core::Result<()>) {
    match result {
        Err(PipelineError::Config { .. }) => {}
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn list_valued_frequency_outside_alternating_is_fatal() {
    let mut bad = descriptor("DAV10-RAW-TBL1-10MIN-202301");
    bad.raw_frequency =
        FrequencySpec::PerGroup(vec!["10min".to_string(), "30min".to_string()]);
    assert_config_error(bad.validate());
}

#[test]
fn second_variable_catalogue_outside_alternating_is_fatal() {
    let mut bad = descriptor("DAV10-RAW-TBL1-10MIN-202301");
    bad.variables2 = vec![var("B")];
    assert_config_error(bad.validate());
}

#[test]
fn alternating_descriptor_requires_record_groups_and_variables2() {
    let mut alternating = descriptor("CHA10-RAW-ALTERNATING-1MIN-202301");
    assert_config_error(alternating.validate());

    alternating.record_groups = Some(RecordGroups {
        column: 0,
        groups: vec![RecordGroupSpec::One(103), RecordGroupSpec::One(203)],
    });
    assert_config_error(alternating.validate());

    alternating.variables2 = vec![var("B")];
    alternating.raw_frequency =
        FrequencySpec::PerGroup(vec!["1min".to_string(), "10min".to_string()]);
    alternating.validate().expect("well-formed alternating descriptor");
}

#[test]
fn inverted_validity_window_is_fatal() {
    let mut bad = descriptor("DAV10-RAW-TBL1-10MIN-202301");
    bad.valid_from = ts(2024, 1, 1);
    assert_config_error(bad.validate());
}
