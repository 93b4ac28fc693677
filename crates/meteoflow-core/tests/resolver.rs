use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use meteoflow_core::config::{
    CorrectionKind, CorrectionWindow, DeriveSpec, FiletypeDescriptor, FrequencySpec, UnitMapper,
    VarEntry, NOT_DEFINED,
};
use meteoflow_core::derive::SdpCalibration;
use meteoflow_core::resolver::{resolve_table, Coefficient, PositionIndex};
use meteoflow_parser::{CellValue, ColumnId, NormalizedTable, ReadDirectives, TimestampSpec};

fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn var(raw: &str, field: Option<&str>, measurement: &str) -> VarEntry {
    VarEntry {
        raw: raw.to_string(),
        field: field.map(str::to_string),
        measurement: measurement.to_string(),
        units: None,
        gain: 1.0,
        offset: 0.0,
        correction: None,
        derive: None,
    }
}

fn descriptor(id: &str, variables: Vec<VarEntry>) -> FiletypeDescriptor {
    FiletypeDescriptor {
        id: id.to_string(),
        patterns: vec!["*".to_string()],
        date_formats: vec!["mtime".to_string()],
        valid_from: ts(2023, 1, 1),
        valid_to: ts(2023, 12, 31),
        data_version: "raw".to_string(),
        required_ancestor: None,
        scanner_enabled: true,
        raw_frequency: FrequencySpec::One("10min".to_string()),
        read: ReadDirectives::default(),
        timestamp: TimestampSpec::Single {
            column: "TIMESTAMP".to_string(),
            format: "%Y-%m-%d %H:%M:%S".to_string(),
        },
        position_indices: true,
        locations: Vec::new(),
        record_groups: None,
        variables,
        variables2: Vec::new(),
    }
}

fn table(columns: Vec<(&str, &str)>, index: Vec<NaiveDateTime>, rows: Vec<Vec<f64>>) -> NormalizedTable {
    NormalizedTable {
        columns: columns
            .into_iter()
            .map(|(name, units)| ColumnId::new(name, units))
            .collect(),
        index,
        rows: rows
            .into_iter()
            .map(|row| row.into_iter().map(CellValue::Float).collect())
            .collect(),
        group: None,
    }
}

fn unit_mapper() -> UnitMapper {
    let mut units = BTreeMap::new();
    units.insert("mV".to_string(), "degC".to_string());
    units.insert("%".to_string(), "%".to_string());
    UnitMapper::new(units)
}

fn index_of(count: usize) -> Vec<NaiveDateTime> {
    (0..count)
        .map(|i| ts(2023, 6, 1) + Duration::minutes(10 * i as i64))
        .collect()
}

#[test]
fn exact_match_resolves_field_units_gain_and_positions() {
    let mut entry = var("TA_raw", Some("TA_1_1_1"), "TA");
    entry.gain = 0.1;
    let descriptor = descriptor("DAV10-RAW-TBL1-10MIN-202301", vec![entry]);

    let table = table(
        vec![("TA_raw", "mV")],
        index_of(3),
        vec![vec![10.0], vec![11.0], vec![12.0]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-dav").expect("resolve");

    assert!(outcome.unadmitted.is_empty());
    assert_eq!(outcome.series.len(), 1);
    let series = &outcome.series[0];
    let variable = &series.variable;

    assert_eq!(variable.field, "TA_1_1_1");
    assert!(variable.admitted);
    assert_eq!(variable.measurement, "TA");
    assert_eq!(variable.units, "degC");
    assert_eq!(variable.gain, Coefficient::Constant(0.1));
    assert_eq!(variable.hpos, PositionIndex::Given("1".to_string()));
    assert_eq!(variable.vpos, PositionIndex::Given("1".to_string()));
    assert_eq!(variable.repl, PositionIndex::Given("1".to_string()));
    assert_eq!(variable.provenance.raw_name, "TA_raw");
    assert_eq!(variable.provenance.raw_units, "mV");
}

#[test]
fn unconfigured_column_is_unadmitted_not_dropped() {
    let descriptor = descriptor(
        "DAV10-RAW-TBL1-10MIN-202301",
        vec![var("TA_raw", Some("TA_1_1_1"), "TA")],
    );
    let table = table(
        vec![("TA_raw", "mV"), ("MYSTERY", "-not-given-")],
        index_of(2),
        vec![vec![1.0, 5.0], vec![2.0, 6.0]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-dav").expect("resolve");

    assert_eq!(outcome.series.len(), 1);
    assert_eq!(outcome.unadmitted.len(), 1);
    assert_eq!(outcome.unadmitted[0].name, "MYSTERY");
}

#[test]
fn unknown_units_resolve_to_the_not_defined_sentinel() {
    let descriptor = descriptor(
        "DAV10-RAW-TBL1-10MIN-202301",
        vec![var("TA_raw", Some("TA_1_1_1"), "TA")],
    );
    let table = table(
        vec![("TA_raw", "furlongs")],
        index_of(2),
        vec![vec![1.0], vec![2.0]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-dav").expect("resolve");
    assert_eq!(outcome.series[0].variable.units, NOT_DEFINED);
}

#[test]
fn prefix_match_applies_only_to_sequential_formats() {
    let entry = var("CO2", None, "CO2");

    let sequential = descriptor("DAV17-RAW-SEQ-PRF-1MIN-202301", vec![entry.clone()]);
    let regular = descriptor("DAV10-RAW-TBL1-10MIN-202301", vec![entry]);

    let data = table(
        vec![("CO2_PRF_T1_35_1", "-not-given-")],
        index_of(2),
        vec![vec![410.0], vec![411.0]],
    );

    let seq_outcome =
        resolve_table(&data, &sequential, 0, &unit_mapper(), "ch-dav").expect("resolve");
    assert_eq!(seq_outcome.series.len(), 1);
    let variable = &seq_outcome.series[0].variable;
    // generated sequential names are kept as the canonical field
    assert_eq!(variable.field, "CO2_PRF_T1_35_1");
    assert_eq!(variable.provenance.raw_name, "CO2");
    assert_eq!(variable.hpos, PositionIndex::Given("T1".to_string()));
    assert_eq!(variable.vpos, PositionIndex::Given("35".to_string()));

    let reg_outcome =
        resolve_table(&data, &regular, 0, &unit_mapper(), "ch-dav").expect("resolve");
    assert!(reg_outcome.series.is_empty());
    assert_eq!(reg_outcome.unadmitted.len(), 1);
}

#[test]
fn short_field_names_leave_position_indices_not_given() {
    let descriptor = descriptor(
        "DAV10-RAW-TBL1-10MIN-202301",
        vec![var("PREC", None, "PREC")],
    );
    let table = table(
        vec![("PREC", "mm")],
        index_of(2),
        vec![vec![0.0], vec![0.2]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-dav").expect("resolve");
    let variable = &outcome.series[0].variable;
    assert_eq!(variable.hpos, PositionIndex::NotGiven);
    assert_eq!(variable.vpos, PositionIndex::NotGiven);
    assert_eq!(variable.repl, PositionIndex::NotGiven);
}

#[test]
fn gain_window_outside_file_range_materializes_to_configured_gain() {
    let mut entry = var("TA_raw", Some("TA_1_1_1"), "TA");
    entry.gain = 0.1;
    entry.correction = Some(CorrectionWindow {
        kind: CorrectionKind::Gain,
        from: ts(2024, 1, 1),
        to: ts(2024, 6, 1),
        value: 0.5,
    });
    let descriptor = descriptor("DAV10-RAW-TBL1-10MIN-202301", vec![entry]);

    let table = table(
        vec![("TA_raw", "mV")],
        index_of(4),
        vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-dav").expect("resolve");
    let gain = &outcome.series[0].variable.gain;

    // declared window forces a per-timestamp series even without overlap
    match gain {
        Coefficient::PerTimestamp(values) => {
            assert_eq!(values.len(), 4);
            assert!(values.iter().all(|v| (*v - 0.1).abs() < f64::EPSILON));
        }
        other => panic!("expected materialized gain series, got {other:?}"),
    }
}

#[test]
fn gain_window_replaces_gain_inside_the_window_only() {
    let mut entry = var("TA_raw", Some("TA_1_1_1"), "TA");
    entry.gain = 0.1;
    entry.correction = Some(CorrectionWindow {
        kind: CorrectionKind::Gain,
        from: ts(2023, 6, 1),
        to: ts(2023, 6, 1) + Duration::minutes(15),
        value: 0.5,
    });
    let descriptor = descriptor("DAV10-RAW-TBL1-10MIN-202301", vec![entry]);

    let table = table(
        vec![("TA_raw", "mV")],
        index_of(4),
        vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-dav").expect("resolve");
    match &outcome.series[0].variable.gain {
        Coefficient::PerTimestamp(values) => {
            assert_eq!(values, &vec![0.5, 0.5, 0.1, 0.1]);
        }
        other => panic!("expected materialized gain series, got {other:?}"),
    }
}

#[test]
fn derived_function_inputs_are_consumed_once() {
    let mut o2 = var("O2_raw", Some("O2_GF5_0.2_1"), "O2");
    o2.derive = Some(DeriveSpec {
        func: "correct_o2".to_string(),
        inputs: vec!["TO2_raw".to_string()],
        field: None,
        measurement: None,
        units: None,
    });
    let to2 = var("TO2_raw", Some("TO2_GF5_0.2_1"), "TO2");
    let descriptor = descriptor("CHA20-RAW-10MIN-202301", vec![o2, to2]);

    let table = table(
        vec![("O2_raw", "%"), ("TO2_raw", "degC")],
        index_of(2),
        vec![vec![20.0, 10.0], vec![21.0, 12.0]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-cha").expect("resolve");

    let fields: Vec<&str> = outcome
        .series
        .iter()
        .map(|s| s.variable.field.as_str())
        .collect();
    // primary O2 resolves, the derived O2C is added, TO2 is consumed
    assert_eq!(fields, vec!["O2_GF5_0.2_1", "O2C_GF5_0.2_1"]);

    let derived = &outcome.series[1];
    assert_eq!(
        derived.variable.provenance.derived_from.as_deref(),
        Some("correct_o2(TO2_raw)")
    );
    let expected = 20.0 + 1.975044 - 0.1037942 * 10.0;
    assert!((derived.values[0].unwrap() - expected).abs() < 1e-9);
}

#[test]
fn lwin_derivation_applies_stefan_boltzmann_correction() {
    let mut lwin = var("LW_IN_RAW_AVG_T1_2_1", None, "LW");
    lwin.derive = Some(DeriveSpec {
        func: "calc_lwin".to_string(),
        inputs: vec!["T_RAD_AVG_T1_2_1".to_string()],
        field: None,
        measurement: None,
        units: None,
    });
    let trad = var("T_RAD_AVG_T1_2_1", None, "T_RAD");
    let descriptor = descriptor("DAV10-RAW-TBL1-10MIN-202301", vec![lwin, trad]);

    let table = table(
        vec![("LW_IN_RAW_AVG_T1_2_1", "W m-2"), ("T_RAD_AVG_T1_2_1", "degC")],
        index_of(1),
        vec![vec![0.0, 0.0]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-dav").expect("resolve");
    let derived = outcome
        .series
        .iter()
        .find(|s| s.variable.field == "LW_IN_AVG_T1_2_1")
        .expect("derived LW_IN series");

    // 5.67037e-8 * 273.15^4 with zero raw signal
    let expected = 5.67037e-8_f64 * 273.15_f64.powi(4);
    assert!((derived.values[0].unwrap() - expected).abs() < 1e-6);
    assert_eq!(derived.variable.units, "W m-2");
}

#[test]
fn swc_derivation_uses_site_and_depth_calibration() {
    let mut sdp = var("Theta_1", Some("SDP_GF1_0.05_1"), "SDP");
    sdp.derive = Some(DeriveSpec {
        func: "calc_swc_from_sdp".to_string(),
        inputs: Vec::new(),
        field: None,
        measurement: None,
        units: None,
    });
    let descriptor = descriptor("CHA30-RAW-10MIN-202301", vec![sdp]);

    let table = table(
        vec![("Theta_1", "mV")],
        index_of(1),
        vec![vec![900.0]],
    );

    let outcome =
        resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-cha").expect("resolve");
    let derived = outcome
        .series
        .iter()
        .find(|s| s.variable.field == "SWC_GF1_0.05_1")
        .expect("derived SWC series");

    let calibration = SdpCalibration::for_site("ch-cha", 0.05).expect("calibration");
    let expected = calibration.swc_from_millivolts(900.0);
    assert!((derived.values[0].unwrap() - expected).abs() < 1e-9);
    assert_eq!(derived.variable.measurement, "SWC");
}

#[test]
fn depth_brackets_select_distinct_calibrations() {
    let shallow = SdpCalibration::for_site("ch-cha", 0.05).expect("shallow");
    let deep = SdpCalibration::for_site("ch-cha", 0.5).expect("deep");
    assert!((shallow.l - 0.950).abs() < f64::EPSILON);
    assert!((deep.l - 0.910).abs() < f64::EPSILON);

    let fru_mid = SdpCalibration::for_site("CH-FRU", 0.15).expect("fru mid bracket");
    assert!((fru_mid.l - 0.47).abs() < f64::EPSILON);

    assert!(SdpCalibration::for_site("ch-fru", 2.0).is_none());
    assert!(SdpCalibration::for_site("xx-site", 0.05).is_none());
}

#[test]
fn unknown_derived_function_is_a_configuration_error() {
    let mut entry = var("X_raw", None, "X");
    entry.derive = Some(DeriveSpec {
        func: "calc_unobtainium".to_string(),
        inputs: Vec::new(),
        field: None,
        measurement: None,
        units: None,
    });
    let descriptor = descriptor("DAV10-RAW-TBL1-10MIN-202301", vec![entry]);
    let table = table(vec![("X_raw", "-")], index_of(1), vec![vec![1.0]]);

    let result = resolve_table(&table, &descriptor, 0, &unit_mapper(), "ch-dav");
    assert!(result.is_err());
}
