use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};

use meteoflow_core::config::{FiletypeCatalogue, UnitMapper};
use meteoflow_core::matcher::{classify, Assignment, FoundFile};
use meteoflow_core::pipeline::{Pipeline, RunContext};

fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn load_catalogue() -> FiletypeCatalogue {
    let config_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/config/filetypes");
    FiletypeCatalogue::load_dir(&config_dir).expect("catalogue loads")
}

fn load_units() -> UnitMapper {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/config/units.toml");
    UnitMapper::load_file(&path).expect("unit mapper loads")
}

fn found(name: &str) -> FoundFile {
    let path = fixture_path(name);
    let metadata = std::fs::metadata(&path).expect("fixture exists");
    FoundFile {
        filename: name.to_string(),
        path,
        size: metadata.len(),
        mtime: ts(2023, 6, 1, 12, 0),
    }
}

/// A file that only exists as a name; classification never touches disk.
fn phantom(name: &str) -> FoundFile {
    FoundFile {
        filename: name.to_string(),
        path: fixture_path(name),
        size: 0,
        mtime: ts(2023, 6, 1, 12, 0),
    }
}

fn context() -> RunContext {
    RunContext {
        site: "ch-dav".to_string(),
        filegroup: "10_meteo".to_string(),
    }
}

#[test]
fn catalogue_and_unit_mapper_load_from_toml() {
    let catalogue = load_catalogue();
    assert_eq!(catalogue.len(), 2);
    assert!(catalogue.get("DAV10-RAW-TBL1-10MIN-202301").is_some());
    assert!(catalogue.get("CHA10-RAW-ALTERNATING-10MIN-202302").is_some());

    let units = load_units();
    assert_eq!(units.resolve("mV", None), "degC");
}

#[test]
fn meteo_file_end_to_end() {
    let catalogue = load_catalogue();
    let units = load_units();
    let pipeline = Pipeline::new(&catalogue, &units, context());

    let discovered = classify(found("meteo20230101.dat"), &catalogue);
    assert!(matches!(
        discovered.assignment,
        Assignment::Matched { .. }
    ));

    let outcome = pipeline.process_file(&discovered).expect("processes");

    // TA and RH admitted, STRAY is not
    assert_eq!(outcome.series.len(), 2);
    assert_eq!(outcome.summary.unadmitted, vec!["STRAY_raw".to_string()]);

    let ta = outcome
        .series
        .iter()
        .find(|s| s.tags.field == "TA_1_1_1")
        .expect("TA series");
    assert!(ta.tags.admitted);
    assert_eq!(ta.tags.units, "degC");
    assert_eq!(ta.tags.raw_varname, "TA_raw");
    assert_eq!(ta.tags.raw_units, "mV");
    assert_eq!(ta.tags.hpos, "1");
    assert_eq!(ta.tags.vpos, "1");
    assert_eq!(ta.tags.repl, "1");
    assert_eq!(ta.tags.freq, "10min");
    assert_eq!(ta.tags.freqfrom, "full-range");
    assert_eq!(ta.tags.data_raw_freq, "10min");
    assert_eq!(ta.tags.site, "ch-dav");
    assert_eq!(ta.tags.filetype, "DAV10-RAW-TBL1-10MIN-202301");

    // gain 0.1 applied to the stored values
    let values = ta.data.column("value").unwrap().f64().unwrap();
    assert!((values.get(0).unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(ta.data.height(), 12);

    let table = &outcome.summary.tables[0];
    assert_eq!(table.rows, 12);
    assert_eq!(table.first_timestamp, Some(ts(2023, 1, 1, 0, 10)));
    assert_eq!(table.last_timestamp, Some(ts(2023, 1, 1, 2, 0)));
    assert_eq!(table.frequency, "10min");
}

#[test]
fn alternating_file_end_to_end_reports_stray_identifier() {
    let catalogue = load_catalogue();
    let units = load_units();
    let pipeline = Pipeline::new(&catalogue, &units, context());

    let discovered = classify(found("soilalt20230201.dat"), &catalogue);
    match &discovered.assignment {
        Assignment::Matched { descriptor_id, .. } => {
            assert_eq!(descriptor_id, "CHA10-RAW-ALTERNATING-10MIN-202302");
        }
        other => panic!("expected match, got {other:?}"),
    }

    let outcome = pipeline.process_file(&discovered).expect("processes");

    // the unexpected identifier is reported and excluded from both tables
    assert_eq!(outcome.summary.unmatched_identifiers, vec!["999".to_string()]);
    assert_eq!(outcome.summary.tables.len(), 2);
    let rows: Vec<usize> = outcome.summary.tables.iter().map(|t| t.rows).collect();
    assert_eq!(rows, vec![3, 3]);

    for series in &outcome.series {
        let values = series.data.column("value").unwrap().f64().unwrap();
        for idx in 0..values.len() {
            assert!((values.get(idx).unwrap() - 999.0).abs() > 1e-9);
        }
    }

    // each group resolves against its own catalogue
    assert!(outcome.series.iter().any(|s| s.tags.field == "TA_2_1_1"));
    assert!(outcome
        .series
        .iter()
        .any(|s| s.tags.field == "SWC_GF1_0.05_1"));

    // group two has too few rows for detection; declared interval applies
    let group2 = &outcome.summary.tables[1];
    assert_eq!(group2.group.as_deref(), Some("203"));
    assert_eq!(group2.frequency, "15min");
    assert_eq!(group2.frequency_source, "config");
}

#[test]
fn unmatched_file_degrades_to_empty_outcome() {
    let catalogue = load_catalogue();
    let units = load_units();
    let pipeline = Pipeline::new(&catalogue, &units, context());

    let discovered = classify(phantom("meteo20240101.dat"), &catalogue);
    assert_eq!(discovered.assignment, Assignment::Unmatched);

    let outcome = pipeline.process_file(&discovered).expect("processes");
    assert!(outcome.series.is_empty());
    assert_eq!(outcome.summary.series_emitted, 0);
}

#[test]
fn run_aggregates_summaries_across_files() {
    let catalogue = load_catalogue();
    let units = load_units();
    let pipeline = Pipeline::new(&catalogue, &units, context());

    let files = vec![
        classify(found("meteo20230101.dat"), &catalogue),
        classify(found("soilalt20230201.dat"), &catalogue),
        classify(phantom("meteo20240101.dat"), &catalogue),
    ];
    let result = pipeline.run(files);

    assert_eq!(result.summary.files_total, 3);
    assert_eq!(result.summary.files_matched, 2);
    assert_eq!(result.summary.files_unmatched, 1);
    assert!(result.summary.descriptor_failures.is_empty());
    assert!(result
        .summary
        .unadmitted
        .contains(&"DAV10-RAW-TBL1-10MIN-202301/STRAY_raw".to_string()));
    assert_eq!(
        result.summary.series_emitted,
        result.outcomes.iter().map(|o| o.series.len()).sum::<usize>()
    );
}
