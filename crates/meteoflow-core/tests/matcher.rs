use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};

use meteoflow_core::config::{FiletypeCatalogue, FiletypeDescriptor, FrequencySpec};
use meteoflow_core::matcher::{classify, Assignment, FoundFile};
use meteoflow_parser::{ReadDirectives, SpecialFormatTag, TimestampSpec};

fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn descriptor(id: &str, patterns: &[&str], date_formats: &[&str]) -> FiletypeDescriptor {
    FiletypeDescriptor {
        id: id.to_string(),
        patterns: patterns.iter().map(|s| s.to_string()).collect(),
        date_formats: date_formats.iter().map(|s| s.to_string()).collect(),
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
        variables: Vec::new(),
        variables2: Vec::new(),
    }
}

fn found(filename: &str, path: &str) -> FoundFile {
    FoundFile {
        filename: filename.to_string(),
        path: PathBuf::from(path),
        size: 1024,
        mtime: ts(2023, 6, 1),
    }
}

#[test]
fn classifies_by_pattern_date_and_validity_window() {
    let catalogue = FiletypeCatalogue::new(vec![descriptor(
        "DAV10-RAW-TBL1-10MIN-202301",
        &["meteo*.dat"],
        &["meteo%Y%m%d"],
    )]);

    let discovered = classify(
        found("meteo20230101.dat", "/data/meteo20230101.dat"),
        &catalogue,
    );

    match discovered.assignment {
        Assignment::Matched {
            descriptor_id,
            filedate,
            special_format,
        } => {
            assert_eq!(descriptor_id, "DAV10-RAW-TBL1-10MIN-202301");
            assert_eq!(filedate, ts(2023, 1, 1));
            assert_eq!(special_format, None);
        }
        other => panic!("expected match, got {other:?}"),
    }
}

#[test]
fn filename_date_parse_tolerates_trailing_suffix() {
    let catalogue = FiletypeCatalogue::new(vec![descriptor(
        "DAV11-RAW-10MIN-202301",
        &["Davos10Min-*.dat"],
        &["Davos10Min-%Y%m%d-"],
    )]);

    // trailing incrementing counter after the date is outside the parse
    // window and must not break the match
    let discovered = classify(
        found("Davos10Min-20230415-0042.dat", "/data/x.dat"),
        &catalogue,
    );
    match discovered.assignment {
        Assignment::Matched { filedate, .. } => assert_eq!(filedate, ts(2023, 4, 15)),
        other => panic!("expected match, got {other:?}"),
    }
}

#[test]
fn file_outside_validity_window_stays_unmatched() {
    let catalogue = FiletypeCatalogue::new(vec![descriptor(
        "DAV10-RAW-TBL1-10MIN-202301",
        &["meteo*.dat"],
        &["meteo%Y%m%d"],
    )]);

    let discovered = classify(
        found("meteo20240101.dat", "/data/meteo20240101.dat"),
        &catalogue,
    );
    assert_eq!(discovered.assignment, Assignment::Unmatched);
}

#[test]
fn date_strategies_fall_back_in_declared_order() {
    // filename carries no date; month/year folders provide it
    let catalogue = FiletypeCatalogue::new(vec![descriptor(
        "DAV20-RAW-30MIN-202301",
        &["fluxes_*.csv"],
        &["fluxes_%Y%m%d", "from_filepath"],
    )]);

    let discovered = classify(
        found("fluxes_site.csv", "/data/2023/07/fluxes_site.csv"),
        &catalogue,
    );
    match discovered.assignment {
        Assignment::Matched { filedate, .. } => assert_eq!(filedate, ts(2023, 7, 1)),
        other => panic!("expected folder-derived date, got {other:?}"),
    }
}

#[test]
fn mtime_strategy_applies_when_declared() {
    let catalogue = FiletypeCatalogue::new(vec![descriptor(
        "DAV30-RAW-NODATE-202301",
        &["eddy_full_output*.csv"],
        &["mtime"],
    )]);

    let discovered = classify(
        found("eddy_full_output.csv", "/data/eddy_full_output.csv"),
        &catalogue,
    );
    match discovered.assignment {
        Assignment::Matched { filedate, .. } => assert_eq!(filedate, ts(2023, 6, 1)),
        other => panic!("expected mtime-derived date, got {other:?}"),
    }
}

#[test]
fn first_matching_descriptor_wins_in_catalogue_order() {
    // both descriptors match; catalogue order (sorted by id) decides
    let catalogue = FiletypeCatalogue::new(vec![
        descriptor("B-METEO-10MIN-202301", &["meteo*.dat"], &["meteo%Y%m%d"]),
        descriptor("A-METEO-10MIN-202301", &["meteo*.dat"], &["meteo%Y%m%d"]),
    ]);

    let discovered = classify(
        found("meteo20230601.dat", "/data/meteo20230601.dat"),
        &catalogue,
    );
    match discovered.assignment {
        Assignment::Matched { descriptor_id, .. } => {
            assert_eq!(descriptor_id, "A-METEO-10MIN-202301");
        }
        other => panic!("expected match, got {other:?}"),
    }
}

#[test]
fn required_ancestor_gates_the_match() {
    let mut level0 = descriptor(
        "DAV20-LEVEL0-30MIN-202301",
        &["fluxes_*.csv"],
        &["fluxes_%Y%m%d"],
    );
    level0.required_ancestor = Some("Level-0".to_string());
    level0.data_version = "Level-0".to_string();
    let catalogue = FiletypeCatalogue::new(vec![level0]);

    let outside = classify(
        found("fluxes_20230601.csv", "/data/fluxes_20230601.csv"),
        &catalogue,
    );
    assert_eq!(outside.assignment, Assignment::Unmatched);

    let inside = classify(
        found(
            "fluxes_20230601.csv",
            "/data/Level-0/fluxes_20230601.csv",
        ),
        &catalogue,
    );
    assert!(matches!(inside.assignment, Assignment::Matched { .. }));
}

#[test]
fn disabled_descriptor_yields_ignored_not_unmatched() {
    let mut disabled = descriptor(
        "DAV40-RAW-10MIN-202301",
        &["meteo*.dat"],
        &["meteo%Y%m%d"],
    );
    disabled.scanner_enabled = false;
    let catalogue = FiletypeCatalogue::new(vec![disabled]);

    let discovered = classify(
        found("meteo20230601.dat", "/data/meteo20230601.dat"),
        &catalogue,
    );
    assert_eq!(
        discovered.assignment,
        Assignment::Ignored {
            descriptor_id: "DAV40-RAW-10MIN-202301".to_string()
        }
    );
}

#[test]
fn special_format_tag_comes_from_descriptor_id() {
    let catalogue = FiletypeCatalogue::new(vec![descriptor(
        "DAV17-RAW-SEQ-PRF-1MIN-202301",
        &["profile*.dat"],
        &["profile%Y%m%d"],
    )]);

    let discovered = classify(
        found("profile20230601.dat", "/data/profile20230601.dat"),
        &catalogue,
    );
    match discovered.assignment {
        Assignment::Matched { special_format, .. } => {
            assert_eq!(special_format, Some(SpecialFormatTag::Sequential));
        }
        other => panic!("expected match, got {other:?}"),
    }
}
