use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use polars::prelude::ParquetWriter;
use tracing::info;

use meteoflow_core::config::{FiletypeCatalogue, UnitMapper};
use meteoflow_core::discovery::{discover_files, DiscoveryOptions};
use meteoflow_core::matcher::classify;
use meteoflow_core::pipeline::{Pipeline, RunContext, RunResult};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Site identifier, e.g. ch-dav.
    #[arg(long)]
    pub site: String,

    /// Filegroup identifier, e.g. 10_meteo.
    #[arg(long)]
    pub filegroup: String,

    /// Root of the raw-data tree to scan.
    #[arg(long)]
    pub source_dir: PathBuf,

    /// Directory with filetype descriptor TOML files.
    #[arg(long)]
    pub config_dir: PathBuf,

    /// Unit-mapping TOML file.
    #[arg(long)]
    pub units_file: PathBuf,

    /// Stop after this many files (0 = no limit).
    #[arg(long, default_value_t = 0)]
    pub file_limit: usize,

    /// Keep only the N newest files by modification time (0 = keep all).
    #[arg(long, default_value_t = 0)]
    pub newest_files: usize,

    /// Write emitted series as parquet plus a JSON run summary here.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

pub fn run_scan(args: ScanArgs) -> Result<()> {
    let catalogue = FiletypeCatalogue::load_dir(&args.config_dir)
        .with_context(|| format!("loading descriptors from {}", args.config_dir.display()))?;
    let unit_mapper = UnitMapper::load_file(&args.units_file)
        .with_context(|| format!("loading unit map from {}", args.units_file.display()))?;

    info!(
        "loaded {} filetype descriptors for {} {}",
        catalogue.len(),
        args.site,
        args.filegroup
    );

    let options = DiscoveryOptions {
        file_limit: args.file_limit,
        newest_files: args.newest_files,
    };
    let found = discover_files(&args.source_dir, &options)
        .with_context(|| format!("scanning {}", args.source_dir.display()))?;

    let discovered: Vec<_> = found
        .into_iter()
        .map(|file| classify(file, &catalogue))
        .collect();

    let context = RunContext {
        site: args.site.clone(),
        filegroup: args.filegroup.clone(),
    };
    let pipeline = Pipeline::new(&catalogue, &unit_mapper, context);
    let mut result = pipeline.run(discovered);

    print_report(&result);

    if let Some(out_dir) = &args.out_dir {
        write_outputs(&mut result, out_dir)?;
    }

    Ok(())
}

fn print_report(result: &RunResult) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        "file", "filetype", "rows", "vars", "freq", "freq from", "notes",
    ]);

    for file in &result.summary.files {
        let rows: usize = file.tables.iter().map(|t| t.rows).sum();
        let vars: usize = file.tables.iter().map(|t| t.variables).sum();
        let freq = file
            .tables
            .iter()
            .map(|t| t.frequency.clone())
            .collect::<Vec<_>>()
            .join(" / ");
        let freqfrom = file
            .tables
            .iter()
            .map(|t| t.frequency_source.clone())
            .collect::<Vec<_>>()
            .join(" / ");
        let mut notes = Vec::new();
        if let Some(reason) = &file.degraded {
            notes.push(reason.clone());
        }
        if !file.unmatched_identifiers.is_empty() {
            notes.push(format!(
                "unmatched ids: {}",
                file.unmatched_identifiers.join(",")
            ));
        }
        if !file.unadmitted.is_empty() {
            notes.push(format!("not admitted: {}", file.unadmitted.join(",")));
        }
        table.add_row(vec![
            file.filename.clone(),
            file.descriptor_id.clone().unwrap_or_else(|| "-".to_string()),
            rows.to_string(),
            vars.to_string(),
            freq,
            freqfrom,
            notes.join("; "),
        ]);
    }
    println!("{table}");

    let summary = &result.summary;
    println!(
        "{} files ({} matched, {} unmatched, {} ignored), {} series emitted",
        summary.files_total,
        summary.files_matched,
        summary.files_unmatched,
        summary.files_ignored,
        summary.series_emitted
    );
    if !summary.unadmitted.is_empty() {
        println!("not admitted: {}", summary.unadmitted.join(", "));
    }
    for failure in &summary.descriptor_failures {
        println!(
            "descriptor {} failed on {}: {}",
            failure.descriptor_id, failure.filename, failure.message
        );
    }
}

fn write_outputs(result: &mut RunResult, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    for outcome in &mut result.outcomes {
        if outcome.series.is_empty() {
            continue;
        }
        let file_dir = out_dir.join(&outcome.summary.filename);
        std::fs::create_dir_all(&file_dir)?;
        for series in &mut outcome.series {
            let path = file_dir.join(format!("{}.parquet", series.tags.field));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(&mut series.data)
                .with_context(|| format!("writing {}", path.display()))?;
            let tags_path = file_dir.join(format!("{}.tags.json", series.tags.field));
            let tags_json = serde_json::to_string_pretty(&series.tags)?;
            std::fs::write(&tags_path, tags_json)?;
        }
    }

    let summary_path = out_dir.join("run_summary.json");
    let summary_json = serde_json::to_string_pretty(&result.summary)?;
    std::fs::write(&summary_path, summary_json)
        .with_context(|| format!("writing {}", summary_path.display()))?;
    info!("outputs written to {}", out_dir.display());
    Ok(())
}
