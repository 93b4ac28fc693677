use tracing::{info, warn};

use meteoflow_parser::clean;
use meteoflow_parser::special::{
    restructure_alternating, restructure_sequential, SpecialFormatOutcome,
};
use meteoflow_parser::timestamp::build_timestamp;
use meteoflow_parser::{FiletypeReader, NormalizedTable, SpecialFormatTag};

use crate::config::{FiletypeCatalogue, FiletypeDescriptor, UnitMapper, NOT_DEFINED};
use crate::error::{PipelineError, Result};
use crate::frequency::{self, FrequencyEstimate};
use crate::matcher::{Assignment, DiscoveredFile};
use crate::output::{emit_series, SeriesTags, TaggedSeries};
use crate::resolver::{self, ResolvedSeries};
use crate::summary::{DescriptorFailure, FileSummary, RunSummary, TableSummary};

/// Identity of one pipeline invocation; the surrounding system may run
/// several invocations for distinct site/filegroup combinations in
/// separate processes, each with its own configuration snapshot.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub site: String,
    pub filegroup: String,
}

/// Everything produced for one file. A malformed file degrades to an empty
/// outcome with the reason recorded, it never aborts the run.
#[derive(Debug)]
pub struct FileOutcome {
    pub series: Vec<TaggedSeries>,
    pub summary: FileSummary,
}

#[derive(Debug)]
pub struct RunResult {
    pub outcomes: Vec<FileOutcome>,
    pub summary: RunSummary,
}

/// Drives files through matching, reading, normalization, cleaning,
/// frequency detection, variable resolution and record emission, in that
/// order.
pub struct Pipeline<'a> {
    catalogue: &'a FiletypeCatalogue,
    unit_mapper: &'a UnitMapper,
    context: RunContext,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        catalogue: &'a FiletypeCatalogue,
        unit_mapper: &'a UnitMapper,
        context: RunContext,
    ) -> Self {
        Self {
            catalogue,
            unit_mapper,
            context,
        }
    }

    /// Processes a whole classified file list. Configuration errors abort
    /// the affected descriptor's file and are recorded; other files
    /// continue.
    pub fn run(&self, files: Vec<DiscoveredFile>) -> RunResult {
        let mut outcomes = Vec::with_capacity(files.len());
        let mut summary = RunSummary::default();
        summary.files_total = files.len();

        for discovered in files {
            match &discovered.assignment {
                Assignment::Unmatched => summary.files_unmatched += 1,
                Assignment::Ignored { .. } => summary.files_ignored += 1,
                Assignment::Matched { .. } => summary.files_matched += 1,
            }

            match self.process_file(&discovered) {
                Ok(outcome) => {
                    summary.series_emitted += outcome.series.len();
                    if let Some(descriptor_id) = &outcome.summary.descriptor_id {
                        for raw in &outcome.summary.unadmitted {
                            summary.record_unadmitted(descriptor_id, raw);
                        }
                    }
                    summary.files.push(outcome.summary.clone());
                    outcomes.push(outcome);
                }
                Err(err) => {
                    warn!(file = %discovered.file.filename, "descriptor aborted: {err}");
                    summary.descriptor_failures.push(DescriptorFailure {
                        descriptor_id: match &discovered.assignment {
                            Assignment::Matched { descriptor_id, .. }
                            | Assignment::Ignored { descriptor_id } => descriptor_id.clone(),
                            Assignment::Unmatched => NOT_DEFINED.to_string(),
                        },
                        filename: discovered.file.filename.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        RunResult { outcomes, summary }
    }

    /// Runs one file through the pipeline. `Err` is reserved for
    /// configuration authoring bugs; data problems degrade to an empty
    /// outcome with the reason in the summary.
    pub fn process_file(&self, discovered: &DiscoveredFile) -> Result<FileOutcome> {
        let filename = &discovered.file.filename;

        let (descriptor_id, special_format) = match &discovered.assignment {
            Assignment::Matched {
                descriptor_id,
                special_format,
                ..
            } => (descriptor_id, *special_format),
            Assignment::Unmatched => {
                info!(file = %filename, "no filetype matched");
                return Ok(empty_outcome(filename, None));
            }
            Assignment::Ignored { descriptor_id } => {
                info!(file = %filename, filetype = %descriptor_id, "filetype is ignored");
                return Ok(empty_outcome(filename, None));
            }
        };

        let descriptor =
            self.catalogue
                .get(descriptor_id)
                .ok_or_else(|| PipelineError::Config {
                    descriptor: descriptor_id.clone(),
                    message: "descriptor disappeared from catalogue".to_string(),
                })?;
        descriptor.validate()?;

        info!(file = %filename, filetype = %descriptor.id, "scanning file");

        let catalogue_names = FiletypeDescriptor::raw_names(&descriptor.variables);
        let reader = FiletypeReader::new(&descriptor.read, &catalogue_names);
        let read = match reader.read_path(&discovered.file.path) {
            Ok(read) => read,
            Err(err) => {
                warn!(file = %filename, "read failed: {err}");
                return Ok(described_empty(filename, descriptor, err.to_string()));
            }
        };
        for attempt in &read.attempts {
            warn!(file = %filename, "read attempt failed: {attempt}");
        }
        if read.table.is_empty() {
            return Ok(described_empty(
                filename,
                descriptor,
                "file contributed zero rows".to_string(),
            ));
        }

        let normalized = match build_timestamp(read.table, &descriptor.timestamp) {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!(file = %filename, "timestamp construction failed: {err}");
                return Ok(described_empty(filename, descriptor, err.to_string()));
            }
        };
        if normalized.is_empty() {
            return Ok(described_empty(
                filename,
                descriptor,
                "no rows with a constructible timestamp".to_string(),
            ));
        }

        let (tables, unmatched_identifiers) =
            match self.apply_special_format(&normalized, descriptor, special_format) {
                Ok((tables, unmatched)) => (tables, unmatched),
                Err(err) => {
                    warn!(file = %filename, "special-format restructuring failed: {err}");
                    return Ok(described_empty(filename, descriptor, err.to_string()));
                }
            };

        let mut series_out: Vec<TaggedSeries> = Vec::new();
        let mut table_summaries = Vec::with_capacity(tables.len());
        let mut unadmitted_names: Vec<String> = Vec::new();

        for (group_idx, mut table) in tables.into_iter().enumerate() {
            clean::clean(&mut table);

            let declared = descriptor.raw_frequency.for_group(group_idx);
            if table.is_empty() {
                table_summaries.push(TableSummary {
                    group: table.group.clone(),
                    rows: 0,
                    variables: 0,
                    first_timestamp: None,
                    last_timestamp: None,
                    frequency: declared.unwrap_or(NOT_DEFINED).to_string(),
                    frequency_source: "config".to_string(),
                });
                continue;
            }

            let estimate = frequency::detect(&table.index);
            let (freq, freqfrom) = frequency::frequency_label(&estimate, declared);
            if matches!(estimate, FrequencyEstimate::Irregular) {
                warn!(file = %filename, "no regular sampling interval detected");
            }

            let resolution = resolver::resolve_table(
                &table,
                descriptor,
                group_idx,
                self.unit_mapper,
                &self.context.site,
            )?;

            for column in &resolution.unadmitted {
                warn!(
                    file = %filename,
                    filetype = %descriptor.id,
                    "variable {column} is not defined in filetype, not admitted"
                );
                unadmitted_names.push(column.name.clone());
            }

            let variables = resolution.series.len();
            for resolved in &resolution.series {
                let tags = self.series_tags(
                    resolved,
                    descriptor,
                    declared,
                    &freq,
                    &freqfrom,
                    special_format,
                );
                series_out.push(emit_series(resolved, &table.index, tags)?);
            }

            table_summaries.push(TableSummary {
                group: table.group.clone(),
                rows: table.height(),
                variables,
                first_timestamp: table.first_timestamp(),
                last_timestamp: table.last_timestamp(),
                frequency: freq,
                frequency_source: freqfrom,
            });
        }

        let series_emitted = series_out.len();
        Ok(FileOutcome {
            series: series_out,
            summary: FileSummary {
                filename: filename.clone(),
                descriptor_id: Some(descriptor.id.clone()),
                special_format: special_format.map(|tag| tag.as_str().to_string()),
                tables: table_summaries,
                unmatched_identifiers,
                unadmitted: unadmitted_names,
                series_emitted,
                degraded: None,
            },
        })
    }

    fn apply_special_format(
        &self,
        normalized: &NormalizedTable,
        descriptor: &FiletypeDescriptor,
        special_format: Option<SpecialFormatTag>,
    ) -> std::result::Result<(Vec<NormalizedTable>, Vec<String>), meteoflow_parser::ReadError>
    {
        match special_format {
            None => Ok((vec![normalized.clone()], Vec::new())),
            Some(SpecialFormatTag::Sequential) => {
                let SpecialFormatOutcome {
                    tables,
                    unmatched_identifiers,
                } = restructure_sequential(normalized, &descriptor.id, &descriptor.locations)?;
                Ok((tables, unmatched_identifiers))
            }
            Some(SpecialFormatTag::Alternating) => {
                let groups = descriptor
                    .record_groups
                    .as_ref()
                    .expect("validated alternating descriptor has record groups");
                // Positional names refer to the table after timestamp
                // construction, so timestamp working columns drop out.
                let first = post_timestamp_names(descriptor, &descriptor.variables);
                let second = post_timestamp_names(descriptor, &descriptor.variables2);
                let SpecialFormatOutcome {
                    tables,
                    unmatched_identifiers,
                } = restructure_alternating(normalized, groups, [first.as_slice(), second.as_slice()])?;
                Ok((tables, unmatched_identifiers))
            }
        }
    }

    fn series_tags(
        &self,
        resolved: &ResolvedSeries,
        descriptor: &FiletypeDescriptor,
        declared: Option<&str>,
        freq: &str,
        freqfrom: &str,
        special_format: Option<SpecialFormatTag>,
    ) -> SeriesTags {
        let variable = &resolved.variable;
        SeriesTags {
            field: variable.field.clone(),
            measurement: variable.measurement.clone(),
            units: variable.units.clone(),
            raw_varname: variable.provenance.raw_name.clone(),
            raw_units: variable.provenance.raw_units.clone(),
            hpos: variable.hpos.as_str().to_string(),
            vpos: variable.vpos.as_str().to_string(),
            repl: variable.repl.as_str().to_string(),
            data_raw_freq: declared.unwrap_or(NOT_DEFINED).to_string(),
            freq: freq.to_string(),
            freqfrom: freqfrom.to_string(),
            site: self.context.site.clone(),
            filegroup: self.context.filegroup.clone(),
            filetype: descriptor.id.clone(),
            data_version: descriptor.data_version.clone(),
            special_format: special_format.map(|tag| tag.as_str().to_string()),
            derived_from: variable.provenance.derived_from.clone(),
            admitted: variable.admitted,
        }
    }
}

fn post_timestamp_names(
    descriptor: &FiletypeDescriptor,
    catalogue: &[crate::config::VarEntry],
) -> Vec<String> {
    FiletypeDescriptor::raw_names(catalogue)
        .into_iter()
        .filter(|name| !meteoflow_parser::timestamp::is_work_column(name, &descriptor.timestamp))
        .collect()
}

fn empty_outcome(filename: &str, degraded: Option<String>) -> FileOutcome {
    FileOutcome {
        series: Vec::new(),
        summary: FileSummary::empty(filename, degraded),
    }
}

fn described_empty(filename: &str, descriptor: &FiletypeDescriptor, reason: String) -> FileOutcome {
    let mut summary = FileSummary::empty(filename, Some(reason));
    summary.descriptor_id = Some(descriptor.id.clone());
    summary.special_format = descriptor.special_format().map(|tag| tag.as_str().to_string());
    FileOutcome {
        series: Vec::new(),
        summary,
    }
}
