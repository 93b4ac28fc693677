use polars::prelude::*;
use serde::Serialize;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::resolver::ResolvedSeries;

/// Tag set attached to one emitted series; stored alongside the data by
/// whatever sink consumes the pipeline output.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesTags {
    pub field: String,
    pub measurement: String,
    pub units: String,
    pub raw_varname: String,
    pub raw_units: String,
    pub hpos: String,
    pub vpos: String,
    pub repl: String,
    /// Interval declared in the descriptor.
    pub data_raw_freq: String,
    /// Interval detected from the data (or fallback), plus its source.
    pub freq: String,
    pub freqfrom: String,
    pub site: String,
    pub filegroup: String,
    pub filetype: String,
    pub data_version: String,
    pub special_format: Option<String>,
    pub derived_from: Option<String>,
    pub admitted: bool,
}

/// One output-ready variable: data frame `[timestamp, value, gain, offset]`
/// plus its tag set. Gain and offset are materialized per row so windowed
/// corrections survive into storage.
#[derive(Debug, Clone)]
pub struct TaggedSeries {
    pub tags: SeriesTags,
    pub data: DataFrame,
}

impl TaggedSeries {
    pub fn height(&self) -> usize {
        self.data.height()
    }
}

/// Builds the output frame for one resolved series: gain and offset
/// applied to the value, rows without a value dropped.
pub fn emit_series(
    resolved: &ResolvedSeries,
    index: &[NaiveDateTime],
    tags: SeriesTags,
) -> Result<TaggedSeries> {
    let mut timestamps: Vec<i64> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut gains: Vec<f64> = Vec::new();
    let mut offsets: Vec<f64> = Vec::new();

    for (idx, value) in resolved.values.iter().enumerate() {
        let Some(value) = value else {
            continue;
        };
        let gain = resolved.variable.gain.at(idx);
        let offset = resolved.variable.offset.at(idx);
        timestamps.push(index[idx].and_utc().timestamp_micros());
        values.push(value * gain + offset);
        gains.push(gain);
        offsets.push(offset);
    }

    let ts_series = Series::new("timestamp".into(), timestamps)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

    let data = DataFrame::new(vec![
        ts_series.into(),
        Series::new("value".into(), values).into(),
        Series::new("gain".into(), gains).into(),
        Series::new("offset".into(), offsets).into(),
    ])?;

    Ok(TaggedSeries { tags, data })
}
