use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

/// Largest boundary window tried by the progressive strategy.
const PROGRESSIVE_MAX_WINDOW: usize = 1000;
/// Smallest boundary window worth comparing.
const PROGRESSIVE_MIN_WINDOW: usize = 5;
/// Minimum points for whole-index inference.
const FULL_RANGE_MIN_POINTS: usize = 10;
/// Share of deltas the modal delta must exceed.
const DOMINANT_SHARE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyMethod {
    FullRange,
    DominantDelta,
    ProgressiveBoundary,
}

impl FrequencyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyMethod::FullRange => "full-range",
            FrequencyMethod::DominantDelta => "dominant-delta",
            FrequencyMethod::ProgressiveBoundary => "progressive-boundary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Medium,
    High,
    Maximal,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Maximal => "maximal",
            Confidence::High => "high",
            Confidence::Medium => "medium",
        }
    }
}

/// Outcome of frequency inference over one datetime index. Computed fresh
/// per file, never persisted across files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrequencyEstimate {
    Detected {
        interval: Duration,
        method: FrequencyMethod,
        confidence: Confidence,
    },
    /// A single record cannot carry an interval; distinct from irregular.
    SingleRecord,
    Irregular,
}

impl FrequencyEstimate {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            FrequencyEstimate::Detected { interval, .. } => Some(*interval),
            _ => None,
        }
    }

    /// Canonical interval string, e.g. "10min", "30s", "1h".
    pub fn canonical(&self) -> Option<String> {
        self.interval().map(format_interval)
    }

    pub fn source_label(&self) -> &'static str {
        match self {
            FrequencyEstimate::Detected { method, .. } => method.as_str(),
            FrequencyEstimate::SingleRecord => "single-record",
            FrequencyEstimate::Irregular => "irregular",
        }
    }
}

/// Infers the dominant sampling interval of a datetime index.
///
/// Three independent strategies run in a fixed priority order; agreement of
/// all three gives maximal confidence, otherwise the first succeeding
/// strategy decides. The index is read as-is, so re-running on the same
/// index always yields the same estimate.
pub fn detect(index: &[NaiveDateTime]) -> FrequencyEstimate {
    if index.len() == 1 {
        return FrequencyEstimate::SingleRecord;
    }
    if index.is_empty() {
        return FrequencyEstimate::Irregular;
    }

    // Priority order: full-range agreement (or full agreement of all
    // three) is maximal, dominant-delta high, progressive-boundary medium.
    let strategies: [(FrequencyMethod, Confidence, fn(&[NaiveDateTime]) -> Option<Duration>); 3] = [
        (
            FrequencyMethod::FullRange,
            Confidence::Maximal,
            full_range,
        ),
        (
            FrequencyMethod::DominantDelta,
            Confidence::High,
            dominant_delta,
        ),
        (
            FrequencyMethod::ProgressiveBoundary,
            Confidence::Medium,
            progressive_boundary,
        ),
    ];

    for (method, confidence, strategy) in strategies {
        if let Some(interval) = strategy(index) {
            return FrequencyEstimate::Detected {
                interval,
                method,
                confidence,
            };
        }
    }
    FrequencyEstimate::Irregular
}

fn deltas(index: &[NaiveDateTime]) -> Vec<Duration> {
    index.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// A slice carries an unambiguous interval when every successive delta is
/// identical and positive.
fn infer_interval(index: &[NaiveDateTime]) -> Option<Duration> {
    let deltas = deltas(index);
    let first = *deltas.first()?;
    if first <= Duration::zero() {
        return None;
    }
    deltas.iter().all(|d| *d == first).then_some(first)
}

fn full_range(index: &[NaiveDateTime]) -> Option<Duration> {
    if index.len() < FULL_RANGE_MIN_POINTS {
        return None;
    }
    infer_interval(index)
}

/// Modal successive difference, accepted only when it accounts for more
/// than 90% of all differences.
fn dominant_delta(index: &[NaiveDateTime]) -> Option<Duration> {
    let deltas = deltas(index);
    if deltas.is_empty() {
        return None;
    }

    let mut counts: HashMap<Duration, usize> = HashMap::new();
    for delta in &deltas {
        *counts.entry(*delta).or_insert(0) += 1;
    }
    let (modal, count) = counts
        .into_iter()
        .max_by_key(|(delta, count)| (*count, *delta))?;

    if modal <= Duration::zero() {
        return None;
    }
    let share = count as f64 / deltas.len() as f64;
    (share > DOMINANT_SHARE).then_some(modal)
}

/// Compares the interval inferred from the first N and last N timestamps,
/// shrinking N from 1000 until both windows agree. The largest agreeing N
/// wins.
fn progressive_boundary(index: &[NaiveDateTime]) -> Option<Duration> {
    for n in (PROGRESSIVE_MIN_WINDOW..=PROGRESSIVE_MAX_WINDOW).rev() {
        if index.len() < n * 2 {
            continue;
        }
        let head = infer_interval(&index[..n]);
        let tail = infer_interval(&index[index.len() - n..]);
        if head.is_some() && head == tail {
            return head;
        }
    }
    None
}

/// Canonical interval string: whole days, hours, minutes or seconds.
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.num_seconds();
    if secs <= 0 {
        return format!("{}ms", interval.num_milliseconds());
    }
    if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs % 60 == 0 {
        format!("{}min", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// Parses a canonical interval string as written in descriptor files.
pub fn parse_interval(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    let split = trimmed.find(|c: char| !c.is_ascii_digit())?;
    let (number, unit) = trimmed.split_at(split);
    let number: i64 = number.parse().ok()?;
    match unit {
        "s" => Some(Duration::seconds(number)),
        "min" => Some(Duration::minutes(number)),
        "h" => Some(Duration::hours(number)),
        "d" => Some(Duration::days(number)),
        _ => None,
    }
}

/// Frequency tag value and its source, folding in the declared interval:
/// a detected interval that disagrees with the declaration is annotated as
/// a mismatch; no detection at all falls back to the declared value.
pub fn frequency_label(
    estimate: &FrequencyEstimate,
    declared: Option<&str>,
) -> (String, String) {
    match estimate.canonical() {
        Some(canonical) => {
            let matches = match declared.and_then(parse_interval) {
                Some(declared_interval) => estimate.interval() == Some(declared_interval),
                None => declared.map(str::trim) == Some(canonical.as_str()),
            };
            if matches || declared.is_none() {
                (canonical, estimate.source_label().to_string())
            } else {
                (
                    format!(
                        "-mismatch-{}-vs-{}-",
                        canonical,
                        declared.unwrap_or(crate::config::NOT_DEFINED)
                    ),
                    estimate.source_label().to_string(),
                )
            }
        }
        None => match declared {
            Some(declared) => (declared.to_string(), "config".to_string()),
            None => (
                estimate.source_label().to_string(),
                estimate.source_label().to_string(),
            ),
        },
    }
}
