//! Numeric statistics and categorical distributions.

use std::collections::HashMap;

use serde_json::Value;

use super::types::{CategoricalValue, NumericStats, OtherValues, Percentiles};

/// Render a non-null cell as the string used for counting and display.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Numeric value of a cell, accepting numeric strings.
pub fn cell_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Linear-interpolated percentile of sorted values, `p` in `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Summary statistics; `None` for an empty input.
pub fn numeric_stats(values: &[f64]) -> Option<NumericStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let stddev = if sorted.len() > 1 {
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    } else {
        0.0
    };

    let p = |q| percentile(&sorted, q).unwrap_or(mean);
    let percentiles = Percentiles {
        p5: p(5.0),
        p25: p(25.0),
        p50: p(50.0),
        p75: p(75.0),
        p95: p(95.0),
    };

    Some(NumericStats {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        // keep the mean inside the observed range despite rounding
        mean: mean.clamp(sorted[0], sorted[sorted.len() - 1]),
        median: percentiles.p50,
        stddev,
        percentiles,
    })
}

/// Occurrences of each distinct value.
pub fn value_counts(values: &[String]) -> HashMap<&str, u64> {
    let mut counts = HashMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Top `max_values` values by frequency (ties by value) and the folded tail.
pub fn categorical_distribution(
    values: &[String],
    max_values: usize,
) -> (Vec<CategoricalValue>, Option<OtherValues>) {
    if values.is_empty() {
        return (Vec::new(), None);
    }
    let total = values.len() as f64;
    let mut counts: Vec<(&str, u64)> = value_counts(values).into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let percentage = |count: u64| round2(count as f64 * 100.0 / total);

    let kept = counts
        .iter()
        .take(max_values)
        .map(|(value, count)| CategoricalValue {
            value: value.to_string(),
            count: *count,
            percentage: percentage(*count),
        })
        .collect();

    let tail = &counts[max_values.min(counts.len())..];
    let other = if tail.is_empty() {
        None
    } else {
        let count: u64 = tail.iter().map(|(_, c)| c).sum();
        Some(OtherValues {
            distinct_values: tail.len() as u64,
            count,
            percentage: percentage(count),
        })
    };

    (kept, other)
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
