//! Data-quality metrics from sample counts.
//!
//! Nothing here looks at anything but the fetched values, so the numbers
//! are reproducible for a given sample.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::classify::TypeFamily;
use super::stats::round2;
use super::types::{OtherValues, QualityMetrics};

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static TIMESTAMP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?)?(Z|[+-]\d{2}:?\d{2}| UTC)?$")
        .unwrap()
});
static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}(:\d{2}(\.\d+)?)?$").unwrap());
static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").unwrap());
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?|ftp)://[^\s/$.?#][^\s]*$").unwrap());
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ().-]{5,}[0-9]$").unwrap());

/// Null share above which a column is reported.
const HIGH_NULL_RATE: f64 = 0.5;
/// Dominant shape share below which a column is reported as mixed.
const MIXED_SHAPE_RATE: f64 = 0.9;

/// Format a column's values are expected to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Integer,
    Number,
    Boolean,
    Date,
    Timestamp,
    Time,
    Uuid,
    Json,
    Email,
    Url,
    Phone,
}

impl ValueFormat {
    fn name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "numeric",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
            Self::Uuid => "UUID",
            Self::Json => "JSON",
            Self::Email => "email",
            Self::Url => "URL",
            Self::Phone => "phone",
        }
    }

    fn matches(&self, value: &str) -> bool {
        let v = value.trim();
        match self {
            Self::Integer => {
                v.parse::<i64>().is_ok()
                    || v.parse::<f64>().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            Self::Number => v.parse::<f64>().is_ok(),
            Self::Boolean => matches!(
                v.to_lowercase().as_str(),
                "true" | "false" | "t" | "f" | "0" | "1" | "yes" | "no" | "y" | "n"
            ),
            Self::Date => DATE_PATTERN.is_match(v),
            Self::Timestamp => TIMESTAMP_PATTERN.is_match(v),
            Self::Time => TIME_PATTERN.is_match(v),
            Self::Uuid => UUID_PATTERN.is_match(v),
            Self::Json => serde_json::from_str::<serde_json::Value>(v).is_ok(),
            Self::Email => EMAIL_PATTERN.is_match(v),
            Self::Url => URL_PATTERN.is_match(v),
            Self::Phone => PHONE_PATTERN.is_match(v),
        }
    }
}

/// Formats implied by the declared type and the column name.
pub fn expected_formats(name: &str, family: TypeFamily) -> Vec<ValueFormat> {
    let mut formats = Vec::new();
    match family {
        TypeFamily::Integer => formats.push(ValueFormat::Integer),
        TypeFamily::Float | TypeFamily::Decimal => formats.push(ValueFormat::Number),
        TypeFamily::Boolean => formats.push(ValueFormat::Boolean),
        TypeFamily::Date => formats.push(ValueFormat::Date),
        TypeFamily::Timestamp => formats.push(ValueFormat::Timestamp),
        TypeFamily::Time => formats.push(ValueFormat::Time),
        TypeFamily::Uuid => formats.push(ValueFormat::Uuid),
        TypeFamily::Json => formats.push(ValueFormat::Json),
        TypeFamily::String | TypeFamily::Binary | TypeFamily::Other => {}
    }

    if family.is_textual() {
        let lower = name.to_lowercase();
        if lower.contains("email") {
            formats.push(ValueFormat::Email);
        } else if lower.contains("url") || lower.contains("website") || lower.ends_with("_link") {
            formats.push(ValueFormat::Url);
        } else if lower.ends_with("uuid") || lower.ends_with("guid") {
            formats.push(ValueFormat::Uuid);
        } else if lower.contains("phone") || lower.contains("mobile") {
            formats.push(ValueFormat::Phone);
        }
    }
    formats
}

/// Character-class shape of a value: digits become `9`, letters `a`/`A`,
/// runs collapse.
pub fn value_shape(value: &str) -> String {
    let mut shape = String::new();
    let mut last = None;
    for c in value.chars() {
        let class = if c.is_ascii_digit() {
            '9'
        } else if c.is_uppercase() {
            'A'
        } else if c.is_alphabetic() {
            'a'
        } else {
            c
        };
        if last != Some(class) {
            shape.push(class);
            last = Some(class);
        }
    }
    shape
}

/// Inputs to the quality computation for one column.
pub struct QualityInput<'a> {
    pub name: &'a str,
    pub family: TypeFamily,
    pub declared_nullable: bool,
    pub sample_rows: u64,
    /// Non-null values, rendered as text.
    pub values: &'a [String],
    pub distinct_count: u64,
    pub other_values: Option<&'a OtherValues>,
}

/// Compute quality metrics and issues.
pub fn assess(input: &QualityInput<'_>) -> QualityMetrics {
    if input.sample_rows == 0 {
        return QualityMetrics::unmeasured();
    }

    let non_null = input.values.len() as u64;
    let null_count = input.sample_rows.saturating_sub(non_null);
    let completeness = non_null as f64 / input.sample_rows as f64;
    let uniqueness = if non_null == 0 {
        0.0
    } else {
        input.distinct_count as f64 / non_null as f64
    };

    let mut issues = Vec::new();

    if non_null == 0 {
        issues.push("no non-null values in sample".to_string());
    } else if 1.0 - completeness > HIGH_NULL_RATE {
        issues.push(format!(
            "high null rate: {:.2}% of sampled values are null",
            (1.0 - completeness) * 100.0
        ));
    }
    if !input.declared_nullable && null_count > 0 {
        issues.push(format!(
            "{} nulls observed in a column declared NOT NULL",
            null_count
        ));
    }

    let formats = expected_formats(input.name, input.family);
    let mut valid = 0u64;
    let mut first_failed: Option<ValueFormat> = None;
    for value in input.values {
        match formats.iter().find(|f| !f.matches(value)) {
            None => valid += 1,
            Some(f) => {
                first_failed.get_or_insert(*f);
            }
        }
    }
    let validity = if non_null == 0 {
        1.0
    } else {
        valid as f64 / non_null as f64
    };
    if let Some(format) = first_failed {
        issues.push(format!(
            "{} of {} values do not match the expected {} format",
            non_null - valid,
            non_null,
            format.name()
        ));
    }

    let consistency = dominant_shape_share(input.values);
    if non_null > 0 && consistency < MIXED_SHAPE_RATE && formats.is_empty() {
        issues.push(format!(
            "mixed value shapes: the dominant shape covers {:.2}% of values",
            consistency * 100.0
        ));
    }

    if let Some(other) = input.other_values {
        issues.push(format!(
            "{} less frequent values ({} rows, {}%) folded into other",
            other.distinct_values, other.count, other.percentage
        ));
    }

    if input.distinct_count == 1 && non_null > 1 {
        issues.push("constant column: every sampled value is identical".to_string());
    }

    QualityMetrics {
        completeness: round4(completeness),
        uniqueness: round4(uniqueness),
        validity: round4(validity),
        consistency: round4(consistency),
        issues,
    }
}

fn dominant_shape_share(values: &[String]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let mut shapes: HashMap<String, u64> = HashMap::new();
    for v in values {
        *shapes.entry(value_shape(v)).or_insert(0) += 1;
    }
    let dominant = shapes.values().copied().max().unwrap_or(0);
    dominant as f64 / values.len() as f64
}

fn round4(v: f64) -> f64 {
    round2(v * 100.0) / 100.0
}
