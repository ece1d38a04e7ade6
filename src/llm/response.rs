//! Structured LLM output: strict parsing first, then a repair pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{LlmError, LlmResult};

/// Narrative fields generated for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNarrative {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// A relationship from a column of this table to another table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub column: String,
    pub target_table: String,
    pub target_column: String,
    /// `one_to_one`, `one_to_many`, `many_to_one` or `many_to_many`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryExample {
    pub title: String,
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// How a column is meant to be aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregationRule {
    pub column: String,
    /// `sum`, `average`, `count`, `count_distinct`, `min` or `max`.
    pub aggregation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Column → value → meaning.
pub type CategoricalDefinitions = BTreeMap<String, BTreeMap<String, String>>;

/// Sections an LLM response may carry; every field is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmSections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnNarrative>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_rules: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical_definitions: Option<CategoricalDefinitions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_examples: Option<Vec<QueryExample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_rules: Option<Vec<AggregationRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_insights: Option<Vec<String>>,
}

impl LlmSections {
    /// True when no recognized section is present.
    pub fn is_empty(&self) -> bool {
        self.table_description.is_none()
            && self.columns.is_none()
            && self.business_rules.is_none()
            && self.relationships.is_none()
            && self.categorical_definitions.is_none()
            && self.query_examples.is_none()
            && self.aggregation_rules.is_none()
            && self.additional_insights.is_none()
    }
}

/// How a response was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Strict,
    Repaired,
}

/// Parse a response, repairing it if the strict parse fails.
pub fn parse_sections(text: &str) -> LlmResult<(LlmSections, ParseMode)> {
    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let (sections, mode) = match strict_parse(text) {
        Ok(sections) => (sections, ParseMode::Strict),
        Err(strict_err) => {
            let repaired = repair(text)
                .ok_or_else(|| LlmError::Malformed(format!("no JSON object found: {}", strict_err)))?;
            let sections = strict_parse(&repaired)
                .map_err(|e| LlmError::Malformed(format!("repair failed: {}", e)))?;
            (sections, ParseMode::Repaired)
        }
    };

    if sections.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok((sections, mode))
}

fn strict_parse(text: &str) -> Result<LlmSections, serde_json::Error> {
    serde_json::from_str(text.trim())
}

/// Best-effort repair: strip code fences, keep the outermost balanced
/// object, drop trailing commas.
pub fn repair(text: &str) -> Option<String> {
    let unfenced = strip_code_fences(text);
    let object = outermost_object(unfenced)?;
    Some(drop_trailing_commas(object))
}

fn strip_code_fences(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after = &text[start + 3..];
    // skip the info string (```json)
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    }
}

/// The first `{ ... }` whose braces balance, ignoring braces inside strings.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn drop_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_parse() {
        let text = r#"{"table_description": "Orders", "business_rules": ["amount >= 0"]}"#;
        let (sections, mode) = parse_sections(text).unwrap();
        assert_eq!(mode, ParseMode::Strict);
        assert_eq!(sections.table_description.as_deref(), Some("Orders"));
        assert!(sections.relationships.is_none());
    }

    #[test]
    fn test_repair_fenced_prose() {
        let text = "Sure! Here is the metadata:\n```json\n{\"columns\": [{\"name\": \"id\", \"description\": \"Order id {unique}\"},],}\n```\nLet me know.";
        let (sections, mode) = parse_sections(text).unwrap();
        assert_eq!(mode, ParseMode::Repaired);
        let columns = sections.columns.unwrap();
        assert_eq!(columns[0].description.as_deref(), Some("Order id {unique}"));
    }

    #[test]
    fn test_repair_without_fences() {
        let text = "The answer is {\"additional_insights\": [\"seasonal\"]} as requested";
        let (sections, _) = parse_sections(text).unwrap();
        assert_eq!(sections.additional_insights.unwrap(), vec!["seasonal"]);
    }

    #[test]
    fn test_unrepairable() {
        assert!(matches!(
            parse_sections("{\"columns\": [").unwrap_err(),
            LlmError::Malformed(_)
        ));
        assert!(matches!(parse_sections("  ").unwrap_err(), LlmError::EmptyResponse));
        assert!(matches!(parse_sections("{}").unwrap_err(), LlmError::EmptyResponse));
    }

    #[test]
    fn test_trailing_commas_inside_strings_are_kept() {
        assert_eq!(drop_trailing_commas(r#"{"a": "x,}", }"#), r#"{"a": "x,}" }"#);
    }
}
