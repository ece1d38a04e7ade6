//! Prompt template for metadata generation.

use crate::document::SectionKey;
use crate::metadata::TableHandle;

const ROLE: &str = r#"You are a senior data steward documenting an analytical table for business users.

YOUR TASK: Write business-readable metadata for the columns in the PROFILE below.

RULES:
- Base every statement on the profile; do not invent statistics or values.
- Only describe columns that appear in the PROFILE, using their exact names.
- Keep descriptions to one or two sentences.
- Respond with a single JSON object and nothing else."#;

/// Shape of each section in the response schema.
fn section_schema(key: SectionKey) -> &'static str {
    match key {
        SectionKey::BusinessRules => r#""business_rules": ["<rule implied by the data>"]"#,
        SectionKey::Relationships => {
            r#""relationships": [{"column": "<column>", "target_table": "<schema.table>", "target_column": "<column>", "relationship_type": "many_to_one|one_to_many|one_to_one|many_to_many", "description": "<text>"}]"#
        }
        SectionKey::CategoricalDefinitions => {
            r#""categorical_definitions": {"<column>": {"<value>": "<meaning>"}}"#
        }
        SectionKey::QueryExamples => {
            r#""query_examples": [{"title": "<question>", "sql": "<SELECT ...>", "description": "<text>"}]"#
        }
        SectionKey::AggregationRules => {
            r#""aggregation_rules": [{"column": "<column>", "aggregation": "sum|average|count|count_distinct|min|max", "group_by": ["<column>"], "description": "<text>"}]"#
        }
        SectionKey::AdditionalInsights => r#""additional_insights": ["<observation>"]"#,
        SectionKey::DataQuality => "",
    }
}

/// Fixed parts of a prompt; only the payload varies between chunks.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    table: String,
    sample_rows: u64,
    sections: Vec<SectionKey>,
    custom_instructions: Option<String>,
}

impl PromptTemplate {
    pub fn new(
        table: &TableHandle,
        sample_rows: u64,
        sections: Vec<SectionKey>,
        custom_instructions: Option<String>,
    ) -> Self {
        Self {
            table: table.qualified_name(),
            sample_rows,
            sections: sections.into_iter().filter(|s| s.is_generated()).collect(),
            custom_instructions: custom_instructions.filter(|s| !s.trim().is_empty()),
        }
    }

    /// Render the full prompt around a JSON column payload.
    pub fn render(&self, payload: &str) -> String {
        let mut prompt = String::from(ROLE);

        prompt.push_str("\n\nTABLE: ");
        prompt.push_str(&self.table);
        if self.sample_rows > 0 {
            prompt.push_str(&format!(
                "\nPROFILED FROM: {} sampled rows",
                self.sample_rows
            ));
        } else {
            prompt.push_str("\nPROFILED FROM: schema only (no rows could be sampled)");
        }

        prompt.push_str("\n\nREQUESTED SECTIONS: table_description, columns");
        for section in &self.sections {
            prompt.push_str(", ");
            prompt.push_str(section.as_str());
        }

        if let Some(instructions) = &self.custom_instructions {
            prompt.push_str("\n\nADDITIONAL INSTRUCTIONS:\n");
            prompt.push_str(instructions.trim());
        }

        prompt.push_str("\n\nPROFILE:\n");
        prompt.push_str(payload);

        prompt.push_str("\n\nRESPONSE FORMAT:\n{");
        prompt.push_str(r#""table_description": "<text>", "columns": [{"name": "<column>", "description": "<text>", "business_name": "<label>", "purpose": "<text>"}]"#);
        for section in &self.sections {
            prompt.push_str(", ");
            prompt.push_str(section_schema(*section));
        }
        prompt.push('}');
        prompt
    }
}
