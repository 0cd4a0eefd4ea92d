//! Instruction template for the outbound model request.
//!
//! The template is plain text with a single `{{prompt}}` placeholder.
//! Substitution is literal: the caller prompt is neither escaped nor
//! length-checked. A template without a placeholder gets the prompt
//! appended as a labelled trailing section.

use crate::llm::ResponseFormat;

const PLACEHOLDER: &str = "{{prompt}}";
const SEPARATOR: &str = "\n\n";
const REQUEST_LABEL: &str = "User request: ";

#[derive(Debug, Clone)]
pub struct InstructionTemplate {
    template: String,
}

impl InstructionTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    /// Compose the instruction for `prompt`.
    pub fn render(&self, prompt: &str) -> String {
        if self.template.contains(PLACEHOLDER) {
            self.template.replace(PLACEHOLDER, prompt)
        } else {
            let system = self.template.trim_end();
            if system.is_empty() {
                return prompt.to_string();
            }
            format!("{system}{SEPARATOR}{REQUEST_LABEL}{prompt}")
        }
    }

    /// Compose the instruction and, for structured replies, add the
    /// directive naming the JSON field the fragment must be returned in.
    pub fn render_for(&self, prompt: &str, format: ResponseFormat, json_field: &str) -> String {
        let instruction = self.render(prompt);
        match format {
            ResponseFormat::Text => instruction,
            ResponseFormat::Json => format!(
                "{instruction}{SEPARATOR}Respond with a JSON object whose only key is \"{json_field}\" \
                 and whose value is the complete code as a string."
            ),
        }
    }
}
