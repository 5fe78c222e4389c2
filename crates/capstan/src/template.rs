//! Templating-evaluator seam and the built-in substitution evaluator.
//!
//! The engine treats template evaluation as a pure function: named snippet
//! text in, output text out, with a single external variable binding named
//! `context` carrying the active context settings as JSON.

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors from template evaluation.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template '{name}' failed to evaluate: {reason}")]
    Evaluation { name: String, reason: String },

    #[error("Template context is not valid JSON: {0}")]
    Context(#[from] serde_json::Error),
}

/// Evaluates a named template snippet to output text.
pub trait TemplateEvaluator {
    /// Renders `text` with the `context` JSON document bound.
    fn evaluate(&self, name: &str, text: &str, context_json: &str)
        -> Result<String, TemplateError>;
}

/// Built-in evaluator: literal substitution of `${context.<key>}` placeholders
/// with values from the flattened context document. Placeholders that resolve
/// to nothing are left in place.
#[derive(Debug, Default)]
pub struct SubstitutionEvaluator;

impl SubstitutionEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEvaluator for SubstitutionEvaluator {
    fn evaluate(
        &self,
        _name: &str,
        text: &str,
        context_json: &str,
    ) -> Result<String, TemplateError> {
        let context: serde_json::Value = serde_json::from_str(context_json)?;
        let mut bindings = BTreeMap::new();
        flatten_into("context", &context, &mut bindings);

        let mut result = text.to_string();
        for (key, value) in &bindings {
            let placeholder = format!("${{{}}}", key);
            result = result.replace(&placeholder, value);
        }
        Ok(result)
    }
}

/// Flattens a JSON document into dotted-key string bindings.
fn flatten_into(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                flatten_into(&format!("{}.{}", prefix, key), inner, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, inner) in items.iter().enumerate() {
                flatten_into(&format!("{}.{}", prefix, index), inner, out);
            }
        }
        serde_json::Value::Null => {}
        serde_json::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}
