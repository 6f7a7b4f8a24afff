//! Template rendering seam used for variable expressions in include paths

pub mod templar;

pub use templar::HandlebarsTemplar;

use serde_json::Value;

/// Renders a template string against a set of variables.
///
/// Returns `None` when the text cannot be rendered, typically because it
/// references a variable that is only known at execution time. Callers keep
/// the unrendered text in that case.
pub trait TemplateRenderer {
    fn render(&self, text: &str, variables: &Value) -> Option<String>;
}

/// Whether `text` contains a Jinja expression, statement or comment.
pub fn is_template(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}
