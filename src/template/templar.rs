//! Handlebars-backed rendering of `{{ var }}` expressions

use handlebars::Handlebars;
use serde_json::Value;
use tracing::debug;

use super::TemplateRenderer;

/// Renders simple variable expressions found in include paths.
///
/// Strict mode turns an undefined variable into a render failure, which the
/// resolver treats as "cannot be resolved statically". Jinja constructs that
/// Handlebars does not understand (filters, tests) fail the same way.
pub struct HandlebarsTemplar {
    handlebars: Handlebars<'static>,
}

impl HandlebarsTemplar {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }
}

impl Default for HandlebarsTemplar {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for HandlebarsTemplar {
    fn render(&self, text: &str, variables: &Value) -> Option<String> {
        match self.handlebars.render_template(text, variables) {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                debug!("Template '{}' left unresolved: {}", text, e);
                None
            }
        }
    }
}
