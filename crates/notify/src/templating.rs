//! `{{NAME}}` placeholder substitution for notification messages.
//!
//! Only `{{ ... }}` spans are touched. Each one is evaluated as a minijinja
//! expression against the variable snapshot taken when the configuration was
//! resolved, so `{{ HOSTNAME }}`, `{{ env('HOSTNAME') }}` and
//! `{{ HOSTNAME | upper }}` all work. Unknown names render as empty strings.
//! Everything outside the placeholders, including `{%`, `{#` and trailing
//! newlines, is copied unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::traits::NotifyError;

/// Turns a raw message into the text every channel receives.
pub trait Substitute: Send + Sync {
    fn substitute(&self, text: &str) -> String;
}

/// Fills message placeholders using minijinja expressions.
///
/// A fresh [`minijinja::Environment`] is created per render call since
/// messages are dynamic strings, not pre-registered templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    variables: Arc<BTreeMap<String, String>>,
}

impl TemplateRenderer {
    pub fn new(variables: BTreeMap<String, String>) -> Self {
        Self {
            variables: Arc::new(variables),
        }
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env(&self) -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();

        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);

        // `env()` reads the snapshot, never the live process environment.
        let variables = Arc::clone(&self.variables);
        env.add_function("env", move |name: String| -> String {
            match variables.get(&name) {
                Some(val) => val.clone(),
                None => {
                    tracing::warn!(var = %name, "Variable not found, returning empty string");
                    String::new()
                }
            }
        });

        env
    }

    /// Render a message. An unclosed `{{` is left as plain text.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if a placeholder is not a valid
    /// expression.
    pub fn render(&self, text: &str) -> Result<String, NotifyError> {
        let env = self.build_env();
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find("{{") {
            let inner = &rest[open + 2..];
            let Some(close) = inner.find("}}") else {
                break;
            };
            out.push_str(&rest[..open]);
            out.push_str(&self.eval(&env, &inner[..close])?);
            rest = &inner[close + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }

    fn eval(
        &self,
        env: &minijinja::Environment<'static>,
        expr: &str,
    ) -> Result<String, NotifyError> {
        let value = env
            .compile_expression(expr)
            .and_then(|compiled| compiled.eval(&*self.variables))
            .map_err(|e| NotifyError::Template(format!("{{{{{expr}}}}}: {e}")))?;
        Ok(value.to_string())
    }
}

impl Substitute for TemplateRenderer {
    /// Messages with an invalid placeholder are sent unchanged.
    fn substitute(&self, text: &str) -> String {
        self.render(text).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid placeholder in message, sending it verbatim");
            text.to_string()
        })
    }
}

/// Custom filter: lowercase a string.
fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

/// Custom filter: uppercase a string.
fn upper_filter(value: String) -> String {
    value.to_uppercase()
}
