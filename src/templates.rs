//! Task templates and placeholder rendering.
//!
//! Templates are loaded from YAML keyed by template name:
//!
//! ```yaml
//! bug_fix_task:
//!   description: Fix {bug_description} in {project_name}.
//!   expected_output: A fix with a regression test.
//!   agent: staff_engineer
//! ```
//!
//! Placeholders use `{name}`; `{{` and `}}` produce literal braces.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::models::{AgentRole, REQUIRED_TEMPLATES};

const BUILTIN_TASKS: &str = include_str!("../config/tasks.yaml");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskTemplate {
    pub description: String,
    pub expected_output: String,
    /// Default owner. Tasks without one go to the product manager.
    #[serde(default)]
    pub agent: Option<AgentRole>,
}

/// Template parameters, merged from lowest to highest precedence.
pub type Params = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, TaskTemplate>,
}

impl TemplateCatalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Self {
        Self::from_yaml(BUILTIN_TASKS).expect("builtin task templates are valid")
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, TaskError> {
        let templates: BTreeMap<String, TaskTemplate> =
            serde_yaml::from_str(yaml).map_err(|e| TaskError::Config(e.to_string()))?;

        if let Some(missing) = REQUIRED_TEMPLATES
            .iter()
            .find(|name| !templates.contains_key(**name))
        {
            return Err(TaskError::Config(format!(
                "missing required task template '{}'",
                missing
            )));
        }

        Ok(Self { templates })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task templates from {}", path.display()))?;
        let catalog = Self::from_yaml(&yaml)
            .with_context(|| format!("Failed to parse task templates in {}", path.display()))?;
        tracing::debug!(
            "Loaded {} task templates from {}",
            catalog.templates.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Result<&TaskTemplate, TaskError> {
        self.templates
            .get(name)
            .ok_or_else(|| TaskError::UnknownTemplate(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskTemplate)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Parameters every template can rely on.
pub fn default_params() -> Params {
    [
        ("project_name", "the project".to_string()),
        ("bug_description", "the reported issue".to_string()),
        ("feature_description", "the requested feature".to_string()),
        ("research_topic", "the technical topic".to_string()),
        ("assigned_agent", AgentRole::StaffEngineer.as_str().to_string()),
        ("current_year", chrono::Utc::now().year().to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Substitute `{name}` placeholders in `text`.
///
/// `template` is only used to label errors.
pub fn render(template: &str, text: &str, params: &Params) -> Result<String, TaskError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(TaskError::MalformedTemplate {
                        template: template.to_string(),
                        reason: "unterminated '{'".to_string(),
                    });
                }
                let value = params
                    .get(name.trim())
                    .ok_or_else(|| TaskError::MissingParameter {
                        template: template.to_string(),
                        parameter: name.trim().to_string(),
                    })?;
                out.push_str(value);
            }
            '}' => {
                return Err(TaskError::MalformedTemplate {
                    template: template.to_string(),
                    reason: "unmatched '}'".to_string(),
                });
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_placeholders() {
        let p = params(&[("project_name", "Tasky"), ("bug_description", "login fails")]);
        let out = render("t", "Fix {bug_description} in {project_name}.", &p).unwrap();
        assert_eq!(out, "Fix login fails in Tasky.");
    }

    #[test]
    fn doubled_braces_are_literal() {
        let out = render("t", "{{not a param}} {x}", &params(&[("x", "1")])).unwrap();
        assert_eq!(out, "{not a param} 1");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let err = render("bug_fix_task", "{nope}", &Params::new()).unwrap_err();
        assert!(matches!(
            err,
            TaskError::MissingParameter { ref parameter, .. } if parameter == "nope"
        ));
    }

    #[test]
    fn unterminated_brace_is_an_error() {
        let err = render("t", "oops {project_name", &default_params()).unwrap_err();
        assert!(matches!(err, TaskError::MalformedTemplate { .. }));
    }

    #[test]
    fn builtin_catalog_has_every_required_template() {
        let catalog = TemplateCatalog::builtin();
        for name in REQUIRED_TEMPLATES {
            assert!(catalog.get(name).is_ok(), "missing {}", name);
        }
    }

    #[test]
    fn builtin_templates_render_with_default_params() {
        let catalog = TemplateCatalog::builtin();
        let defaults = default_params();
        for (name, template) in catalog.iter() {
            render(name, &template.description, &defaults).unwrap();
            render(name, &template.expected_output, &defaults).unwrap();
        }
    }

    #[test]
    fn rejects_catalog_missing_required_templates() {
        let yaml = "market_research_task:\n  description: d\n  expected_output: e\n";
        let err = TemplateCatalog::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TaskError::Config(_)));
    }
}
