//! Command templates for external tools.

use crate::errors::ToolError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").unwrap())
}

/// A command line template for an external tool.
///
/// Arguments may contain `{name}` placeholders that are filled from stage
/// inputs when the command is rendered. An argument that consists of a single
/// optional placeholder (see [`ToolCommand::optional_arg`]) is dropped when
/// the variable is missing or empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// The program to run.
    pub program: String,
    /// Argument templates.
    pub args: Vec<String>,
    /// Argument templates that are dropped when any placeholder is empty.
    #[serde(default)]
    pub optional_args: Vec<(usize, String)>,
    /// Pinned tool version, recorded in logs and reports.
    #[serde(default)]
    pub version: Option<String>,
    /// Extra environment variables (templated like arguments).
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Exit codes treated as success.
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<i32>,
}

fn default_success_codes() -> Vec<i32> {
    vec![0]
}

impl ToolCommand {
    /// Creates a template for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            optional_args: Vec::new(),
            version: None,
            env: BTreeMap::new(),
            success_codes: default_success_codes(),
        }
    }

    /// Appends an argument template.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several argument templates.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends an argument that is dropped when its placeholders are unset.
    #[must_use]
    pub fn optional_arg(mut self, arg: impl Into<String>) -> Self {
        self.optional_args.push((self.args.len(), arg.into()));
        self
    }

    /// Pins the tool version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds an environment variable template.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the exit codes treated as success.
    #[must_use]
    pub fn with_success_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.success_codes = codes.into_iter().collect();
        self
    }

    /// Returns true if `code` counts as success.
    #[must_use]
    pub fn is_success_code(&self, code: i32) -> bool {
        self.success_codes.contains(&code)
    }

    /// Renders the argument list against `vars`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownPlaceholder`] if a required argument uses
    /// a placeholder missing from `vars`.
    pub fn render_args(&self, vars: &BTreeMap<String, String>) -> Result<Vec<String>, ToolError> {
        let mut rendered = Vec::with_capacity(self.args.len() + self.optional_args.len());
        let mut optional = self.optional_args.iter().peekable();

        for (idx, arg) in self.args.iter().enumerate() {
            while let Some((_, template)) = optional.next_if(|(pos, _)| *pos == idx) {
                if let Some(value) = self.render_optional(template, vars) {
                    rendered.push(value);
                }
            }
            rendered.push(self.render_required(arg, vars)?);
        }
        for (_, template) in optional {
            if let Some(value) = self.render_optional(template, vars) {
                rendered.push(value);
            }
        }
        Ok(rendered)
    }

    /// Renders the environment variables against `vars`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownPlaceholder`] on a missing placeholder.
    pub fn render_env(
        &self,
        vars: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, ToolError> {
        self.env
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.render_required(v, vars)?)))
            .collect()
    }

    /// Renders the command as a single display string.
    #[must_use]
    pub fn display(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn render_required(
        &self,
        template: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<String, ToolError> {
        let pattern = placeholder_pattern();
        if let Some(missing) = pattern
            .captures_iter(template)
            .map(|c| c[1].to_string())
            .find(|name| !vars.contains_key(name))
        {
            return Err(ToolError::UnknownPlaceholder {
                program: self.program.clone(),
                placeholder: missing,
            });
        }
        Ok(pattern
            .replace_all(template, |caps: &regex::Captures<'_>| {
                vars.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }

    fn render_optional(&self, template: &str, vars: &BTreeMap<String, String>) -> Option<String> {
        let pattern = placeholder_pattern();
        let all_set = pattern
            .captures_iter(template)
            .all(|c| vars.get(&c[1]).is_some_and(|v| !v.is_empty()));
        if all_set {
            self.render_required(template, vars).ok()
        } else {
            None
        }
    }
}
