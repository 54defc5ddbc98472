//! `$name` / `${name}` placeholder substitution for config templates.
//!
//! `$$` is an escaped dollar sign. Identifiers are ASCII
//! `[_A-Za-z][_A-Za-z0-9]*`.

use crate::error::{TrainingError, TrainingResult};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$(?:(?P<escaped>\$)|(?P<named>[_a-zA-Z][_a-zA-Z0-9]*)|\{(?P<braced>[_a-zA-Z][_a-zA-Z0-9]*)\}|(?P<invalid>))",
    )
    .expect("placeholder pattern is valid")
});

/// How unknown or malformed placeholders are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionMode {
    /// Unknown names and stray `$` are errors.
    #[default]
    Strict,
    /// Unknown names and stray `$` are left in the output verbatim.
    Permissive,
}

#[derive(Debug, Clone)]
pub struct Template {
    source: String,
}

impl Template {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    pub fn from_file(path: &std::path::Path) -> TrainingResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            TrainingError::Template(format!("failed to read template {}: {e}", path.display()))
        })?;
        Ok(Self::new(source))
    }

    /// Names referenced by the template, in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.source) {
            if let Some(name) = caps.name("named").or_else(|| caps.name("braced")) {
                if !names.iter().any(|n| n == name.as_str()) {
                    names.push(name.as_str().to_string());
                }
            }
        }
        names
    }

    pub fn substitute(&self, values: &BTreeMap<String, String>, mode: SubstitutionMode) -> TrainingResult<String> {
        let mut out = String::with_capacity(self.source.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.source) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&self.source[last..whole.start()]);
            last = whole.end();

            match self.expand(&caps, values, mode)? {
                Some(text) => out.push_str(text),
                None => out.push_str(whole.as_str()),
            }
        }

        out.push_str(&self.source[last..]);
        Ok(out)
    }

    /// `None` means "leave the match as written".
    fn expand<'v>(
        &self,
        caps: &Captures<'_>,
        values: &'v BTreeMap<String, String>,
        mode: SubstitutionMode,
    ) -> TrainingResult<Option<&'v str>> {
        if caps.name("escaped").is_some() {
            return Ok(Some("$"));
        }

        if let Some(name) = caps.name("named").or_else(|| caps.name("braced")) {
            return match (values.get(name.as_str()), mode) {
                (Some(value), _) => Ok(Some(value.as_str())),
                (None, SubstitutionMode::Permissive) => Ok(None),
                (None, SubstitutionMode::Strict) => Err(TrainingError::Template(format!(
                    "no value supplied for placeholder `{}`",
                    name.as_str()
                ))),
            };
        }

        match mode {
            SubstitutionMode::Permissive => Ok(None),
            SubstitutionMode::Strict => {
                let offset = caps.get(0).map_or(0, |m| m.start());
                let (line, col) = line_col(&self.source, offset);
                Err(TrainingError::Template(format!(
                    "invalid placeholder at line {line}, col {col}"
                )))
            }
        }
    }
}

fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    (line, col)
}
