//! Field-level validation shared by pet drafts and adoption applications.
//!
//! Every check records its failure instead of returning early, so callers get
//! the complete list of problems in a single `AdoptionError::Validation`.

use crate::error::{AdoptionError, Result};

#[derive(Debug, Default)]
pub(crate) struct FieldErrors {
    missing: Vec<String>,
    invalid: Vec<String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the trimmed value, or records the field as missing when it is
    /// absent or blank.
    pub fn require(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                self.missing.push(field.to_string());
                None
            }
        }
    }

    /// Required field that must also parse into one of an enum's values.
    pub fn require_parsed<T: std::str::FromStr>(
        &mut self,
        field: &str,
        value: Option<&str>,
    ) -> Option<T> {
        let raw = self.require(field, value)?;
        match raw.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.invalid.push(field.to_string());
                None
            }
        }
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.invalid.push(field.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    pub fn finish(self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("Missing required fields: {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("Invalid fields: {}", self.invalid.join(", ")));
        }

        let mut fields = self.missing;
        fields.extend(self.invalid);

        Err(AdoptionError::Validation {
            message: parts.join("; "),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failure() {
        let mut errors = FieldErrors::new();
        assert!(errors.require("name", Some("  ")).is_none());
        assert!(errors.require("breed", None).is_none());
        assert_eq!(errors.require("species", Some(" Dog ")), Some("Dog".into()));
        errors.max_len("species", Some("Dog"), 50);
        errors.max_len("description", Some(&"x".repeat(501)), 500);

        match errors.finish() {
            Err(AdoptionError::Validation { message, fields }) => {
                assert_eq!(fields, vec!["name", "breed", "description"]);
                assert!(message.contains("Missing required fields: name, breed"));
                assert!(message.contains("Invalid fields: description"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_report_is_ok() {
        assert!(FieldErrors::new().finish().is_ok());
    }
}
