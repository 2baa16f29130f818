use std::collections::BTreeMap;

use regex::Regex;
use thiserror::Error;

use crate::spec::field::{FieldDefinition, RuleKind, ValidationRule};
use crate::spec::form::FormSchema;
use crate::values::FormValues;

pub const DEFAULT_REQUIRED_MESSAGE: &str = "This field is required";

/// A rule that cannot be applied as authored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("{kind} rule has no value")]
    MissingValue { kind: &'static str },
    #[error("{kind} rule needs a numeric value, got '{value}'")]
    NonNumericValue { kind: &'static str, value: String },
    #[error("pattern '{pattern}' is not a valid regular expression: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Outcome of validating every plain field of a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    /// Field id to the message of its first failing rule.
    pub errors: BTreeMap<String, String>,
    /// Field id to the rule that could not be evaluated.
    pub rule_errors: BTreeMap<String, RuleError>,
}

/// Check `raw` against `rules` in order and return the first failing rule's
/// message, or `None` when every rule passes.
pub fn validate_field(raw: &str, rules: &[ValidationRule]) -> Result<Option<String>, RuleError> {
    for rule in rules {
        if !passes(raw, rule)? {
            return Ok(Some(rule.message.clone()));
        }
    }
    Ok(None)
}

fn passes(raw: &str, rule: &ValidationRule) -> Result<bool, RuleError> {
    let passed = match rule.kind {
        RuleKind::Required => !raw.trim().is_empty(),
        RuleKind::MinLength => (raw.chars().count() as f64) >= numeric_value(rule)?,
        RuleKind::MaxLength => (raw.chars().count() as f64) <= numeric_value(rule)?,
        RuleKind::Pattern => compile_pattern(rule)?.is_match(raw),
        // Blank input counts as zero; other non-numeric text is not range checked.
        RuleKind::Min => {
            let bound = numeric_value(rule)?;
            number_of(raw).is_none_or(|number| number >= bound)
        }
        RuleKind::Max => {
            let bound = numeric_value(rule)?;
            number_of(raw).is_none_or(|number| number <= bound)
        }
    };
    Ok(passed)
}

fn numeric_value(rule: &ValidationRule) -> Result<f64, RuleError> {
    let kind = rule.kind.as_str();
    let value = rule.value.as_ref().ok_or(RuleError::MissingValue { kind })?;
    value.as_number().ok_or_else(|| RuleError::NonNumericValue {
        kind,
        value: value.as_text(),
    })
}

fn compile_pattern(rule: &ValidationRule) -> Result<Regex, RuleError> {
    let pattern = rule
        .value
        .as_ref()
        .map(|value| value.as_text())
        .ok_or(RuleError::MissingValue { kind: "pattern" })?;
    Regex::new(&pattern).map_err(|err| RuleError::InvalidPattern {
        pattern,
        reason: err.to_string(),
    })
}

fn number_of(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Rules a field is actually checked against: a `required` flag without an
/// explicit required rule adds one in front.
pub fn effective_rules(field: &FieldDefinition) -> Vec<ValidationRule> {
    let mut rules = Vec::with_capacity(field.validation.len() + 1);
    if field.required
        && !field
            .validation
            .iter()
            .any(|rule| rule.kind == RuleKind::Required)
    {
        rules.push(ValidationRule::new(
            RuleKind::Required,
            None,
            DEFAULT_REQUIRED_MESSAGE,
        ));
    }
    rules.extend(field.validation.iter().cloned());
    rules
}

/// Validate a single field's current value. Derived fields are exempt.
pub fn validate_value(
    field: &FieldDefinition,
    values: &FormValues,
) -> Result<Option<String>, RuleError> {
    if field.is_derived {
        return Ok(None);
    }
    validate_field(&values.raw_text(&field.id), &effective_rules(field))
}

/// Validate every plain field of `schema`.
pub fn validate(schema: &FormSchema, values: &FormValues) -> ValidationResult {
    let mut result = ValidationResult::default();

    for field in schema.fields.iter().filter(|field| !field.is_derived) {
        match validate_value(field, values) {
            Ok(Some(message)) => {
                result.errors.insert(field.id.clone(), message);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(field = %field.id, error = %err, "validation rule cannot be applied");
                result.rule_errors.insert(field.id.clone(), err);
            }
        }
    }

    result.valid = result.errors.is_empty() && result.rule_errors.is_empty();
    result
}
