use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input types a field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Email,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
    /// Any type name this crate does not know; such fields render nothing.
    #[serde(other)]
    Unknown,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Email => "email",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Unknown => "unknown",
        }
    }

    /// Whether the field picks one entry out of `options`.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }
}

/// Kinds of validation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Required,
    MinLength,
    MaxLength,
    Pattern,
    Min,
    Max,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::MinLength => "minLength",
            RuleKind::MaxLength => "maxLength",
            RuleKind::Pattern => "pattern",
            RuleKind::Min => "min",
            RuleKind::Max => "max",
        }
    }
}

/// Rule argument as authored: the editor stores whatever the user typed, so a
/// numeric bound may arrive as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    Text(String),
}

impl RuleValue {
    /// Numeric reading of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RuleValue::Number(number) => Some(*number).filter(|n| n.is_finite()),
            RuleValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite()),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            RuleValue::Number(number) => number.to_string(),
            RuleValue::Text(text) => text.clone(),
        }
    }
}

/// A single check applied to a field's raw value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
    pub message: String,
}

impl ValidationRule {
    pub fn new(kind: RuleKind, value: Option<RuleValue>, message: impl Into<String>) -> Self {
        Self {
            kind,
            value,
            message: message.into(),
        }
    }
}

/// Definition of a single field inside a form.
///
/// A field is either plain (carries `default_value` and `validation`) or
/// derived (carries `parent_fields` and `derivation_logic`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ValidationRule>,
    #[serde(default)]
    pub is_derived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_logic: Option<String>,
}

impl FieldDefinition {
    /// A plain field with no rules, default or placeholder.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        label: impl Into<String>,
        kind: FieldType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
            default_value: None,
            options: None,
            placeholder: None,
            validation: Vec::new(),
            is_derived: false,
            parent_fields: None,
            derivation_logic: None,
        }
    }

    /// Turn this definition into a derived field over `parents`.
    pub fn derived_from(mut self, parents: &[&str], logic: impl Into<String>) -> Self {
        self.is_derived = true;
        self.default_value = None;
        self.validation.clear();
        self.parent_fields = Some(parents.iter().map(|parent| parent.to_string()).collect());
        self.derivation_logic = Some(logic.into());
        self
    }

    pub fn with_rules(mut self, rules: Vec<ValidationRule>) -> Self {
        self.validation = rules;
        self
    }

    pub fn parents(&self) -> &[String] {
        self.parent_fields.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_document() {
        let field: FieldDefinition = serde_json::from_value(json!({
            "id": "total",
            "name": "total",
            "label": "Total",
            "type": "number",
            "required": false,
            "isDerived": true,
            "parentFields": ["a", "b"],
            "derivationLogic": "values[0] + values[1]"
        }))
        .expect("deserialize");
        assert!(field.is_derived);
        assert_eq!(field.parents(), ["a", "b"]);
        assert_eq!(field.kind, FieldType::Number);
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let field: FieldDefinition = serde_json::from_value(json!({
            "id": "x",
            "name": "x",
            "label": "X",
            "type": "signature"
        }))
        .expect("deserialize");
        assert_eq!(field.kind, FieldType::Unknown);
    }

    #[test]
    fn rule_value_accepts_numeric_text() {
        let rule: ValidationRule = serde_json::from_value(json!({
            "type": "minLength",
            "value": " 8 ",
            "message": "too short"
        }))
        .expect("deserialize");
        assert_eq!(rule.value.and_then(|value| value.as_number()), Some(8.0));
    }
}
