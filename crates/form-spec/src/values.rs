use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::field::{FieldDefinition, FieldType};

/// Raw value of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
    Unset,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Text handed to the validation rules. An unchecked box and an unset
    /// value both read as empty.
    pub fn raw_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Bool(true) => "true".to_string(),
            FieldValue::Bool(false) | FieldValue::Unset => String::new(),
        }
    }

    /// Value a session starts from before the user touches the field.
    pub fn initial_for(field: &FieldDefinition) -> Self {
        match &field.default_value {
            Some(default) if !default.is_empty() => FieldValue::Text(default.clone()),
            _ if field.kind == FieldType::Checkbox => FieldValue::Bool(false),
            _ => FieldValue::Text(String::new()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Per-session mapping of field id to current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, FieldValue>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed values for every field from its default.
    pub fn initial(fields: &[FieldDefinition]) -> Self {
        fields
            .iter()
            .map(|field| (field.id.clone(), FieldValue::initial_for(field)))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.0.get(id)
    }

    pub fn set(&mut self, id: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(id.into(), value.into())
    }

    pub fn raw_text(&self, id: &str) -> String {
        self.get(id).map(FieldValue::raw_text).unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for FormValues {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, FieldValue); N]> for FormValues {
    fn from(entries: [(&str, FieldValue); N]) -> Self {
        entries
            .into_iter()
            .map(|(id, value)| (id.to_string(), value))
            .collect()
    }
}
