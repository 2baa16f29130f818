use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    derive::{DerivationFailure, derive_all_with},
    expr::EvalOptions,
    render::{RenderPayload, build_render_payload},
    spec::form::FormSchema,
    validate::{RuleError, ValidationResult, validate, validate_value},
    values::{FieldValue, FormValues},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("form has no field '{0}'")]
    UnknownField(String),
    #[error("field '{0}' is derived and cannot be edited")]
    ReadOnly(String),
}

/// What a single edit produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub field_id: String,
    /// Message of the first failing rule for the edited field.
    pub error: Option<String>,
    pub rule_error: Option<RuleError>,
    /// Derived fields whose value changed after this edit.
    pub derived_changed: Vec<String>,
    pub derivation_failures: Vec<DerivationFailure>,
}

/// One fill-in of a schema: owns the transient values and error messages.
#[derive(Debug, Clone)]
pub struct FormSession<'a> {
    schema: &'a FormSchema,
    options: EvalOptions,
    values: FormValues,
    errors: BTreeMap<String, String>,
}

impl<'a> FormSession<'a> {
    pub fn new(schema: &'a FormSchema) -> Self {
        Self::with_options(schema, EvalOptions::default())
    }

    pub fn with_options(schema: &'a FormSchema, options: EvalOptions) -> Self {
        let initial = FormValues::initial(&schema.fields);
        let values = derive_all_with(&schema.fields, &initial, &options).into_values();
        Self {
            schema,
            options,
            values,
            errors: BTreeMap::new(),
        }
    }

    /// Start from previously entered values; fields missing from `values`
    /// fall back to their defaults.
    pub fn with_values(schema: &'a FormSchema, values: FormValues, options: EvalOptions) -> Self {
        let mut seeded = FormValues::initial(&schema.fields);
        for (id, value) in values.iter() {
            seeded.set(id.clone(), value.clone());
        }
        let values = derive_all_with(&schema.fields, &seeded, &options).into_values();
        Self {
            schema,
            options,
            values,
            errors: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &FormSchema {
        self.schema
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Apply a user edit: store the value, validate the edited field, then
    /// recompute derived fields.
    pub fn set_value(
        &mut self,
        field_id: &str,
        value: impl Into<FieldValue>,
    ) -> Result<EditOutcome, SessionError> {
        let schema = self.schema;
        let field = schema
            .field(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.to_string()))?;
        if field.is_derived {
            return Err(SessionError::ReadOnly(field_id.to_string()));
        }

        self.values.set(field_id, value);

        let (error, rule_error) = match validate_value(field, &self.values) {
            Ok(message) => (message, None),
            Err(err) => (None, Some(err)),
        };
        match &error {
            Some(message) => {
                self.errors.insert(field_id.to_string(), message.clone());
            }
            None => {
                self.errors.remove(field_id);
            }
        }

        let derivation = derive_all_with(&schema.fields, &self.values, &self.options);
        let derived_changed = derivation.changed.clone();
        let derivation_failures = derivation.failures.clone();
        self.values = derivation.into_values();

        Ok(EditOutcome {
            field_id: field_id.to_string(),
            error,
            rule_error,
            derived_changed,
            derivation_failures,
        })
    }

    /// Validate every field; on success hand back the values.
    pub fn submit(&mut self) -> Result<FormValues, ValidationResult> {
        let result = validate(self.schema, &self.values);
        self.errors = result.errors.clone();
        if result.valid {
            tracing::info!(form = %self.schema.id, "form submitted");
            Ok(self.values.clone())
        } else {
            Err(result)
        }
    }

    pub fn render(&self) -> RenderPayload {
        build_render_payload(self.schema, &self.values, &self.errors)
    }
}
