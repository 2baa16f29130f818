use std::collections::BTreeSet;

use thiserror::Error;

use crate::expr::{EvalOptions, Expr, ExprError, Scalar};
use crate::spec::field::FieldDefinition;
use crate::values::{FieldValue, FormValues};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DerivationError {
    #[error("derivation logic is invalid: {0}")]
    Expression(#[from] ExprError),
    #[error("parent '{parent}' is itself derived; derivation chains are not supported")]
    DerivedParent { parent: String },
}

/// A derived field whose value could not be recomputed. Its previous value
/// is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationFailure {
    pub field_id: String,
    pub error: DerivationError,
}

/// A parent id with no value; the slot evaluates as empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingParent {
    pub field_id: String,
    pub parent_id: String,
}

/// Result of one derivation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub values: FormValues,
    /// Derived field ids whose value differs from the input, in field order.
    pub changed: Vec<String>,
    pub failures: Vec<DerivationFailure>,
    pub missing_parents: Vec<MissingParent>,
}

impl Derivation {
    pub fn into_values(self) -> FormValues {
        self.values
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Recompute every derived field from the current values of its parents.
pub fn derive_all(fields: &[FieldDefinition], current: &FormValues) -> Derivation {
    derive_all_with(fields, current, &EvalOptions::default())
}

pub fn derive_all_with(
    fields: &[FieldDefinition],
    current: &FormValues,
    options: &EvalOptions,
) -> Derivation {
    let derived_ids: BTreeSet<&str> = fields
        .iter()
        .filter(|field| field.is_derived)
        .map(|field| field.id.as_str())
        .collect();

    let mut outcome = Derivation {
        values: current.clone(),
        changed: Vec::new(),
        failures: Vec::new(),
        missing_parents: Vec::new(),
    };

    for field in fields.iter().filter(|field| field.is_derived) {
        let Some(logic) = field
            .derivation_logic
            .as_deref()
            .filter(|logic| !logic.trim().is_empty())
        else {
            continue;
        };
        if field.parent_fields.is_none() {
            continue;
        }

        match compute(field, logic, current, &derived_ids, options, &mut outcome) {
            Ok(value) => {
                if current.get(&field.id) != Some(&value) {
                    tracing::debug!(field = %field.id, ?value, "derived value changed");
                    outcome.values.set(field.id.clone(), value);
                    outcome.changed.push(field.id.clone());
                }
            }
            Err(error) => {
                tracing::warn!(field = %field.id, %error, "derived field kept its previous value");
                outcome.failures.push(DerivationFailure {
                    field_id: field.id.clone(),
                    error,
                });
            }
        }
    }

    outcome
}

fn compute(
    field: &FieldDefinition,
    logic: &str,
    current: &FormValues,
    derived_ids: &BTreeSet<&str>,
    options: &EvalOptions,
    outcome: &mut Derivation,
) -> Result<FieldValue, DerivationError> {
    // Parents are read from the input snapshot, so a derived parent would
    // make the pass order-dependent and break the fixpoint.
    if let Some(parent) = field
        .parents()
        .iter()
        .find(|parent| derived_ids.contains(parent.as_str()))
    {
        return Err(DerivationError::DerivedParent {
            parent: parent.clone(),
        });
    }

    let expr = Expr::parse_with(logic, options)?;
    let parent_values = field
        .parents()
        .iter()
        .map(|parent_id| match current.get(parent_id) {
            Some(value) => Scalar::from(value),
            None => {
                tracing::debug!(field = %field.id, parent = %parent_id, "parent value missing");
                outcome.missing_parents.push(MissingParent {
                    field_id: field.id.clone(),
                    parent_id: parent_id.clone(),
                });
                Scalar::Str(String::new())
            }
        })
        .collect::<Vec<_>>();

    Ok(expr.evaluate(&parent_values)?.into_field_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::field::FieldType;

    fn number(id: &str) -> FieldDefinition {
        FieldDefinition::new(id, id, id, FieldType::Number)
    }

    fn derived(id: &str, parents: &[&str], logic: &str) -> FieldDefinition {
        FieldDefinition::new(id, id, id, FieldType::Text).derived_from(parents, logic)
    }

    #[test]
    fn sums_numeric_parents() {
        let fields = vec![number("a"), number("b"), derived("sum", &["a", "b"], "values[0] + values[1]")];
        let values = FormValues::from([
            ("a", FieldValue::text("3")),
            ("b", FieldValue::text("4")),
        ]);

        let outcome = derive_all(&fields, &values);
        assert_eq!(outcome.values.get("sum"), Some(&FieldValue::text("7")));
        assert_eq!(outcome.changed, vec!["sum".to_string()]);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn parent_order_follows_the_parent_list() {
        let fields = vec![
            number("a"),
            number("b"),
            derived("diff", &["b", "a"], "values[0] - values[1]"),
        ];
        let values = FormValues::from([
            ("a", FieldValue::text("10")),
            ("b", FieldValue::text("4")),
        ]);
        let outcome = derive_all(&fields, &values);
        assert_eq!(outcome.values.get("diff"), Some(&FieldValue::text("-6")));
    }

    #[test]
    fn second_pass_is_a_fixpoint() {
        let fields = vec![number("a"), derived("double", &["a"], "values[0] * 2")];
        let values = FormValues::from([("a", FieldValue::text("21"))]);

        let first = derive_all(&fields, &values);
        let second = derive_all(&fields, &first.values);
        assert_eq!(first.values, second.values);
        assert!(!second.has_changes());
    }

    #[test]
    fn failure_keeps_previous_value_and_others_still_compute() {
        let fields = vec![
            number("a"),
            number("b"),
            derived("broken", &["a", "b"], "values[5]"),
            derived("sum", &["a", "b"], "values[0] + values[1]"),
        ];
        let values = FormValues::from([
            ("a", FieldValue::text("1")),
            ("b", FieldValue::text("2")),
            ("broken", FieldValue::text("stale")),
        ]);

        let outcome = derive_all(&fields, &values);
        assert_eq!(outcome.values.get("broken"), Some(&FieldValue::text("stale")));
        assert_eq!(outcome.values.get("sum"), Some(&FieldValue::text("3")));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(
            outcome.failures[0].error,
            DerivationError::Expression(ExprError::IndexOutOfBounds { index: 5, len: 2 })
        );
    }

    #[test]
    fn missing_parent_reads_as_empty_text() {
        let fields = vec![derived("greeting", &["ghost"], "'hi ' + values[0]")];
        let outcome = derive_all(&fields, &FormValues::new());
        assert_eq!(outcome.values.get("greeting"), Some(&FieldValue::text("hi ")));
        assert_eq!(
            outcome.missing_parents,
            vec![MissingParent {
                field_id: "greeting".into(),
                parent_id: "ghost".into(),
            }]
        );
    }

    #[test]
    fn derived_parents_are_refused() {
        let fields = vec![
            derived("x", &["y"], "values[0]"),
            derived("y", &["x"], "values[0]"),
        ];
        let values = FormValues::from([
            ("x", FieldValue::text("1")),
            ("y", FieldValue::text("2")),
        ]);
        let outcome = derive_all(&fields, &values);
        assert_eq!(outcome.values, values);
        assert_eq!(outcome.failures.len(), 2);
        assert!(matches!(
            outcome.failures[0].error,
            DerivationError::DerivedParent { .. }
        ));
    }

    #[test]
    fn fields_without_logic_or_parent_list_are_skipped() {
        let mut no_parent_list = derived("p", &[], "1 + 1");
        no_parent_list.parent_fields = None;
        let fields = vec![number("a"), no_parent_list, derived("q", &["a"], "  ")];
        let values = FormValues::from([("a", FieldValue::text("1"))]);
        let outcome = derive_all(&fields, &values);
        assert_eq!(outcome.values, values);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn empty_parent_list_still_evaluates() {
        let fields = vec![
            derived("constant", &[], "1 + 1"),
            derived("count", &[], "values.length"),
        ];
        let outcome = derive_all(&fields, &FormValues::new());
        assert_eq!(outcome.values.get("constant"), Some(&FieldValue::text("2")));
        assert_eq!(outcome.values.get("count"), Some(&FieldValue::text("0")));
        assert_eq!(outcome.changed, vec!["constant".to_string(), "count".to_string()]);
        assert!(outcome.failures.is_empty());
    }
}
