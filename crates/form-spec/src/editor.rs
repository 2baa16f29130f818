//! Editing operations on a [`FormSchema`] and the invariants they keep.

use std::collections::BTreeSet;
use std::fmt;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::expr::{EvalOptions, Expr};
use crate::spec::field::{FieldDefinition, FieldType, RuleKind};
use crate::spec::form::FormSchema;
use crate::validate::validate_field;

pub const NEW_FIELD_LABEL: &str = "New Field";
pub const UNTITLED_FORM: &str = "Untitled Form";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("no field at position {0}")]
    NoSuchIndex(usize),
    #[error("no field with id '{0}'")]
    NoSuchField(String),
    #[error("field ids cannot change ('{from}' -> '{to}')")]
    IdChanged { from: String, to: String },
    #[error("field '{0}' is not derived")]
    NotDerived(String),
    #[error("'{parent}' cannot be a parent of '{field}': {reason}")]
    IneligibleParent {
        field: String,
        parent: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Invariant violation reported by [`FormSchema::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub field_id: String,
    pub message: String,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_id, self.message)
    }
}

impl FormSchema {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: Uuid::new_v4().to_string(),
            title: if title.trim().is_empty() {
                UNTITLED_FORM.to_string()
            } else {
                title
            },
            fields: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a plain text field with a fresh id.
    pub fn add_field(&mut self) -> &mut FieldDefinition {
        let name = format!("field_{}", Utc::now().timestamp_millis());
        self.fields.push(FieldDefinition::new(
            Uuid::new_v4().to_string(),
            name,
            NEW_FIELD_LABEL,
            FieldType::Text,
        ));
        let last = self.fields.len() - 1;
        &mut self.fields[last]
    }

    /// Replace the field at `index`. The id must stay the same.
    pub fn update_field(&mut self, index: usize, field: FieldDefinition) -> Result<(), EditorError> {
        let slot = self
            .fields
            .get_mut(index)
            .ok_or(EditorError::NoSuchIndex(index))?;
        if slot.id != field.id {
            return Err(EditorError::IdChanged {
                from: slot.id.clone(),
                to: field.id,
            });
        }
        *slot = field;
        Ok(())
    }

    /// Remove the field at `index` and drop it from every parent list.
    pub fn delete_field(&mut self, index: usize) -> Result<FieldDefinition, EditorError> {
        if index >= self.fields.len() {
            return Err(EditorError::NoSuchIndex(index));
        }
        let removed = self.fields.remove(index);
        for field in &mut self.fields {
            if let Some(parents) = &mut field.parent_fields {
                parents.retain(|parent| parent != &removed.id);
            }
        }
        Ok(removed)
    }

    /// Swap the field with its neighbour. Returns `false` at the edges.
    pub fn move_field(&mut self, index: usize, direction: Direction) -> bool {
        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => index.checked_add(1),
        };
        match target {
            Some(target) if index < self.fields.len() && target < self.fields.len() => {
                self.fields.swap(index, target);
                true
            }
            _ => false,
        }
    }

    /// Switch a field between plain and derived, clearing the properties of
    /// the other kind.
    pub fn set_derived(&mut self, index: usize, derived: bool) -> Result<(), EditorError> {
        let field = self
            .fields
            .get_mut(index)
            .ok_or(EditorError::NoSuchIndex(index))?;
        field.is_derived = derived;
        if derived {
            field.default_value = None;
            field.validation.clear();
        } else {
            field.parent_fields = None;
            field.derivation_logic = None;
        }
        Ok(())
    }

    /// Plain fields other than the one at `index`, in display order.
    pub fn eligible_parents(&self, index: usize) -> impl Iterator<Item = &FieldDefinition> {
        let own_id = self.fields.get(index).map(|field| field.id.clone());
        self.fields
            .iter()
            .filter(move |field| !field.is_derived && Some(&field.id) != own_id.as_ref())
    }

    /// Add `parent_id` to the derived field's parents, or remove it if
    /// already present. New parents go to the end of the list.
    pub fn toggle_parent(&mut self, index: usize, parent_id: &str) -> Result<(), EditorError> {
        let field = self.fields.get(index).ok_or(EditorError::NoSuchIndex(index))?;
        if !field.is_derived {
            return Err(EditorError::NotDerived(field.id.clone()));
        }
        let ineligible = |reason: &'static str| EditorError::IneligibleParent {
            field: field.id.clone(),
            parent: parent_id.to_string(),
            reason,
        };
        if field.id == parent_id {
            return Err(ineligible("a field cannot derive from itself"));
        }
        match self.field(parent_id) {
            None => return Err(EditorError::NoSuchField(parent_id.to_string())),
            Some(parent) if parent.is_derived => {
                return Err(ineligible("derived fields cannot be parents"));
            }
            Some(_) => {}
        }

        let parents = self.fields[index].parent_fields.get_or_insert_with(Vec::new);
        if let Some(position) = parents.iter().position(|id| id == parent_id) {
            parents.remove(position);
        } else {
            parents.push(parent_id.to_string());
        }
        Ok(())
    }

    /// List every invariant violation in the schema.
    pub fn check(&self) -> Vec<SchemaIssue> {
        self.check_with(&EvalOptions::default())
    }

    pub fn check_with(&self, options: &EvalOptions) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        let mut seen = BTreeSet::new();
        let mut issue = |field: &FieldDefinition, message: String| {
            issues.push(SchemaIssue {
                field_id: field.id.clone(),
                message,
            })
        };

        for field in &self.fields {
            if !seen.insert(field.id.as_str()) {
                issue(field, "duplicate field id".into());
            }
            if field.options.as_ref().is_some_and(|options| !options.is_empty())
                && !field.kind.has_options()
            {
                issue(field, format!("options are ignored for type '{}'", field.kind.as_str()));
            }
            if field.kind == FieldType::Unknown {
                issue(field, "unknown field type; it will not be rendered".into());
            }

            if field.is_derived {
                if field.default_value.is_some() || !field.validation.is_empty() {
                    issue(field, "derived field carries a default value or validation rules".into());
                }
                for parent_id in field.parents() {
                    match self.field(parent_id) {
                        None => issue(field, format!("parent '{parent_id}' does not exist")),
                        Some(parent) if parent.id == field.id => {
                            issue(field, "field lists itself as a parent".into())
                        }
                        Some(parent) if parent.is_derived => {
                            issue(field, format!("parent '{parent_id}' is a derived field"))
                        }
                        Some(_) => {}
                    }
                }
                match field.derivation_logic.as_deref() {
                    Some(logic) if !logic.trim().is_empty() => {
                        if let Err(err) = Expr::parse_with(logic, options) {
                            issue(field, format!("derivation logic: {err}"));
                        }
                    }
                    _ => issue(field, "derived field has no derivation logic".into()),
                }
            } else {
                if field.parent_fields.as_ref().is_some_and(|parents| !parents.is_empty())
                    || field.derivation_logic.is_some()
                {
                    issue(field, "plain field carries derivation properties".into());
                }
                for rule in &field.validation {
                    // An empty string exercises every rule kind's argument.
                    if rule.kind != RuleKind::Required
                        && let Err(err) = validate_field("", std::slice::from_ref(rule))
                    {
                        issue(field, format!("rule {}: {err}", rule.kind.as_str()));
                    }
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::field::{RuleValue, ValidationRule};

    fn schema_with(fields: Vec<FieldDefinition>) -> FormSchema {
        let mut schema = FormSchema::new("Test");
        schema.fields = fields;
        schema
    }

    fn text(id: &str) -> FieldDefinition {
        FieldDefinition::new(id, id, id, FieldType::Text)
    }

    #[test]
    fn new_schema_and_fields_get_fresh_ids() {
        let mut schema = FormSchema::new("  ");
        assert_eq!(schema.title, UNTITLED_FORM);
        let first = schema.add_field().id.clone();
        let second = schema.add_field().id.clone();
        assert_ne!(first, second);
        assert_eq!(schema.fields[0].label, NEW_FIELD_LABEL);
        assert_eq!(schema.fields[0].kind, FieldType::Text);
    }

    #[test]
    fn update_keeps_ids_stable() {
        let mut schema = schema_with(vec![text("a")]);
        let mut renamed = text("a");
        renamed.label = "Alpha".into();
        schema.update_field(0, renamed).unwrap();
        assert_eq!(schema.fields[0].label, "Alpha");

        assert!(matches!(
            schema.update_field(0, text("b")),
            Err(EditorError::IdChanged { .. })
        ));
    }

    #[test]
    fn move_is_a_no_op_at_the_edges() {
        let mut schema = schema_with(vec![text("a"), text("b"), text("c")]);
        assert!(!schema.move_field(0, Direction::Up));
        assert!(!schema.move_field(2, Direction::Down));
        assert!(schema.move_field(0, Direction::Down));
        let order: Vec<_> = schema.fields.iter().map(|field| field.id.as_str()).collect();
        assert_eq!(order, ["b", "a", "c"]);
    }

    #[test]
    fn toggling_derived_clears_the_other_properties() {
        let mut schema = schema_with(vec![text("a"), text("b")]);
        schema.fields[1].default_value = Some("x".into());
        schema.set_derived(1, true).unwrap();
        assert_eq!(schema.fields[1].default_value, None);

        schema.toggle_parent(1, "a").unwrap();
        assert_eq!(schema.fields[1].parents(), ["a"]);
        schema.toggle_parent(1, "a").unwrap();
        assert!(schema.fields[1].parents().is_empty());

        schema.set_derived(1, false).unwrap();
        assert_eq!(schema.fields[1].parent_fields, None);
        assert_eq!(schema.fields[1].derivation_logic, None);
    }

    #[test]
    fn parents_must_be_other_plain_fields() {
        let mut schema = schema_with(vec![
            text("a"),
            text("d1").derived_from(&[], "1"),
            text("d2").derived_from(&[], "2"),
        ]);
        assert!(matches!(
            schema.toggle_parent(1, "d2"),
            Err(EditorError::IneligibleParent { .. })
        ));
        assert!(matches!(
            schema.toggle_parent(1, "d1"),
            Err(EditorError::IneligibleParent { .. })
        ));
        assert_eq!(
            schema.toggle_parent(0, "d1"),
            Err(EditorError::NotDerived("a".into()))
        );
        let eligible: Vec<_> = schema.eligible_parents(1).map(|field| field.id.as_str()).collect();
        assert_eq!(eligible, ["a"]);
    }

    #[test]
    fn deleting_a_field_prunes_parent_references() {
        let mut schema = schema_with(vec![
            text("a"),
            text("b"),
            text("sum").derived_from(&["a", "b"], "values[0] + values[1]"),
        ]);
        schema.delete_field(0).unwrap();
        assert_eq!(schema.fields[1].parents(), ["b"]);
        assert_eq!(schema.delete_field(9), Err(EditorError::NoSuchIndex(9)));
    }

    #[test]
    fn check_reports_invariant_violations() {
        let mut plain_with_logic = text("p");
        plain_with_logic.derivation_logic = Some("1".into());
        let mut bad_rule = text("r");
        bad_rule.validation = vec![ValidationRule::new(
            RuleKind::Pattern,
            Some(RuleValue::Text("(".into())),
            "bad",
        )];
        let schema = schema_with(vec![
            text("a"),
            text("a"),
            plain_with_logic,
            bad_rule,
            text("d").derived_from(&["a", "ghost"], "values[0] +"),
            text("e").derived_from(&["d"], "values[0]"),
        ]);

        let issues = schema.check();
        let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert!(messages.contains(&"a: duplicate field id".to_string()));
        assert!(messages.contains(&"p: plain field carries derivation properties".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("r: rule pattern:")));
        assert!(messages.contains(&"d: parent 'ghost' does not exist".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("d: derivation logic:")));
        assert!(messages.contains(&"e: parent 'd' is a derived field".to_string()));
    }

    #[test]
    fn clean_schema_has_no_issues() {
        let schema = schema_with(vec![
            text("a"),
            text("b"),
            text("sum").derived_from(&["a", "b"], "values[0] + values[1]"),
        ]);
        assert!(schema.check().is_empty());
    }
}
