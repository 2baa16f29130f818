#![allow(missing_docs)]

pub mod derive;
pub mod editor;
pub mod expr;
pub mod render;
pub mod session;
pub mod spec;
pub mod store;
pub mod validate;
pub mod values;

pub use derive::{Derivation, DerivationError, DerivationFailure, MissingParent, derive_all, derive_all_with};
pub use editor::{Direction, EditorError, SchemaIssue};
pub use expr::{EvalOptions, Expr, ExprError, Scalar};
pub use render::{
    Control, RenderField, RenderPayload, build_render_payload, render_field, render_json_ui,
    render_text,
};
pub use session::{EditOutcome, FormSession, SessionError};
pub use spec::{FieldDefinition, FieldType, FormSchema, RuleKind, RuleValue, ValidationRule};
pub use store::{FormLibrary, FormStore, JsonFileStore, MemoryStore, StoreError};
pub use validate::{RuleError, ValidationResult, validate, validate_field};
pub use values::{FieldValue, FormValues};

/// JSON Schema describing the persisted [`FormSchema`] document.
pub fn form_json_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(FormSchema)).unwrap_or_default()
}
