pub mod field;
pub mod form;

pub use field::{FieldDefinition, FieldType, RuleKind, RuleValue, ValidationRule};
pub use form::FormSchema;
