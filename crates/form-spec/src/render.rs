use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::{
    spec::{
        field::{FieldDefinition, FieldType},
        form::FormSchema,
    },
    values::{FieldValue, FormValues},
};

/// Input affordance chosen for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Single-line input; carries the HTML input type.
    Input { input_type: &'static str },
    TextArea,
    Toggle,
    /// Dropdown (`select`) or radio group (`radio`).
    Choice { style: &'static str, options: Vec<String> },
    /// Computed value; never editable.
    Output,
}

impl Control {
    pub fn as_str(&self) -> &'static str {
        match self {
            Control::Input { .. } => "input",
            Control::TextArea => "textarea",
            Control::Toggle => "toggle",
            Control::Choice { .. } => "choice",
            Control::Output => "output",
        }
    }
}

/// Describes a single field for render outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderField {
    pub id: String,
    pub label: String,
    pub control: Control,
    pub required: bool,
    pub read_only: bool,
    pub placeholder: Option<String>,
    pub value: FieldValue,
    pub error: Option<String>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub form_id: String,
    pub form_title: String,
    pub fields: Vec<RenderField>,
    pub error_count: usize,
}

/// Pick the control for `field`. Fields of an unknown type render nothing.
pub fn render_field(
    field: &FieldDefinition,
    value: Option<&FieldValue>,
    error: Option<&str>,
) -> Option<RenderField> {
    let control = if field.is_derived {
        Control::Output
    } else {
        match field.kind {
            FieldType::Text | FieldType::Email | FieldType::Number | FieldType::Date => {
                Control::Input {
                    input_type: field.kind.as_str(),
                }
            }
            FieldType::Textarea => Control::TextArea,
            FieldType::Checkbox => Control::Toggle,
            FieldType::Select | FieldType::Radio => Control::Choice {
                style: if field.kind == FieldType::Select {
                    "compact"
                } else {
                    "expanded"
                },
                options: field.options.clone().unwrap_or_default(),
            },
            FieldType::Unknown => return None,
        }
    };

    Some(RenderField {
        id: field.id.clone(),
        label: field.label.clone(),
        read_only: field.is_derived,
        required: field.required && !field.is_derived,
        placeholder: field.placeholder.clone(),
        value: value
            .cloned()
            .unwrap_or_else(|| FieldValue::initial_for(field)),
        // Derived fields are never validated.
        error: error.filter(|_| !field.is_derived).map(str::to_string),
        control,
    })
}

/// Build the renderer payload from the schema, current values and errors.
pub fn build_render_payload(
    schema: &FormSchema,
    values: &FormValues,
    errors: &BTreeMap<String, String>,
) -> RenderPayload {
    let fields = schema
        .fields
        .iter()
        .filter_map(|field| {
            render_field(
                field,
                values.get(&field.id),
                errors.get(&field.id).map(String::as_str),
            )
        })
        .collect::<Vec<_>>();
    let error_count = fields.iter().filter(|field| field.error.is_some()).count();

    RenderPayload {
        form_id: schema.id.clone(),
        form_title: schema.title.clone(),
        fields,
        error_count,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(field.id.clone()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert(
                "control".into(),
                Value::String(field.control.as_str().to_string()),
            );
            match &field.control {
                Control::Input { input_type } => {
                    map.insert("input_type".into(), Value::String(input_type.to_string()));
                }
                Control::Choice { style, options } => {
                    map.insert("style".into(), Value::String(style.to_string()));
                    map.insert(
                        "options".into(),
                        Value::Array(options.iter().cloned().map(Value::String).collect()),
                    );
                }
                Control::TextArea | Control::Toggle | Control::Output => {}
            }
            map.insert("required".into(), Value::Bool(field.required));
            map.insert("read_only".into(), Value::Bool(field.read_only));
            if let Some(placeholder) = &field.placeholder {
                map.insert("placeholder".into(), Value::String(placeholder.clone()));
            }
            map.insert(
                "value".into(),
                serde_json::to_value(&field.value).unwrap_or(Value::Null),
            );
            if let Some(error) = &field.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "form_id": payload.form_id,
        "form_title": payload.form_title,
        "valid": payload.error_count == 0,
        "fields": fields,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {} ({})", payload.form_title, payload.form_id));

    for field in &payload.fields {
        let mut entry = format!(" - {} [{}]", field.label, describe_control(&field.control));
        if field.required {
            entry.push_str(" *");
        }
        if field.read_only {
            entry.push_str(" (computed)");
        }
        entry.push_str(&format!(" = {}", value_to_display(&field.value)));
        lines.push(entry);
        if let Some(error) = &field.error {
            lines.push(format!("   ! {}", error));
        }
    }

    if payload.error_count > 0 {
        lines.push(format!("{} field(s) need attention.", payload.error_count));
    }

    lines.join("\n")
}

fn describe_control(control: &Control) -> String {
    match control {
        Control::Input { input_type } => input_type.to_string(),
        Control::Choice { style, options } => format!("{}: {}", style, options.join(" | ")),
        other => other.as_str().to_string(),
    }
}

fn value_to_display(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) if text.is_empty() => "<empty>".to_string(),
        FieldValue::Text(text) => text.clone(),
        FieldValue::Bool(flag) => flag.to_string(),
        FieldValue::Unset => "<unset>".to_string(),
    }
}
