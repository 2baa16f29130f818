use form_spec::{
    FieldDefinition, FieldType, FieldValue, FormSchema, FormValues, RuleError, RuleKind,
    RuleValue, ValidationRule, validate, validate_field,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn order_form() -> FormSchema {
    serde_json::from_str(include_str!("fixtures/order_form.json")).expect("deserialize")
}

fn min_form() -> FormSchema {
    serde_json::from_value(json!({
        "id": "min-form",
        "title": "Minimum",
        "createdAt": "2024-01-01T00:00:00Z",
        "fields": [
            {
                "id": "f1",
                "name": "amount",
                "label": "Amount",
                "type": "number",
                "validation": [{ "type": "min", "value": 10, "message": "too small" }]
            }
        ]
    }))
    .expect("deserialize")
}

#[test]
fn min_rule_scenario() {
    let schema = min_form();

    let result = validate(&schema, &FormValues::from([("f1", FieldValue::text("5"))]));
    assert!(!result.valid);
    assert_eq!(result.errors.get("f1").map(String::as_str), Some("too small"));

    let result = validate(&schema, &FormValues::from([("f1", FieldValue::text("12"))]));
    assert!(result.valid);
    assert!(result.errors.is_empty());

    // An empty amount is zero, which is below the minimum.
    let result = validate(&schema, &FormValues::initial(&schema.fields));
    assert_eq!(result.errors.get("f1").map(String::as_str), Some("too small"));
}

#[test]
fn required_flag_and_pattern_on_the_fixture() {
    let schema = order_form();
    let mut values = FormValues::initial(&schema.fields);

    let result = validate(&schema, &values);
    assert_eq!(
        result.errors.get("f3").map(String::as_str),
        Some("This field is required")
    );

    values.set("f3", "not-an-email");
    let result = validate(&schema, &values);
    assert_eq!(
        result.errors.get("f3").map(String::as_str),
        Some("Invalid email format")
    );

    values.set("f3", "a@b.com");
    values.set("f1", "250");
    let result = validate(&schema, &values);
    assert_eq!(
        result.errors.get("f1").map(String::as_str),
        Some("At most 100 per order")
    );
    assert!(!result.errors.contains_key("f3"));
}

#[test]
fn derived_fields_are_never_validated() {
    let mut total = FieldDefinition::new("total", "total", "Total", FieldType::Number)
        .derived_from(&["a"], "values[0]");
    // Even if a rule slipped through, a derived field is exempt.
    total.validation = vec![ValidationRule::new(RuleKind::Required, None, "needed")];
    let schema = FormSchema {
        id: "d".into(),
        title: "Derived".into(),
        created_at: chrono::Utc::now(),
        fields: vec![FieldDefinition::new("a", "a", "A", FieldType::Text), total],
    };

    let result = validate(&schema, &FormValues::new());
    assert!(result.valid);
}

#[test]
fn broken_rule_is_contained_to_its_field() {
    let broken = FieldDefinition::new("b", "b", "B", FieldType::Text).with_rules(vec![
        ValidationRule::new(RuleKind::MinLength, Some(RuleValue::Text("many".into())), "x"),
    ]);
    let strict = FieldDefinition::new("s", "s", "S", FieldType::Text).with_rules(vec![
        ValidationRule::new(RuleKind::Required, None, "s is required"),
    ]);
    let schema = FormSchema {
        id: "r".into(),
        title: "Rules".into(),
        created_at: chrono::Utc::now(),
        fields: vec![broken, strict],
    };

    let result = validate(&schema, &FormValues::new());
    assert!(!result.valid);
    assert_eq!(
        result.rule_errors.get("b"),
        Some(&RuleError::NonNumericValue {
            kind: "minLength",
            value: "many".into()
        })
    );
    assert_eq!(result.errors.get("s").map(String::as_str), Some("s is required"));
}

#[test]
fn checkbox_required_means_checked() {
    let mut agree = FieldDefinition::new("agree", "agree", "Agree", FieldType::Checkbox);
    agree.required = true;
    let schema = FormSchema {
        id: "c".into(),
        title: "Consent".into(),
        created_at: chrono::Utc::now(),
        fields: vec![agree],
    };
    let values = FormValues::initial(&schema.fields);
    assert!(!validate(&schema, &values).valid);

    let values = FormValues::from([("agree", FieldValue::Bool(true))]);
    assert!(validate(&schema, &values).valid);
}

proptest! {
    #[test]
    fn first_failing_rule_message_is_returned(
        raw in "[a-z0-9 ]{0,12}",
        bounds in proptest::collection::vec(0usize..16, 1..6),
    ) {
        let rules: Vec<ValidationRule> = bounds
            .iter()
            .enumerate()
            .map(|(index, bound)| {
                ValidationRule::new(
                    RuleKind::MinLength,
                    Some(RuleValue::Number(*bound as f64)),
                    format!("rule {index}"),
                )
            })
            .collect();

        let len = raw.chars().count();
        let expected = bounds
            .iter()
            .position(|bound| len < *bound)
            .map(|index| format!("rule {index}"));

        prop_assert_eq!(validate_field(&raw, &rules), Ok(expected));
    }
}
