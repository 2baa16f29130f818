use form_spec::{
    DerivationError, ExprError, FieldValue, FormSchema, FormSession, FormValues, derive_all,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn order_form() -> FormSchema {
    serde_json::from_str(include_str!("fixtures/order_form.json")).expect("deserialize")
}

#[test]
fn fixture_derives_on_session_start() {
    let schema = order_form();
    let session = FormSession::new(&schema);
    assert_eq!(session.values().get("f6"), Some(&FieldValue::text("9.5")));
    assert_eq!(
        session.values().get("f7"),
        Some(&FieldValue::text("1 item(s), standard"))
    );
}

#[test]
fn edits_flow_into_derived_fields() {
    let schema = order_form();
    let mut session = FormSession::new(&schema);

    let outcome = session.set_value("f5", true).expect("edit");
    assert_eq!(outcome.derived_changed, vec!["f7".to_string()]);
    assert_eq!(
        session.values().get("f7"),
        Some(&FieldValue::text("1 item(s), standard, gift wrapped"))
    );

    let outcome = session.set_value("f1", "3").expect("edit");
    assert_eq!(outcome.derived_changed, vec!["f6".to_string(), "f7".to_string()]);
    assert_eq!(session.values().get("f6"), Some(&FieldValue::text("28.5")));
}

#[test]
fn sum_of_numeric_strings_is_numeric() {
    let schema: FormSchema = serde_json::from_value(json!({
        "id": "sum",
        "title": "Sum",
        "createdAt": "2024-01-01T00:00:00Z",
        "fields": [
            { "id": "A", "name": "a", "label": "A", "type": "number" },
            { "id": "B", "name": "b", "label": "B", "type": "number" },
            {
                "id": "C", "name": "c", "label": "C", "type": "number",
                "isDerived": true,
                "parentFields": ["A", "B"],
                "derivationLogic": "values[0] + values[1]"
            }
        ]
    }))
    .expect("deserialize");

    let values = FormValues::from([("A", FieldValue::text("3")), ("B", FieldValue::text("4"))]);
    let first = derive_all(&schema.fields, &values);
    assert_eq!(first.values.get("C"), Some(&FieldValue::text("7")));

    let second = derive_all(&schema.fields, &first.values);
    assert_eq!(second.values, first.values);
    assert!(second.changed.is_empty());
}

#[test]
fn malformed_logic_does_not_block_other_fields() {
    let mut schema = order_form();
    let total = schema.fields.iter_mut().find(|field| field.id == "f6").unwrap();
    total.derivation_logic = Some("values[5]".into());

    let values = FormValues::initial(&schema.fields);
    let outcome = derive_all(&schema.fields, &values);
    assert_eq!(outcome.values.get("f6"), Some(&FieldValue::text("")));
    assert_eq!(
        outcome.values.get("f7"),
        Some(&FieldValue::text("1 item(s), standard"))
    );
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].field_id, "f6");
    assert_eq!(
        outcome.failures[0].error,
        DerivationError::Expression(ExprError::IndexOutOfBounds { index: 5, len: 2 })
    );
}

#[test]
fn reordering_fields_does_not_change_results() {
    let schema = order_form();
    let mut reversed = schema.clone();
    reversed.fields.reverse();

    let values = FormValues::initial(&schema.fields);
    assert_eq!(
        derive_all(&schema.fields, &values).values,
        derive_all(&reversed.fields, &values).values
    );
}
