//! Property-based tests for content-tree resolution
//!
//! Resolution must be total and deterministic over arbitrary trees and
//! contexts: any placeholder renders to something, broken references
//! render as tombstones, and identical inputs give identical output.

use proptest::prelude::*;
use std::collections::BTreeMap;

use portable_doc::{
    resolve, FieldValue, Node, Placeholder, ResolveContext, SignerRole, VariableDef, VariableKind,
};

// ============================================================
// Strategies
// ============================================================

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{2,10}"
}

fn variable_def() -> impl Strategy<Value = VariableDef> {
    (ident(), "[A-Za-z ]{1,20}").prop_map(|(variable_id, label)| VariableDef {
        variable_id,
        label,
        kind: VariableKind::Text,
        metadata: None,
    })
}

fn role() -> impl Strategy<Value = SignerRole> {
    (ident(), "[A-Za-z ]{1,20}", 1u32..5).prop_map(|(id, label, order)| SignerRole {
        id,
        label,
        order,
        name: FieldValue::Text("Unnamed".to_string()),
        email: FieldValue::Text(String::new()),
    })
}

fn leaf_placeholder() -> impl Strategy<Value = Placeholder> {
    prop_oneof![
        (ident(), "[A-Za-z ]{1,20}").prop_map(|(variable_id, label)| Placeholder::Variable {
            variable_id,
            label,
            format: None,
        }),
        ident().prop_map(|role_id| Placeholder::Signature { role_id }),
        Just(Placeholder::PageBreak),
        (ident(), "[A-Za-z ]{1,20}").prop_map(|(variable_id, label)| Placeholder::Table {
            variable_id,
            label,
        }),
    ]
}

fn node_tree() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        "[A-Za-z ]{0,30}".prop_map(Node::text),
        leaf_placeholder().prop_map(Node::placeholder),
    ];
    leaf.prop_recursive(3, 24, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Node::paragraph),
            (ident(), prop::collection::vec(inner, 0..4)).prop_map(|(variable_id, children)| {
                Node::placeholder(Placeholder::Conditional {
                    variable_id,
                    children,
                })
            }),
        ]
    })
    .prop_map(|child| Node::doc(vec![child]))
}

fn context() -> impl Strategy<Value = ResolveContext> {
    (
        prop::collection::vec(variable_def(), 0..4),
        prop::collection::vec(role(), 0..3),
        prop::collection::btree_map(ident(), "[A-Za-z0-9 ]{0,15}", 0..4),
    )
        .prop_map(|(variables, roles, injected)| ResolveContext {
            variables,
            roles,
            injected_values: injected
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
            role_values: BTreeMap::new(),
            field_responses: BTreeMap::new(),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Resolution never fails, whatever the tree references.
    #[test]
    fn resolution_is_total(tree in node_tree(), ctx in context()) {
        let _ = resolve(&tree, &ctx);
    }

    // Same input, same output, byte for byte.
    #[test]
    fn resolution_is_deterministic(tree in node_tree(), ctx in context()) {
        let first = serde_json::to_string(&resolve(&tree, &ctx)).unwrap();
        let second = serde_json::to_string(&resolve(&tree, &ctx)).unwrap();
        prop_assert_eq!(first, second);
    }

    // A variable reference with no backing definition renders as a
    // tombstone carrying the label stored at insertion time.
    #[test]
    fn dangling_variable_keeps_stored_label(
        variable_id in ident(),
        label in "[A-Za-z ]{1,20}",
    ) {
        let tree = Node::doc(vec![Node::placeholder(Placeholder::Variable {
            variable_id,
            label: label.clone(),
            format: None,
        })]);
        let rendered = serde_json::to_value(resolve(&tree, &ResolveContext::default())).unwrap();
        let resolution = &rendered["children"][0];
        prop_assert_eq!(resolution["state"].as_str(), Some("broken"));
        prop_assert_eq!(resolution["value"].as_str(), Some(label.as_str()));
    }
}
