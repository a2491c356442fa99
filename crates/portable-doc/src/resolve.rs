//! Placeholder resolution
//!
//! Resolution maps a content tree plus the live variable/role sets to a
//! rendered tree. It is total: every placeholder resolves to something
//! displayable. A deleted variable or role produces an explicit
//! broken-reference state with a tombstone label, never a panic and never
//! a silent blank. Resolution never mutates the context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fields::{FieldResponseValue, FieldType, InteractiveFieldDef};
use crate::node::{Node, Placeholder};
use crate::roles::{find_role, FieldValue, RoleProperty, SignerRole};
use crate::variables::{find_variable, VariableDef, VariableKind};

/// Tombstone shown when a role placeholder's backing role was deleted.
pub const DELETED_ROLE_LABEL: &str = "(deleted role)";

/// Tombstone shown when a variable placeholder's backing variable was deleted.
pub const DELETED_VARIABLE_LABEL: &str = "(deleted variable)";

/// Concrete recipient values bound to a signer role.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoleValue {
    pub name: String,
    pub email: String,
}

/// Everything resolution reads. Owned by the caller for the lifetime of a
/// document session; resolution itself holds no state.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    pub variables: Vec<VariableDef>,
    pub roles: Vec<SignerRole>,
    /// Injected variable values, keyed by variable id.
    pub injected_values: BTreeMap<String, serde_json::Value>,
    /// Concrete recipient values, keyed by role id.
    pub role_values: BTreeMap<String, RoleValue>,
    /// Signer responses, keyed by field id.
    pub field_responses: BTreeMap<String, FieldResponseValue>,
}

/// A rendered node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedNode {
    Doc { children: Vec<ResolvedNode> },
    Paragraph { children: Vec<ResolvedNode> },
    Text { text: String },
    Resolved(Resolution),
}

/// How one placeholder rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Label text shown in the document (tombstone when broken).
    pub display: String,
    /// Concrete value, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Effective display format for format-bearing kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub state: ResolutionState,
    /// Resolved children (conditional blocks only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResolvedNode>,
    /// Whether a conditional block is visible; `None` when the backing
    /// boolean has no value yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

/// Whether a placeholder resolved cleanly or points at a deleted backing
/// definition. Broken placeholders must render a distinguishable warning
/// state rather than silently dropping the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Ok,
    Broken,
}

impl Resolution {
    fn ok(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            value: None,
            format: None,
            state: ResolutionState::Ok,
            children: Vec::new(),
            visible: None,
        }
    }

    fn broken(display: impl Into<String>) -> Self {
        Self {
            state: ResolutionState::Broken,
            ..Self::ok(display)
        }
    }
}

/// Resolve a content tree. Pure: identical inputs yield identical output.
pub fn resolve(root: &Node, ctx: &ResolveContext) -> ResolvedNode {
    match root {
        Node::Doc { children } => ResolvedNode::Doc {
            children: children.iter().map(|c| resolve(c, ctx)).collect(),
        },
        Node::Paragraph { children } => ResolvedNode::Paragraph {
            children: children.iter().map(|c| resolve(c, ctx)).collect(),
        },
        Node::Text { text } => ResolvedNode::Text { text: text.clone() },
        Node::Placeholder { placeholder } => {
            ResolvedNode::Resolved(resolve_placeholder(placeholder, ctx))
        }
    }
}

fn resolve_placeholder(placeholder: &Placeholder, ctx: &ResolveContext) -> Resolution {
    match placeholder {
        Placeholder::Variable {
            variable_id,
            label,
            format,
        } => resolve_variable(variable_id, label, format.as_deref(), ctx),
        Placeholder::RoleInjectable { role_id, property } => {
            resolve_role(role_id, *property, ctx)
        }
        Placeholder::Signature { role_id } => match find_role(&ctx.roles, role_id) {
            Some(role) => Resolution::ok(role.label.clone()),
            None => Resolution::broken(DELETED_ROLE_LABEL),
        },
        Placeholder::InteractiveField { field } => resolve_field(field, ctx),
        Placeholder::Conditional {
            variable_id,
            children,
        } => resolve_conditional(variable_id, children, ctx),
        Placeholder::Table { variable_id, label } => {
            match find_variable(&ctx.variables, variable_id) {
                Some(def) => Resolution::ok(def.label.clone()),
                None => {
                    let mut res = Resolution::broken(DELETED_VARIABLE_LABEL);
                    res.value = Some(label.clone());
                    res
                }
            }
        }
        Placeholder::PageBreak => Resolution::ok(""),
    }
}

fn resolve_variable(
    variable_id: &str,
    stored_label: &str,
    chosen_format: Option<&str>,
    ctx: &ResolveContext,
) -> Resolution {
    let Some(def) = find_variable(&ctx.variables, variable_id) else {
        // Keep the label stored at insertion time as the value so the
        // author can still tell which reference broke.
        let mut res = Resolution::broken(DELETED_VARIABLE_LABEL);
        res.value = Some(stored_label.to_string());
        return res;
    };

    let mut res = Resolution::ok(def.label.clone());
    res.value = ctx
        .injected_values
        .get(variable_id)
        .map(render_injected_value);
    if def.kind.has_formats() {
        res.format = def.effective_format(chosen_format).map(str::to_string);
    }
    res
}

fn resolve_role(role_id: &str, property: RoleProperty, ctx: &ResolveContext) -> Resolution {
    let Some(role) = find_role(&ctx.roles, role_id) else {
        return Resolution::broken(DELETED_ROLE_LABEL);
    };

    let mut res = Resolution::ok(format!("{}.{}", role.label, property.display_label()));
    res.value = role_property_value(role, property, ctx);
    res
}

/// The concrete value for a role property: a bound recipient wins, then a
/// literal authored value, then an injected variable the author pointed
/// the property at.
fn role_property_value(
    role: &SignerRole,
    property: RoleProperty,
    ctx: &ResolveContext,
) -> Option<String> {
    if let Some(bound) = ctx.role_values.get(&role.id) {
        let value = match property {
            RoleProperty::Name => &bound.name,
            RoleProperty::Email => &bound.email,
        };
        if !value.is_empty() {
            return Some(value.clone());
        }
    }

    let authored = match property {
        RoleProperty::Name => &role.name,
        RoleProperty::Email => &role.email,
    };
    match authored {
        FieldValue::Text(literal) if !literal.is_empty() => Some(literal.clone()),
        FieldValue::Text(_) => None,
        FieldValue::Injectable(variable_id) => ctx
            .injected_values
            .get(variable_id)
            .map(render_injected_value),
    }
}

fn resolve_field(field: &InteractiveFieldDef, ctx: &ResolveContext) -> Resolution {
    let mut res = Resolution::ok(field.label.clone());
    let Some(response) = ctx.field_responses.get(&field.id) else {
        return res;
    };

    res.value = match field.field_type {
        FieldType::Text => response.text.clone(),
        FieldType::Checkbox | FieldType::Radio => {
            let labels: Vec<&str> = field
                .options
                .iter()
                .filter(|opt| response.selected_option_ids.contains(&opt.id))
                .map(|opt| opt.label.as_str())
                .collect();
            if labels.is_empty() {
                None
            } else {
                Some(labels.join(", "))
            }
        }
    };
    res
}

fn resolve_conditional(
    variable_id: &str,
    children: &[Node],
    ctx: &ResolveContext,
) -> Resolution {
    let (display, state) = match find_variable(&ctx.variables, variable_id) {
        Some(def) => (def.label.clone(), ResolutionState::Ok),
        None => (DELETED_VARIABLE_LABEL.to_string(), ResolutionState::Broken),
    };

    Resolution {
        display,
        value: None,
        format: None,
        state,
        // Both branches stay walkable; visibility is a rendering concern.
        children: children.iter().map(|c| resolve(c, ctx)).collect(),
        visible: ctx
            .injected_values
            .get(variable_id)
            .and_then(serde_json::Value::as_bool),
    }
}

/// Render an injected JSON value as display text.
fn render_injected_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
