//! Signer role definitions
//!
//! A signer role is one participant slot in a document's signing workflow.
//! Its name and email are tagged values: either literal text or a reference
//! to a global variable, resolved when a concrete recipient is bound.

use serde::{Deserialize, Serialize};

/// One participant slot in the signing workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerRole {
    pub id: String,
    pub label: String,
    /// Signing sequence position (meaningful under sequential order mode).
    pub order: u32,
    pub name: FieldValue,
    pub email: FieldValue,
}

/// A literal value or a reference to a global variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Literal text entered by the author.
    Text(String),
    /// Reference to a global variable by its variable id.
    Injectable(String),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(v) | FieldValue::Injectable(v) => v.is_empty(),
        }
    }
}

/// Role-bound properties a document may reference.
///
/// This is a fixed registry: role placeholders always refer to one of these
/// properties, and their display labels are not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleProperty {
    Name,
    Email,
}

impl RoleProperty {
    /// Display label used when rendering a role placeholder.
    pub fn display_label(self) -> &'static str {
        match self {
            RoleProperty::Name => "Name",
            RoleProperty::Email => "Email",
        }
    }
}

/// Find a role by id in the live role list.
pub fn find_role<'a>(roles: &'a [SignerRole], role_id: &str) -> Option<&'a SignerRole> {
    roles.iter().find(|r| r.id == role_id)
}
