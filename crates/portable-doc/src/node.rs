//! Document content tree
//!
//! The content tree is a closed set of typed nodes. Structural nodes carry
//! children; placeholder nodes carry the attributes resolution needs.
//! Dispatch over placeholder kinds is an explicit match on the tagged
//! union, never a runtime type-string lookup.

use serde::{Deserialize, Serialize};

use crate::fields::InteractiveFieldDef;
use crate::roles::RoleProperty;

/// A node in the document content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Document root.
    Doc {
        #[serde(default)]
        children: Vec<Node>,
    },
    Paragraph {
        #[serde(default)]
        children: Vec<Node>,
    },
    Text { text: String },
    Placeholder {
        #[serde(flatten)]
        placeholder: Placeholder,
    },
}

/// The closed set of placeholder kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placeholder {
    /// Reference to a global variable.
    Variable {
        #[serde(rename = "variableId")]
        variable_id: String,
        /// Label stored at insertion time; display falls back to it when
        /// the backing variable no longer exists.
        label: String,
        /// Per-node display format choice for format-bearing kinds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    /// Reference to a signer-role property (name/email).
    RoleInjectable {
        #[serde(rename = "roleId")]
        role_id: String,
        property: RoleProperty,
    },
    /// Signature anchor for one signer role.
    Signature {
        #[serde(rename = "roleId")]
        role_id: String,
    },
    /// Interactive form field.
    InteractiveField {
        #[serde(flatten)]
        field: InteractiveFieldDef,
    },
    /// Block shown or hidden based on a boolean variable.
    Conditional {
        #[serde(rename = "variableId")]
        variable_id: String,
        #[serde(default)]
        children: Vec<Node>,
    },
    /// Table populated from a table variable.
    Table {
        #[serde(rename = "variableId")]
        variable_id: String,
        label: String,
    },
    PageBreak,
}

impl Node {
    pub fn doc(children: Vec<Node>) -> Self {
        Node::Doc { children }
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Paragraph { children }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    pub fn placeholder(placeholder: Placeholder) -> Self {
        Node::Placeholder { placeholder }
    }

    /// Depth-first walk over the tree, including conditional children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        match self {
            Node::Doc { children } | Node::Paragraph { children } => {
                for child in children {
                    child.walk(visit);
                }
            }
            Node::Placeholder {
                placeholder: Placeholder::Conditional { children, .. },
            } => {
                for child in children {
                    child.walk(visit);
                }
            }
            _ => {}
        }
    }
}

/// Extract the interactive field definitions belonging to one signer role,
/// in document order. Fields owned by other roles are excluded: they are
/// rendered read-only for this viewer and never submitted.
pub fn collect_fields_for_role(root: &Node, role_id: &str) -> Vec<InteractiveFieldDef> {
    let mut fields = Vec::new();
    root.walk(&mut |node| {
        if let Node::Placeholder {
            placeholder: Placeholder::InteractiveField { field },
        } = node
        {
            if field.role_id == role_id {
                fields.push(field.clone());
            }
        }
    });
    fields
}
