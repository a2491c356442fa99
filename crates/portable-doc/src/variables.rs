//! Global variable definitions
//!
//! Variables are workspace-scoped, typed placeholders. Format-bearing kinds
//! (date, currency, number) may carry metadata describing the display
//! formats an author can choose from, with a designated default.

use serde::{Deserialize, Serialize};

/// A named, typed placeholder definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDef {
    pub variable_id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: VariableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VariableMetadata>,
}

/// Variable data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableKind {
    Text,
    Number,
    Date,
    Currency,
    Boolean,
    Image,
    Table,
    RoleText,
}

impl VariableKind {
    /// Whether this kind supports configurable display formats.
    pub fn has_formats(self) -> bool {
        matches!(
            self,
            VariableKind::Date | VariableKind::Currency | VariableKind::Number
        )
    }
}

/// Format configuration for format-bearing variable kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableMetadata {
    /// Available display format strings.
    #[serde(default)]
    pub formats: Vec<String>,
    /// Designated default, used when a node stores no per-node choice.
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_format: Option<String>,
}

impl VariableDef {
    /// The format to render with: the per-node choice when present,
    /// otherwise the metadata default.
    pub fn effective_format<'a>(&'a self, chosen: Option<&'a str>) -> Option<&'a str> {
        chosen.or_else(|| {
            self.metadata
                .as_ref()
                .and_then(|m| m.default_format.as_deref())
        })
    }
}

/// Find a variable by id.
pub fn find_variable<'a>(variables: &'a [VariableDef], variable_id: &str) -> Option<&'a VariableDef> {
    variables.iter().find(|v| v.variable_id == variable_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_var() -> VariableDef {
        VariableDef {
            variable_id: "var-date".to_string(),
            label: "Start date".to_string(),
            kind: VariableKind::Date,
            metadata: Some(VariableMetadata {
                formats: vec!["DD/MM/YYYY".to_string(), "YYYY-MM-DD".to_string()],
                default_format: Some("DD/MM/YYYY".to_string()),
            }),
        }
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&VariableKind::RoleText).unwrap();
        assert_eq!(json, r#""ROLE_TEXT""#);
        let back: VariableKind = serde_json::from_str(r#""CURRENCY""#).unwrap();
        assert_eq!(back, VariableKind::Currency);
    }

    #[test]
    fn test_effective_format_prefers_node_choice() {
        let var = date_var();
        assert_eq!(var.effective_format(Some("YYYY-MM-DD")), Some("YYYY-MM-DD"));
    }

    #[test]
    fn test_effective_format_falls_back_to_default() {
        let var = date_var();
        assert_eq!(var.effective_format(None), Some("DD/MM/YYYY"));
    }

    #[test]
    fn test_effective_format_without_metadata() {
        let var = VariableDef {
            variable_id: "var-text".to_string(),
            label: "Notes".to_string(),
            kind: VariableKind::Text,
            metadata: None,
        };
        assert_eq!(var.effective_format(None), None);
    }
}
