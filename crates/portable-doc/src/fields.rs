//! Interactive field definitions and response values
//!
//! Interactive fields are questions a signer answers before signing:
//! checkboxes, radio groups, and free text. Each field belongs to exactly
//! one signer role; viewers with a different role see it read-only and
//! never submit it.

use serde::{Deserialize, Serialize};

/// A field a signer must fill in before signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveFieldDef {
    /// Stable across reloads.
    pub id: String,
    pub field_type: FieldType,
    /// Owning signer role.
    pub role_id: String,
    /// Question or title shown to the signer.
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Choice fields only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Text fields only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Text fields only; 0 = unlimited.
    #[serde(default)]
    pub max_length: usize,
}

/// Field input types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Checkbox,
    Radio,
    Text,
}

impl FieldType {
    pub fn is_choice(self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::Radio)
    }
}

/// A single option in a checkbox or radio field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: String,
    pub label: String,
}

/// A signer's answer to one field.
///
/// Exactly one of the two members is meaningful per field type: choice
/// fields use `selected_option_ids`, text fields use `text`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResponseValue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_option_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FieldResponseValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            selected_option_ids: Vec::new(),
            text: Some(value.into()),
        }
    }

    pub fn selection<I, S>(option_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected_option_ids: option_ids.into_iter().map(Into::into).collect(),
            text: None,
        }
    }
}
