//! Field response validation
//!
//! Two layers: [`validate_responses`] decides submit-readiness on the
//! client (which required fields block the submit), and
//! [`check_submission`] enforces per-response integrity on the server
//! (unknown fields, unknown options, radio cardinality).
//!
//! Submit-readiness runs on submit attempts only, never per keystroke;
//! [`InvalidFields`] carries the surfaced result and supports the
//! clearing rule: editing a field removes exactly that field's id.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use portable_doc::{FieldResponseValue, FieldType, InteractiveFieldDef};

use crate::session::FieldResponse;

/// In-memory response state, keyed by field id.
pub type ResponseMap = BTreeMap<String, FieldResponseValue>;

/// Decide which required fields block submission.
///
/// A field with `required == false` is never flagged regardless of
/// content. Order-independent; an empty set means ready to submit.
pub fn validate_responses(
    fields: &[InteractiveFieldDef],
    responses: &ResponseMap,
) -> BTreeSet<String> {
    let mut invalid = BTreeSet::new();

    for field in fields {
        if !field.required {
            continue;
        }
        let satisfied = responses
            .get(&field.id)
            .is_some_and(|response| response_satisfies(field, response));
        if !satisfied {
            invalid.insert(field.id.clone());
        }
    }

    invalid
}

fn response_satisfies(field: &InteractiveFieldDef, response: &FieldResponseValue) -> bool {
    match field.field_type {
        FieldType::Text => match response.text.as_deref() {
            None => false,
            Some(text) => {
                if text.trim().is_empty() {
                    return false;
                }
                // Boundary: length == max_length is valid; the limit is a
                // user-facing character budget, so count chars not bytes.
                field.max_length == 0 || text.chars().count() <= field.max_length
            }
        },
        FieldType::Checkbox | FieldType::Radio => !response.selected_option_ids.is_empty(),
    }
}

/// The surfaced invalid set, kept between submit attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidFields(BTreeSet<String>);

impl InvalidFields {
    /// Replace the whole set with a fresh validation result.
    pub fn replace(&mut self, ids: BTreeSet<String>) {
        self.0 = ids;
    }

    /// Clearing rule: editing a field removes exactly that field's id,
    /// without re-running validation on the others.
    pub fn clear_field(&mut self, field_id: &str) -> bool {
        self.0.remove(field_id)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn contains(&self, field_id: &str) -> bool {
        self.0.contains(field_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Server-side integrity failure for a submitted response set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("unknown field ID: {0}")]
    UnknownField(String),
    #[error("required field \"{label}\" ({id}) is missing")]
    MissingRequired { id: String, label: String },
    #[error("field \"{label}\" ({id}): invalid option ID: {option_id}")]
    UnknownOption {
        id: String,
        label: String,
        option_id: String,
    },
    #[error("field \"{label}\" ({id}): radio field must have at most one selected option")]
    RadioMultipleSelection { id: String, label: String },
    #[error("field \"{label}\" ({id}): text exceeds maximum length of {max_length} characters")]
    TextTooLong {
        id: String,
        label: String,
        max_length: usize,
    },
}

/// Validate a full submission against the field definitions for the
/// signer's role. Used by the server before persisting anything.
pub fn check_submission(
    fields: &[InteractiveFieldDef],
    responses: &[FieldResponse],
) -> Result<(), ResponseError> {
    let def_by_id: BTreeMap<&str, &InteractiveFieldDef> =
        fields.iter().map(|f| (f.id.as_str(), f)).collect();
    let submitted: BTreeSet<&str> = responses.iter().map(|r| r.field_id.as_str()).collect();

    for field in fields {
        if field.required && !submitted.contains(field.id.as_str()) {
            return Err(ResponseError::MissingRequired {
                id: field.id.clone(),
                label: field.label.clone(),
            });
        }
    }

    for response in responses {
        let Some(def) = def_by_id.get(response.field_id.as_str()) else {
            return Err(ResponseError::UnknownField(response.field_id.clone()));
        };
        check_single_response(def, &response.response)?;
    }

    Ok(())
}

fn check_single_response(
    def: &InteractiveFieldDef,
    value: &FieldResponseValue,
) -> Result<(), ResponseError> {
    match def.field_type {
        FieldType::Checkbox | FieldType::Radio => {
            if def.field_type == FieldType::Radio && value.selected_option_ids.len() > 1 {
                return Err(ResponseError::RadioMultipleSelection {
                    id: def.id.clone(),
                    label: def.label.clone(),
                });
            }
            let valid_ids: BTreeSet<&str> = def.options.iter().map(|o| o.id.as_str()).collect();
            for option_id in &value.selected_option_ids {
                if !valid_ids.contains(option_id.as_str()) {
                    return Err(ResponseError::UnknownOption {
                        id: def.id.clone(),
                        label: def.label.clone(),
                        option_id: option_id.clone(),
                    });
                }
            }
            Ok(())
        }
        FieldType::Text => {
            let length = value.text.as_deref().map_or(0, |t| t.chars().count());
            if def.max_length > 0 && length > def.max_length {
                return Err(ResponseError::TextTooLong {
                    id: def.id.clone(),
                    label: def.label.clone(),
                    max_length: def.max_length,
                });
            }
            Ok(())
        }
    }
}
