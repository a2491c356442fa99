//! Portable document content model
//!
//! A document is an opaque tree of typed nodes. Authoring produces the tree;
//! this crate models it, extracts the interactive fields belonging to a
//! signer role, and resolves placeholder nodes (variables, role references,
//! signatures, conditionals) against the live variable and role sets.
//!
//! Resolution is pure: the same tree and context always produce the same
//! resolved output, and nothing in the context is mutated.

pub mod fields;
pub mod node;
pub mod resolve;
pub mod roles;
pub mod variables;
pub mod workflow;

pub use fields::{FieldOption, FieldResponseValue, FieldType, InteractiveFieldDef};
pub use node::{collect_fields_for_role, Node, Placeholder};
pub use resolve::{resolve, Resolution, ResolutionState, ResolveContext, ResolvedNode, RoleValue};
pub use roles::{FieldValue, RoleProperty, SignerRole};
pub use variables::{VariableDef, VariableKind, VariableMetadata};
pub use workflow::{
    NotificationConfig, NotificationScope, NotificationTrigger, OrderMode, TriggerSettings,
    WorkflowConfig, WorkflowConfigError, DEFAULT_PRE_SIGNING_TTL_DAYS,
};
