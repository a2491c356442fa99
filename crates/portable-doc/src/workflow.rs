//! Signing workflow configuration
//!
//! Governs notification and ordering semantics for a document's signing
//! workflow. Two notification triggers only make sense when signers sign
//! in a fixed sequence; `validate` rejects them under parallel order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default validity window for pre-signing access tokens, in days.
pub const DEFAULT_PRE_SIGNING_TTL_DAYS: u32 = 7;

/// Signing workflow configuration for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    pub order_mode: OrderMode,
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Pre-signing token validity in days; 0 means "use the default".
    #[serde(default)]
    pub pre_signing_ttl_days: u32,
}

/// Whether signers must sign in a fixed sequence or in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    Parallel,
    Sequential,
}

/// Notification settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    #[serde(default)]
    pub scope: NotificationScope,
    #[serde(default)]
    pub triggers: BTreeMap<NotificationTrigger, TriggerSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScope {
    #[default]
    Global,
    Individual,
}

/// Notification trigger points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTrigger {
    OnDocumentCreated,
    OnPreviousRolesSigned,
    OnTurnToSign,
    OnAllSignaturesComplete,
}

impl NotificationTrigger {
    /// Triggers that only make sense under sequential signing order.
    pub fn sequential_only(self) -> bool {
        matches!(
            self,
            NotificationTrigger::OnPreviousRolesSigned | NotificationTrigger::OnTurnToSign
        )
    }
}

/// Per-trigger enable flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerSettings {
    pub enabled: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum WorkflowConfigError {
    #[error("trigger {0:?} is only valid under sequential order mode")]
    SequentialOnlyTrigger(NotificationTrigger),
}

impl WorkflowConfig {
    /// Check that enabled triggers are valid for the configured order mode.
    pub fn validate(&self) -> Result<(), WorkflowConfigError> {
        if self.order_mode == OrderMode::Sequential {
            return Ok(());
        }
        for (trigger, settings) in &self.notifications.triggers {
            if settings.enabled && trigger.sequential_only() {
                return Err(WorkflowConfigError::SequentialOnlyTrigger(*trigger));
            }
        }
        Ok(())
    }

    /// Token validity in days, falling back to the default when unset.
    pub fn pre_signing_ttl_days(&self) -> u32 {
        if self.pre_signing_ttl_days == 0 {
            DEFAULT_PRE_SIGNING_TTL_DAYS
        } else {
            self.pre_signing_ttl_days
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            order_mode: OrderMode::Parallel,
            notifications: NotificationConfig::default(),
            pre_signing_ttl_days: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(order_mode: OrderMode, trigger: NotificationTrigger) -> WorkflowConfig {
        let mut triggers = BTreeMap::new();
        triggers.insert(trigger, TriggerSettings { enabled: true });
        WorkflowConfig {
            order_mode,
            notifications: NotificationConfig {
                scope: NotificationScope::Global,
                triggers,
            },
            pre_signing_ttl_days: 0,
        }
    }

    #[test]
    fn test_sequential_only_trigger_rejected_under_parallel() {
        let config = config_with(OrderMode::Parallel, NotificationTrigger::OnTurnToSign);
        assert_eq!(
            config.validate(),
            Err(WorkflowConfigError::SequentialOnlyTrigger(
                NotificationTrigger::OnTurnToSign
            ))
        );
    }

    #[test]
    fn test_sequential_only_trigger_allowed_under_sequential() {
        let config = config_with(
            OrderMode::Sequential,
            NotificationTrigger::OnPreviousRolesSigned,
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_universal_triggers_allowed_anywhere() {
        let config = config_with(OrderMode::Parallel, NotificationTrigger::OnDocumentCreated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_trigger_is_not_validated() {
        let mut config = config_with(OrderMode::Parallel, NotificationTrigger::OnTurnToSign);
        config
            .notifications
            .triggers
            .get_mut(&NotificationTrigger::OnTurnToSign)
            .unwrap()
            .enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttl_default() {
        let config = WorkflowConfig::default();
        assert_eq!(config.pre_signing_ttl_days(), DEFAULT_PRE_SIGNING_TTL_DAYS);

        let config = WorkflowConfig {
            pre_signing_ttl_days: 30,
            ..WorkflowConfig::default()
        };
        assert_eq!(config.pre_signing_ttl_days(), 30);
    }

    #[test]
    fn test_trigger_wire_names() {
        let json = serde_json::to_string(&NotificationTrigger::OnAllSignaturesComplete).unwrap();
        assert_eq!(json, r#""on_all_signatures_complete""#);
    }
}
