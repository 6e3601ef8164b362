//! Status conditions
//!
//! Mirrors the Kubernetes `metav1.Condition` shape. A resource carries at most
//! one condition per type; `set_condition` maintains that and only bumps
//! `lastTransitionTime` when the status or reason actually changes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The only condition type reported by the controller
pub const CONDITION_TYPE_READY: &str = "Ready";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Reason values used on the Ready condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyReason {
    /// Reconciliation started but the mapping has not been synced yet
    InProgress,
    /// The inventory record matches the desired mapping
    Succeeded,
    /// The last reconciliation failed; the message carries the error
    Failed,
}

impl ReadyReason {
    /// Reason string as written to the condition
    ///
    /// ```
    /// use crds::ReadyReason;
    ///
    /// assert_eq!(ReadyReason::Failed.as_str(), "Failed");
    /// assert_eq!(ReadyReason::Succeeded.status(), crds::ConditionStatus::True);
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            ReadyReason::InProgress => "InProgress",
            ReadyReason::Succeeded => "Succeeded",
            ReadyReason::Failed => "Failed",
        }
    }

    /// Condition status implied by this reason
    pub fn status(self) -> ConditionStatus {
        match self {
            ReadyReason::Succeeded => ConditionStatus::True,
            ReadyReason::InProgress | ReadyReason::Failed => ConditionStatus::False,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (e.g. "Ready")
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    /// Machine-readable reason in PascalCase
    pub reason: String,

    /// Human-readable detail; raw error text on failure
    #[serde(default)]
    pub message: String,

    pub last_transition_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Build a Ready condition stamped with the current time
    pub fn ready(reason: ReadyReason, message: impl Into<String>, observed_generation: Option<i64>) -> Self {
        Self {
            type_: CONDITION_TYPE_READY.to_string(),
            status: reason.status(),
            reason: reason.as_str().to_string(),
            message: message.into(),
            last_transition_time: Utc::now(),
            observed_generation,
        }
    }
}

/// Condition of type `type_`, if present
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Insert or update the condition of `new.type_`.
///
/// Keeps the existing `last_transition_time` unless status or reason changed,
/// and collapses any duplicate entries of the same type. Returns whether the
/// condition list changed.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) -> bool {
    let Some(index) = conditions.iter().position(|c| c.type_ == new.type_) else {
        conditions.push(new);
        return true;
    };

    let mut changed = false;
    let mut seen = false;
    conditions.retain(|c| {
        if c.type_ != new.type_ {
            return true;
        }
        let keep = !seen;
        seen = true;
        if !keep {
            changed = true;
        }
        keep
    });

    let existing = &mut conditions[index];
    if existing.status != new.status || existing.reason != new.reason {
        existing.status = new.status;
        existing.reason = new.reason;
        existing.last_transition_time = new.last_transition_time;
        changed = true;
    }
    if existing.message != new.message {
        existing.message = new.message;
        changed = true;
    }
    if existing.observed_generation != new.observed_generation {
        existing.observed_generation = new.observed_generation;
        changed = true;
    }
    changed
}
