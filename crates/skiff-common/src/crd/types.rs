//! Supporting types for the SkiffApp CRD

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single environment variable entry
///
/// Entries are an ordered list, not a map: order is preserved as written and
/// duplicate names are kept, never merged.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct EnvVar {
    /// Variable name (need not be unique within the list)
    pub name: String,
    /// Variable value
    pub value: String,
}

/// Resource requests and limits for the app container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// Requested resources (scheduling floor)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceList>,

    /// Resource limits (enforcement ceiling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceList>,
}

/// CPU and memory quantities, each independently optional
///
/// An unset or empty quantity means "not declared" — it is omitted from the
/// built workload entirely rather than rendered as zero.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ResourceList {
    /// CPU quantity string (e.g., "500m", "2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity string (e.g., "128Mi", "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ResourceList {
    /// The CPU quantity, treating an empty string as unset
    pub fn cpu_quantity(&self) -> Option<&str> {
        self.cpu.as_deref().filter(|s| !s.is_empty())
    }

    /// The memory quantity, treating an empty string as unset
    pub fn memory_quantity(&self) -> Option<&str> {
        self.memory.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns true if neither CPU nor memory is declared
    pub fn is_empty(&self) -> bool {
        self.cpu_quantity().is_none() && self.memory_quantity().is_none()
    }

    /// Validate declared quantity strings against the Kubernetes grammar
    pub fn validate(&self, field_prefix: &str) -> Result<(), crate::Error> {
        if let Some(cpu) = self.cpu_quantity() {
            validate_quantity(cpu).map_err(|msg| {
                crate::Error::validation_for_field(
                    crate::error::UNKNOWN_CONTEXT,
                    format!("{field_prefix}.cpu"),
                    msg,
                )
            })?;
        }
        if let Some(memory) = self.memory_quantity() {
            validate_quantity(memory).map_err(|msg| {
                crate::Error::validation_for_field(
                    crate::error::UNKNOWN_CONTEXT,
                    format!("{field_prefix}.memory"),
                    msg,
                )
            })?;
        }
        Ok(())
    }
}

/// Valid Kubernetes quantity suffixes, two-character suffixes first so that
/// "Gi" is not misread as a bare "G" with a trailing 'i'.
const QUANTITY_SUFFIXES: [&str; 13] = [
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "m", "k", "M", "G", "T", "P", "E",
];

/// Validate a Kubernetes quantity string: a non-negative decimal number with
/// an optional SI or binary suffix.
///
/// Quantities are kept as strings on the wire; this check surfaces malformed
/// values at admission into the reconcile loop instead of letting the API
/// server reject the built workload later.
pub fn validate_quantity(value: &str) -> Result<(), String> {
    let number = QUANTITY_SUFFIXES
        .iter()
        .find_map(|suffix| value.strip_suffix(suffix))
        .unwrap_or(value);

    if number.is_empty() {
        return Err(format!("invalid quantity {value:?}: missing numeric part"));
    }
    let mut dots = 0;
    for c in number.chars() {
        match c {
            '0'..='9' => {}
            '.' => dots += 1,
            _ => return Err(format!("invalid quantity {value:?}: unexpected character {c:?}")),
        }
    }
    if dots > 1 || number == "." {
        return Err(format!("invalid quantity {value:?}: malformed number"));
    }
    Ok(())
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
///
/// Conditions live in an ordered list keyed by `type`; re-observation of a
/// type updates the existing entry in place (see
/// [`SkiffAppStatus::upsert_condition`](super::SkiffAppStatus::upsert_condition)).
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Available)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition's status changed
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}
