//! SkiffApp CRD types
//!
//! Defines `SkiffApp` — a replicated container app with a stable
//! cluster-internal endpoint. The operator derives a Deployment and a Service
//! from the spec and reports observed state back into the status block.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, EnvVar, ResourceSpec};

fn default_replicas() -> u32 {
    1
}

/// Replicated container app exposed on a cluster-internal endpoint
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "skiff.dev",
    version = "v1alpha1",
    kind = "SkiffApp",
    plural = "skiffapps",
    shortname = "ska",
    namespaced,
    status = "SkiffAppStatus",
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Available","type":"integer","jsonPath":".status.availableReplicas"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.serviceEndpoint"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SkiffAppSpec {
    /// Number of replicas to run (defaults to 1 when unset)
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Container image reference (required)
    pub image: String,

    /// Port the container listens on, exposed via the Service
    pub port: u16,

    /// Environment variables, in order; duplicate names are preserved
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Resource requests and limits
    #[serde(default, skip_serializing_if = "is_default_resources")]
    pub resources: ResourceSpec,
}

fn is_default_resources(r: &ResourceSpec) -> bool {
    *r == ResourceSpec::default()
}

impl SkiffAppSpec {
    /// Validate the spec before any cluster write
    ///
    /// Malformed specs are not retryable: the controller reports them and
    /// waits for the user to edit the record.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.image.trim().is_empty() {
            return Err(crate::Error::validation("image must not be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::validation("port must be non-zero"));
        }
        if i32::try_from(self.replicas).is_err() {
            return Err(crate::Error::validation(format!(
                "replicas {} exceeds the supported maximum",
                self.replicas
            )));
        }
        if let Some(requests) = &self.resources.requests {
            requests.validate("spec.resources.requests")?;
        }
        if let Some(limits) = &self.resources.limits {
            limits.validate("spec.resources.limits")?;
        }
        Ok(())
    }
}

/// Status of a SkiffApp, owned exclusively by the operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkiffAppStatus {
    /// Replicas currently available, copied from the Deployment observation
    #[serde(default)]
    pub available_replicas: i32,

    /// Stable endpoint address, derived as `name:port`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_endpoint: Option<String>,

    /// Current conditions, at most one entry per condition type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl SkiffAppStatus {
    /// Upsert a condition by type
    ///
    /// An existing condition of the same type is replaced in place, preserving
    /// list order. `lastTransitionTime` is carried over when the status value
    /// did not flip, so repeated observations of the same state compare equal
    /// and the caller can skip the status write entirely.
    pub fn upsert_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.type_ == condition.type_)
        {
            Some(existing) => {
                let last_transition_time = if existing.status == condition.status {
                    existing.last_transition_time
                } else {
                    condition.last_transition_time
                };
                *existing = Condition {
                    last_transition_time,
                    ..condition
                };
            }
            None => self.conditions.push(condition),
        }
    }

    /// Look up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}
