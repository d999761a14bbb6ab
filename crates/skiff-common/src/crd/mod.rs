//! CRD definitions for Skiff
//!
//! One CRD: [`SkiffApp`] — a replicated container app exposed on a stable
//! cluster-internal endpoint. The operator owns the status block; users own
//! the spec.

mod app;
mod types;

pub use app::{SkiffApp, SkiffAppSpec, SkiffAppStatus};
pub use types::{Condition, ConditionStatus, EnvVar, ResourceList, ResourceSpec};
