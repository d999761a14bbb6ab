//! Common types for Skiff: the SkiffApp CRD, conditions, and errors

#![deny(missing_docs)]

pub mod crd;
pub mod error;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label key identifying which app a managed resource belongs to
pub const LABEL_APP: &str = "skiff.dev/app";

/// Label key marking resources as operator-managed
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for [`LABEL_MANAGED_BY`] on everything the operator creates
pub const MANAGED_BY_SKIFF: &str = "skiff-operator";

/// Field manager string for server-side apply and status patches
pub const FIELD_MANAGER: &str = "skiff-operator";
