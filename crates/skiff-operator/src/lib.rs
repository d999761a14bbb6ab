//! Skiff operator library
//!
//! Reconciles [`skiff_common::crd::SkiffApp`] records into a Deployment and a
//! ClusterIP Service, and reports observed state back onto the record's
//! status subresource.

pub mod controller;
pub mod endpoint;
pub mod ownership;
pub mod runner;
pub mod workload;

pub use skiff_common::{crd, Error};
