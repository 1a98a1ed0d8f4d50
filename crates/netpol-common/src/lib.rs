//! Shared types for Kubernetes to Calico policy conversion
//!
//! This crate holds the plain data on both sides of the conversion:
//! - [`k8s`]: Namespaces, ServiceAccounts, Pods and NetworkPolicies as read
//!   from the Kubernetes API
//! - [`calico`]: Profiles, NetworkPolicies and rules as consumed by the
//!   policy dataplane
//! - [`config`]: the label and name prefixes that form the wire contract
//! - [`error`]: the conversion error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calico;
pub mod config;
pub mod error;
pub mod k8s;

pub use config::ConverterConfig;
pub use error::*;
