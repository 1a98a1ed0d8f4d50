//! Kubernetes NetworkPolicy to Calico policy conversion
//!
//! Converts Namespaces and ServiceAccounts into Calico Profiles and
//! Kubernetes NetworkPolicies into Calico NetworkPolicies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  NetworkPolicy conversion                    │
//! │                                                              │
//! │  rule entry ──► ports ──► ProtocolPortBundle ─┐              │
//! │      │                                         ▼              │
//! │      └────────► peers ──► peer ──► selector ──► rules ──► Rule│
//! │                                                              │
//! │  policy ──► converter ──► names (name + revision) ──► KVPair │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation is a pure function of its inputs and the immutable
//! [`ConverterConfig`](netpol_common::ConverterConfig); a [`PolicyConverter`]
//! can be shared across threads without locking.

#![warn(missing_docs)]

pub mod converter;
pub mod names;
pub mod peer;
pub mod pod;
pub mod ports;
pub mod rules;
pub mod selector;

pub use converter::{
    Converter, PolicyConversion, PolicyConverter, SkippedRule, WorkloadEndpointParser,
};
pub use peer::ResolvedPeer;
pub use ports::ProtocolPortBundle;
pub use rules::RuleDirection;
pub use selector::SelectorContext;
