//! Profile names and composite revisions
//!
//! Profiles backed by Kubernetes objects encode their owner in the name:
//! `kns.<namespace>` for Namespaces and `ksa.<namespace>.<name>` for
//! ServiceAccounts. Resources assembled from two Kubernetes objects carry a
//! revision of the form `<first>/<second>` so a stale write to either side
//! is detected.

use netpol_common::{ConversionError, ConverterConfig, Result};

/// Separator between the two halves of a composite revision
pub const REVISION_SEPARATOR: char = '/';

/// Namespace used for ServiceAccounts that report none
pub const DEFAULT_NAMESPACE: &str = "default";

/// Profile name for a Namespace
pub fn namespace_profile_name(config: &ConverterConfig, namespace: &str) -> String {
    format!("{}{}", config.namespace_profile_name_prefix, namespace)
}

/// Namespace backing a profile
pub fn profile_name_to_namespace(config: &ConverterConfig, profile_name: &str) -> Result<String> {
    profile_name
        .strip_prefix(config.namespace_profile_name_prefix.as_str())
        .map(str::to_string)
        .ok_or_else(|| ConversionError::NotBackedByNamespace(profile_name.to_string()))
}

/// Profile name for a ServiceAccount
///
/// The namespace is part of the name so profiles stay unique across
/// namespaces.
pub fn service_account_profile_name(
    config: &ConverterConfig,
    namespace: &str,
    service_account: &str,
) -> String {
    let namespace = if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    };
    format!(
        "{}{}.{}",
        config.service_account_profile_name_prefix, namespace, service_account
    )
}

/// Namespace and ServiceAccount backing a profile
///
/// The whole name is split on its first two dots: the ServiceAccount may
/// contain dots, the namespace may not.
pub fn profile_name_to_service_account(
    config: &ConverterConfig,
    profile_name: &str,
) -> Result<(String, String)> {
    if !profile_name.starts_with(config.service_account_profile_name_prefix.as_str()) {
        return Err(ConversionError::NotBackedByServiceAccount(
            profile_name.to_string(),
        ));
    }

    let parts: Vec<&str> = profile_name.splitn(3, '.').collect();
    match parts.as_slice() {
        [_, namespace, service_account] => {
            Ok((namespace.to_string(), service_account.to_string()))
        }
        _ => Err(ConversionError::MalformedProfileName(profile_name.to_string())),
    }
}

/// Join two revisions into a composite revision
pub fn join_revisions(first: &str, second: &str) -> String {
    format!("{}{}{}", first, REVISION_SEPARATOR, second)
}

/// Split a composite revision
///
/// An empty revision is the unset state and splits into two empty halves.
pub fn split_revision(revision: &str) -> Result<(String, String)> {
    if revision.is_empty() {
        return Ok((String::new(), String::new()));
    }

    let parts: Vec<&str> = revision.split(REVISION_SEPARATOR).collect();
    match parts.as_slice() {
        [first, second] => Ok((first.to_string(), second.to_string())),
        _ => Err(ConversionError::InvalidRevision(revision.to_string())),
    }
}
