//! Converter configuration
//!
//! Label prefixes and name prefixes are part of the wire contract with the
//! policy dataplane: profiles, policies and selectors produced with one set of
//! values are only understood by consumers using the same set.

use serde::{Deserialize, Serialize};

use crate::{ConversionError, Result};

/// Prefix applied to labels inherited from a Namespace
pub const NAMESPACE_LABEL_PREFIX: &str = "pcns.";

/// Label key carrying the owner's name
pub const NAME_LABEL: &str = "projectcalico.org/name";

/// Prefix of profiles backed by a Namespace
pub const NAMESPACE_PROFILE_NAME_PREFIX: &str = "kns.";

/// Prefix applied to labels inherited from a ServiceAccount
pub const SERVICE_ACCOUNT_LABEL_PREFIX: &str = "pcsa.";

/// Prefix of profiles backed by a ServiceAccount
pub const SERVICE_ACCOUNT_PROFILE_NAME_PREFIX: &str = "ksa.";

/// Prefix of policies converted from a Kubernetes NetworkPolicy
pub const K8S_NETWORK_POLICY_NAME_PREFIX: &str = "knp.default.";

/// Label identifying the orchestrator that owns a workload
pub const LABEL_ORCHESTRATOR: &str = "projectcalico.org/orchestrator";

/// Orchestrator value for Kubernetes workloads
pub const ORCHESTRATOR_KUBERNETES: &str = "k8s";

/// Order assigned to every converted NetworkPolicy
pub const DEFAULT_POLICY_ORDER: f64 = 1000.0;

/// Annotation holding a pod's IP when the status has not caught up
pub const ANNOTATION_POD_IP: &str = "cni.projectcalico.org/podIP";

/// Annotation holding a pod's comma separated IPs
pub const ANNOTATION_POD_IPS: &str = "cni.projectcalico.org/podIPs";

/// Converter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConverterConfig {
    /// Prefix for labels inherited from a Namespace
    pub namespace_label_prefix: String,
    /// Label key carrying the owner's name
    pub name_label: String,
    /// Prefix for Namespace-backed profile names
    pub namespace_profile_name_prefix: String,
    /// Prefix for labels inherited from a ServiceAccount
    pub service_account_label_prefix: String,
    /// Prefix for ServiceAccount-backed profile names
    pub service_account_profile_name_prefix: String,
    /// Prefix for converted NetworkPolicy names
    pub network_policy_name_prefix: String,
    /// Orchestrator label key injected into pod selectors
    pub orchestrator_label: String,
    /// Orchestrator label value injected into pod selectors
    pub orchestrator_value: String,
    /// Order of converted policies
    pub policy_order: f64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            namespace_label_prefix: NAMESPACE_LABEL_PREFIX.to_string(),
            name_label: NAME_LABEL.to_string(),
            namespace_profile_name_prefix: NAMESPACE_PROFILE_NAME_PREFIX.to_string(),
            service_account_label_prefix: SERVICE_ACCOUNT_LABEL_PREFIX.to_string(),
            service_account_profile_name_prefix: SERVICE_ACCOUNT_PROFILE_NAME_PREFIX.to_string(),
            network_policy_name_prefix: K8S_NETWORK_POLICY_NAME_PREFIX.to_string(),
            orchestrator_label: LABEL_ORCHESTRATOR.to_string(),
            orchestrator_value: ORCHESTRATOR_KUBERNETES.to_string(),
            policy_order: DEFAULT_POLICY_ORDER,
        }
    }
}

impl ConverterConfig {
    /// Load configuration from JSON, filling omitted fields with defaults
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ConversionError::ConfigError(e.to_string()))
    }

    /// The selector clause that pins a pod selector to this orchestrator
    pub fn orchestrator_clause(&self) -> String {
        format!("{} == '{}'", self.orchestrator_label, self.orchestrator_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contract_values() {
        let config = ConverterConfig::default();
        assert_eq!(config.namespace_profile_name_prefix, "kns.");
        assert_eq!(config.service_account_profile_name_prefix, "ksa.");
        assert_eq!(config.policy_order, 1000.0);
        assert_eq!(
            config.orchestrator_clause(),
            "projectcalico.org/orchestrator == 'k8s'"
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ConverterConfig::from_json(r#"{"namespaceLabelPrefix": "kns.", "nameLabel": "name"}"#)
            .unwrap();
        assert_eq!(config.namespace_label_prefix, "kns.");
        assert_eq!(config.name_label, "name");
        assert_eq!(config.network_policy_name_prefix, "knp.default.");
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = ConverterConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConversionError::ConfigError(_)));
    }
}
