//! Whole-resource conversion

use std::collections::BTreeMap;

use netpol_common::calico::{
    self, KVPair, PolicyType, Profile, ProfileSpec, ResourceKey, ResourceMeta, Rule,
    KIND_NETWORK_POLICY, KIND_PROFILE,
};
use netpol_common::k8s::{self, Namespace, ObjectMeta, Pod, ServiceAccount};
use netpol_common::{ConversionError, ConverterConfig, Result};
use tracing::warn;

use crate::names;
use crate::pod;
use crate::rules::{convert_rule, RuleDirection};
use crate::selector::{compile_selector, SelectorContext};

/// Parser for workload endpoint names
///
/// Endpoint naming belongs to the endpoint layer; the converter only
/// forwards requests and normalizes failures.
pub trait WorkloadEndpointParser {
    /// Parsed identifiers
    type Identifiers;
    /// Parser failure
    type Error: std::fmt::Display;

    /// Parse an endpoint name
    fn parse(&self, name: &str) -> std::result::Result<Self::Identifiers, Self::Error>;
}

/// A rule entry that could not be converted
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRule {
    /// Direction of the entry
    pub direction: RuleDirection,
    /// Index of the entry in the source policy
    pub index: usize,
    /// Why it was dropped
    pub error: ConversionError,
}

/// Result of converting a NetworkPolicy
///
/// Entries that fail to convert are dropped from the policy and listed in
/// `skipped`; the remaining entries still apply.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConversion {
    /// Converted policy
    pub policy: KVPair<calico::NetworkPolicy>,
    /// Dropped rule entries
    pub skipped: Vec<SkippedRule>,
}

impl PolicyConversion {
    /// True when every rule entry converted
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Kubernetes to Calico conversion
pub trait Converter {
    /// Active configuration
    fn config(&self) -> &ConverterConfig;

    /// Profile carrying a Namespace's labels and default allow rules
    fn namespace_to_profile(&self, ns: &Namespace) -> Result<KVPair<Profile>>;

    /// Profile carrying a ServiceAccount's labels
    fn service_account_to_profile(&self, sa: &ServiceAccount) -> Result<KVPair<Profile>>;

    /// Calico policy equivalent to a Kubernetes NetworkPolicy
    fn k8s_network_policy_to_calico(&self, np: &k8s::NetworkPolicy) -> PolicyConversion;

    /// Staged policy name for a staged Kubernetes NetworkPolicy
    fn staged_k8s_network_policy_to_staged_name(&self, staged_name: &str) -> String {
        format!("{}{}", self.config().network_policy_name_prefix, staged_name)
    }

    /// Namespace backing a profile
    fn profile_name_to_namespace(&self, profile_name: &str) -> Result<String> {
        names::profile_name_to_namespace(self.config(), profile_name)
    }

    /// Namespace and ServiceAccount backing a profile
    fn profile_name_to_service_account(&self, profile_name: &str) -> Result<(String, String)> {
        names::profile_name_to_service_account(self.config(), profile_name)
    }

    /// Revision of a policy built from a CRD policy and a Kubernetes policy
    fn join_network_policy_revisions(&self, crd_rev: &str, k8s_rev: &str) -> String {
        names::join_revisions(crd_rev, k8s_rev)
    }

    /// Split a policy revision into CRD and Kubernetes revisions
    fn split_network_policy_revision(&self, rev: &str) -> Result<(String, String)> {
        names::split_revision(rev)
    }

    /// Revision of a profile built from a Namespace and a ServiceAccount
    fn join_profile_revisions(&self, ns_rev: &str, sa_rev: &str) -> String {
        names::join_revisions(ns_rev, sa_rev)
    }

    /// Split a profile revision into Namespace and ServiceAccount revisions
    fn split_profile_revision(&self, rev: &str) -> Result<(String, String)> {
        names::split_revision(rev)
    }

    /// Parse a workload endpoint name with the endpoint layer's parser
    fn parse_workload_endpoint_name<P: WorkloadEndpointParser>(
        &self,
        parser: &P,
        name: &str,
    ) -> Result<P::Identifiers> {
        parser
            .parse(name)
            .map_err(|e| ConversionError::UnparseableIdentifier {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Pod should be shown as a workload endpoint
    fn is_valid_workload_endpoint(&self, pod: &Pod) -> bool {
        pod::is_valid_workload_endpoint(pod)
    }

    /// Pod is ready for networking
    fn is_ready_pod(&self, pod: &Pod) -> bool {
        pod::is_ready_pod(pod)
    }

    /// Pod is bound to a node
    fn is_scheduled(&self, pod: &Pod) -> bool {
        pod::is_scheduled(pod)
    }

    /// Pod uses host networking
    fn is_host_networked(&self, pod: &Pod) -> bool {
        pod::is_host_networked(pod)
    }

    /// Pod has an address
    fn has_ip_address(&self, pod: &Pod) -> bool {
        pod::has_ip_address(pod)
    }
}

/// Stateless converter
#[derive(Debug, Clone, Default)]
pub struct PolicyConverter {
    config: ConverterConfig,
}

impl PolicyConverter {
    /// Converter with default contract values
    pub fn new() -> Self {
        Self::default()
    }

    /// Converter with custom configuration
    pub fn with_config(config: ConverterConfig) -> Self {
        Self { config }
    }
}

impl Converter for PolicyConverter {
    fn config(&self) -> &ConverterConfig {
        &self.config
    }

    fn namespace_to_profile(&self, ns: &Namespace) -> Result<KVPair<Profile>> {
        let prefix = &self.config.namespace_label_prefix;
        let mut labels = prefixed_labels(prefix, &ns.metadata);
        // Lets namespace selectors match a namespace by name
        labels.insert(
            format!("{}{}", prefix, self.config.name_label),
            ns.metadata.name.clone(),
        );

        let name = names::namespace_profile_name(&self.config, &ns.metadata.name);
        let profile = Profile {
            metadata: source_meta(&name, &ns.metadata),
            spec: ProfileSpec {
                ingress: vec![Rule::allow_all()],
                egress: vec![Rule::allow_all()],
                labels_to_apply: labels,
            },
        };

        Ok(KVPair {
            key: ResourceKey::global(KIND_PROFILE, name),
            value: profile,
            revision: self.join_profile_revisions(&ns.metadata.resource_version, ""),
        })
    }

    fn service_account_to_profile(&self, sa: &ServiceAccount) -> Result<KVPair<Profile>> {
        let prefix = &self.config.service_account_label_prefix;
        let mut labels = prefixed_labels(prefix, &sa.metadata);
        labels.insert(
            format!("{}{}", prefix, self.config.name_label),
            sa.metadata.name.clone(),
        );

        let name = names::service_account_profile_name(
            &self.config,
            &sa.metadata.namespace,
            &sa.metadata.name,
        );
        let profile = Profile {
            metadata: source_meta(&name, &sa.metadata),
            spec: ProfileSpec {
                labels_to_apply: labels,
                ..Default::default()
            },
        };

        Ok(KVPair {
            key: ResourceKey::global(KIND_PROFILE, name),
            value: profile,
            revision: self.join_profile_revisions("", &sa.metadata.resource_version),
        })
    }

    fn k8s_network_policy_to_calico(&self, np: &k8s::NetworkPolicy) -> PolicyConversion {
        let name = format!(
            "{}{}",
            self.config.network_policy_name_prefix, np.metadata.name
        );
        let namespace = np.metadata.namespace.as_str();
        let mut skipped = Vec::new();

        let mut ingress = Vec::new();
        for (index, rule) in np.spec.ingress.iter().enumerate() {
            let converted =
                convert_rule(&self.config, RuleDirection::Ingress, &rule.from, &rule.ports, namespace);
            match converted {
                Ok(rules) => ingress.extend(rules),
                Err(error) => skipped.push(skip(&name, RuleDirection::Ingress, index, error)),
            }
        }

        let mut egress = Vec::new();
        for (index, rule) in np.spec.egress.iter().enumerate() {
            let converted =
                convert_rule(&self.config, RuleDirection::Egress, &rule.to, &rule.ports, namespace);
            match converted {
                Ok(rules) => egress.extend(rules),
                Err(error) => skipped.push(skip(&name, RuleDirection::Egress, index, error)),
            }
        }

        let types = policy_types(&name, &np.spec.policy_types, !egress.is_empty());

        let mut metadata = source_meta(&name, &np.metadata);
        metadata.namespace = np.metadata.namespace.clone();
        metadata.resource_version = np.metadata.resource_version.clone();

        let policy = calico::NetworkPolicy {
            metadata,
            spec: calico::NetworkPolicySpec {
                order: Some(self.config.policy_order),
                selector: compile_selector(
                    &self.config,
                    Some(&np.spec.pod_selector),
                    SelectorContext::Pod,
                ),
                ingress,
                egress,
                types,
            },
        };

        PolicyConversion {
            policy: KVPair {
                key: ResourceKey::namespaced(KIND_NETWORK_POLICY, name, namespace),
                value: policy,
                revision: np.metadata.resource_version.clone(),
            },
            skipped,
        }
    }
}

fn prefixed_labels(prefix: &str, meta: &ObjectMeta) -> BTreeMap<String, String> {
    meta.labels
        .iter()
        .map(|(k, v)| (format!("{}{}", prefix, k), v.clone()))
        .collect()
}

fn source_meta(name: &str, source: &ObjectMeta) -> ResourceMeta {
    ResourceMeta {
        name: name.to_string(),
        uid: source.uid.clone(),
        creation_timestamp: source.creation_timestamp,
        ..Default::default()
    }
}

fn skip(policy: &str, direction: RuleDirection, index: usize, error: ConversionError) -> SkippedRule {
    warn!(
        policy,
        ?direction,
        index,
        error = %error,
        "dropping k8s rule that couldn't be converted"
    );
    SkippedRule {
        direction,
        index,
        error,
    }
}

/// Directions a converted policy applies to
///
/// Clusters that predate `policyTypes` send none; those policies are
/// ingress only.
fn policy_types(policy: &str, declared: &[k8s::PolicyType], has_egress_rules: bool) -> Vec<PolicyType> {
    let ingress = declared.contains(&k8s::PolicyType::Ingress);
    let egress = declared.contains(&k8s::PolicyType::Egress);

    let mut types = Vec::new();
    if ingress {
        types.push(PolicyType::Ingress);
    }
    if egress {
        types.push(PolicyType::Egress);
    } else if has_egress_rules {
        warn!(policy, "K8s PolicyTypes don't include 'egress', but NetworkPolicy has egress rules");
    }

    if types.is_empty() {
        types.push(PolicyType::Ingress);
    }
    types
}
