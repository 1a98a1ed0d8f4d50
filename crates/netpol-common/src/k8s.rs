//! Kubernetes source objects
//!
//! Only the fields the converter reads are modelled. Field names follow the
//! Kubernetes JSON representation so objects can be deserialized straight
//! from API server payloads.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object metadata shared by every source kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name
    pub name: String,
    /// Namespace (empty for cluster scoped objects)
    pub namespace: String,
    /// Unique ID
    pub uid: String,
    /// Opaque version token
    pub resource_version: String,
    /// Creation time
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Labels
    pub labels: BTreeMap<String, String>,
    /// Annotations
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Metadata with a name and namespace
    pub fn named(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// Label selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelSelectorOperator {
    /// Label value is one of the listed values
    In,
    /// Label value is none of the listed values
    NotIn,
    /// Label is present
    Exists,
    /// Label is absent
    DoesNotExist,
}

/// One match expression of a label selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    /// Label key
    pub key: String,
    /// Operator
    pub operator: LabelSelectorOperator,
    /// Values for In / NotIn
    #[serde(default)]
    pub values: Vec<String>,
}

impl LabelSelectorRequirement {
    /// Build a requirement
    pub fn new(key: impl Into<String>, operator: LabelSelectorOperator, values: &[&str]) -> Self {
        Self {
            key: key.into(),
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Kubernetes label selector
///
/// All terms are ANDed. A selector with no terms selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelSelector {
    /// Exact label matches
    pub match_labels: BTreeMap<String, String>,
    /// Set based requirements, evaluated in order
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// Selector from exact label matches
    pub fn from_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            match_expressions: Vec::new(),
        }
    }

    /// True when the selector carries no terms
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }
}

/// Integer or string, as used for Kubernetes port fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    /// Numeric value
    Int(i32),
    /// String value
    String(String),
}

impl fmt::Display for IntOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for IntOrString {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for IntOrString {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// IP block peer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpBlock {
    /// Allowed range
    pub cidr: String,
    /// Ranges carved out of `cidr`
    pub except: Vec<String>,
}

/// NetworkPolicy peer
///
/// When `ip_block` is set the selectors are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkPolicyPeer {
    /// Pods matched by label
    pub pod_selector: Option<LabelSelector>,
    /// Namespaces matched by label
    pub namespace_selector: Option<LabelSelector>,
    /// Address range
    pub ip_block: Option<IpBlock>,
}

impl NetworkPolicyPeer {
    /// Peer selecting pods by label
    pub fn pods(selector: LabelSelector) -> Self {
        Self {
            pod_selector: Some(selector),
            ..Default::default()
        }
    }

    /// Peer selecting namespaces by label
    pub fn namespaces(selector: LabelSelector) -> Self {
        Self {
            namespace_selector: Some(selector),
            ..Default::default()
        }
    }

    /// Peer matching an address range
    pub fn ip_block(cidr: impl Into<String>, except: &[&str]) -> Self {
        Self {
            ip_block: Some(IpBlock {
                cidr: cidr.into(),
                except: except.iter().map(|e| e.to_string()).collect(),
            }),
            ..Default::default()
        }
    }
}

/// NetworkPolicy port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicyPort {
    /// Protocol name, e.g. "TCP"
    pub protocol: Option<String>,
    /// Port number or name
    pub port: Option<IntOrString>,
}

impl NetworkPolicyPort {
    /// Port with an explicit protocol
    pub fn new(protocol: Option<&str>, port: Option<IntOrString>) -> Self {
        Self {
            protocol: protocol.map(str::to_string),
            port,
        }
    }
}

/// Ingress rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicyIngressRule {
    /// Allowed sources (empty = any)
    pub from: Vec<NetworkPolicyPeer>,
    /// Allowed destination ports (empty = any)
    pub ports: Vec<NetworkPolicyPort>,
}

/// Egress rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicyEgressRule {
    /// Allowed destinations (empty = any)
    pub to: Vec<NetworkPolicyPeer>,
    /// Allowed destination ports (empty = any)
    pub ports: Vec<NetworkPolicyPort>,
}

/// Policy direction named in `policyTypes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyType {
    /// Incoming traffic
    Ingress,
    /// Outgoing traffic
    Egress,
}

/// NetworkPolicy spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkPolicySpec {
    /// Pods the policy applies to
    pub pod_selector: LabelSelector,
    /// Ingress rules
    pub ingress: Vec<NetworkPolicyIngressRule>,
    /// Egress rules
    pub egress: Vec<NetworkPolicyEgressRule>,
    /// Directions the policy applies to (may be empty on old clusters)
    pub policy_types: Vec<PolicyType>,
}

/// Kubernetes NetworkPolicy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicy {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: NetworkPolicySpec,
}

/// Kubernetes Namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespace {
    /// Metadata
    pub metadata: ObjectMeta,
}

/// Kubernetes ServiceAccount
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceAccount {
    /// Metadata
    pub metadata: ObjectMeta,
}

/// Pod lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    /// Accepted, not all containers running
    Pending,
    /// Bound to a node, containers running
    Running,
    /// All containers exited successfully
    Succeeded,
    /// All containers exited, at least one failed
    Failed,
    /// Documented terminal phase not always present in the API
    Completed,
    /// State could not be obtained
    Unknown,
}

/// Pod spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodSpec {
    /// Node the pod is scheduled to
    pub node_name: String,
    /// Uses the host's network namespace
    pub host_network: bool,
}

/// One pod IP entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodIp {
    /// Address
    pub ip: String,
}

/// Pod status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodStatus {
    /// Lifecycle phase
    pub phase: Option<PodPhase>,
    /// Primary IP
    #[serde(rename = "podIP")]
    pub pod_ip: String,
    /// All IPs (at most one per family)
    #[serde(rename = "podIPs")]
    pub pod_ips: Vec<PodIp>,
}

/// Kubernetes Pod
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pod {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: PodSpec,
    /// Status
    pub status: PodStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_policy_from_json() {
        let raw = r#"{
            "metadata": {"name": "allow-web", "namespace": "prod", "resourceVersion": "42"},
            "spec": {
                "podSelector": {"matchLabels": {"app": "web"}},
                "ingress": [{
                    "from": [{"ipBlock": {"cidr": "10.0.0.0/8", "except": ["10.1.0.0/16"]}}],
                    "ports": [{"protocol": "UDP", "port": 53}, {"port": "http"}]
                }],
                "policyTypes": ["Ingress"]
            }
        }"#;

        let np: NetworkPolicy = serde_json::from_str(raw).unwrap();
        assert_eq!(np.metadata.resource_version, "42");
        assert_eq!(np.spec.pod_selector.match_labels["app"], "web");
        let rule = &np.spec.ingress[0];
        assert_eq!(rule.from[0].ip_block.as_ref().unwrap().except, vec!["10.1.0.0/16"]);
        assert_eq!(rule.ports[0].port, Some(IntOrString::Int(53)));
        assert_eq!(rule.ports[1].port, Some(IntOrString::from("http")));
        assert_eq!(np.spec.policy_types, vec![PolicyType::Ingress]);
    }

    #[test]
    fn test_pod_status_ip_fields() {
        let raw = r#"{"status": {"phase": "Running", "podIP": "10.0.0.5", "podIPs": [{"ip": "10.0.0.5"}]}}"#;
        let pod: Pod = serde_json::from_str(raw).unwrap();
        assert_eq!(pod.status.phase, Some(PodPhase::Running));
        assert_eq!(pod.status.pod_ip, "10.0.0.5");
        assert_eq!(pod.status.pod_ips.len(), 1);
    }

    #[test]
    fn test_empty_selector() {
        assert!(LabelSelector::default().is_empty());
        assert!(!LabelSelector::from_labels([("a", "b")]).is_empty());
    }
}
