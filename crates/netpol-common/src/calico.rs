//! Calico target resources
//!
//! Converted resources are handed to the storage layer wrapped in a
//! [`KVPair`] that carries the resource key and an opaque revision.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{ConversionError, Result};

/// Kind tag of profiles
pub const KIND_PROFILE: &str = "Profile";

/// Kind tag of network policies
pub const KIND_NETWORK_POLICY: &str = "NetworkPolicy";

/// Rule action
///
/// Kubernetes NetworkPolicy only expresses allow rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Action {
    /// Allow traffic
    #[default]
    Allow,
}

/// Numeric or string field as written by the dataplane
#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Num(u64),
    Str(String),
}

/// IP protocol
///
/// Numbered protocols are written as JSON numbers, named ones as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// SCTP
    Sctp,
    /// ICMP
    Icmp,
    /// ICMPv6
    IcmpV6,
    /// UDP-Lite
    UdpLite,
    /// Protocol number
    Number(u8),
    /// Any other protocol name, kept verbatim
    Named(String),
}

impl Protocol {
    /// Parse a protocol name or number
    ///
    /// Never fails: unknown names are kept so the dataplane can reject them.
    pub fn from_name(name: &str) -> Self {
        if let Ok(num) = name.parse::<u8>() {
            return Self::Number(num);
        }
        match name.to_ascii_lowercase().as_str() {
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            "sctp" => Self::Sctp,
            "icmp" => Self::Icmp,
            "icmpv6" => Self::IcmpV6,
            "udplite" => Self::UdpLite,
            _ => Self::Named(name.to_string()),
        }
    }
}

impl Serialize for Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => serializer.serialize_u8(*n),
            other => serializer.collect_str(other),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::Sctp => write!(f, "SCTP"),
            Self::Icmp => write!(f, "ICMP"),
            Self::IcmpV6 => write!(f, "ICMPv6"),
            Self::UdpLite => write!(f, "UDPLite"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Named(s) => write!(f, "{}", s),
        }
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match NumOrString::deserialize(deserializer)? {
            NumOrString::Num(n) => u8::try_from(n)
                .map(Self::Number)
                .map_err(|e| de::Error::custom(ConversionError::parse(n.to_string(), e))),
            NumOrString::Str(s) => Ok(Self::from_name(&s)),
        }
    }
}

/// Port match: a number, an inclusive range, or a named container port
///
/// A single port is written as a JSON number; ranges and names as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Port {
    /// Single port
    Single(u16),
    /// Inclusive range
    Range {
        /// First port
        min: u16,
        /// Last port
        max: u16,
    },
    /// Named port resolved by the dataplane
    Named(String),
}

impl Port {
    /// Parse `"80"`, `"8000:8080"` or a port name
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || ConversionError::InvalidPortSpec(raw.to_string());

        if raw.is_empty() {
            return Err(invalid());
        }

        if raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw.parse::<u16>().map(Self::Single).map_err(|_| invalid());
        }

        if let Some((min, max)) = raw.split_once(':') {
            let min = min.parse::<u16>().map_err(|_| invalid())?;
            let max = max.parse::<u16>().map_err(|_| invalid())?;
            if min > max {
                return Err(invalid());
            }
            return Ok(Self::Range { min, max });
        }

        if raw.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(Self::Named(raw.to_string()))
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(p) => write!(f, "{}", p),
            Self::Range { min, max } => write!(f, "{}:{}", min, max),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

impl Serialize for Port {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Single(p) => serializer.serialize_u16(*p),
            other => serializer.collect_str(other),
        }
    }
}

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match NumOrString::deserialize(deserializer)? {
            NumOrString::Num(n) => u16::try_from(n)
                .map(Self::Single)
                .map_err(|_| de::Error::custom(ConversionError::InvalidPortSpec(n.to_string()))),
            NumOrString::Str(s) => Self::parse(&s).map_err(de::Error::custom),
        }
    }
}

/// Source or destination side of a rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityRule {
    /// Endpoint selector
    #[serde(skip_serializing_if = "String::is_empty")]
    pub selector: String,
    /// Namespace selector
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace_selector: String,
    /// Included networks
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nets: Vec<String>,
    /// Excluded networks
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_nets: Vec<String>,
    /// Ports
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
}

/// Policy rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Rule {
    /// Action
    pub action: Action,
    /// Protocol (None = any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    /// Source match
    pub source: EntityRule,
    /// Destination match
    pub destination: EntityRule,
}

impl Rule {
    /// Rule allowing all traffic
    pub fn allow_all() -> Self {
        Self::default()
    }
}

/// Direction a policy applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyType {
    /// Incoming traffic
    Ingress,
    /// Outgoing traffic
    Egress,
}

/// Resource metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceMeta {
    /// Name
    pub name: String,
    /// Namespace (empty for global resources)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// UID of the source object
    pub uid: String,
    /// Version token of the source object
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    /// Creation time of the source object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// NetworkPolicy spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkPolicySpec {
    /// Ordering weight (lower applies first)
    pub order: Option<f64>,
    /// Endpoints the policy applies to
    pub selector: String,
    /// Ingress rules
    pub ingress: Vec<Rule>,
    /// Egress rules
    pub egress: Vec<Rule>,
    /// Directions the policy applies to
    pub types: Vec<PolicyType>,
}

/// Namespaced Calico NetworkPolicy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicy {
    /// Metadata
    pub metadata: ResourceMeta,
    /// Spec
    pub spec: NetworkPolicySpec,
}

/// Profile spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileSpec {
    /// Ingress rules
    pub ingress: Vec<Rule>,
    /// Egress rules
    pub egress: Vec<Rule>,
    /// Labels inherited by member endpoints
    pub labels_to_apply: BTreeMap<String, String>,
}

/// Calico Profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Metadata
    pub metadata: ResourceMeta,
    /// Spec
    pub spec: ProfileSpec,
}

/// Storage key of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKey {
    /// Kind tag
    pub kind: String,
    /// Name
    pub name: String,
    /// Namespace (None for global resources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceKey {
    /// Key of a global resource
    pub fn global(kind: &str, name: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Key of a namespaced resource
    pub fn namespaced(kind: &str, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

/// Resource envelope handed to the storage layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KVPair<T> {
    /// Key
    pub key: ResourceKey,
    /// Resource
    pub value: T,
    /// Opaque revision for optimistic concurrency
    pub revision: String,
}
