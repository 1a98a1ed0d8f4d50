//! Port and protocol normalization
//!
//! Kubernetes lists ports as independent `{protocol, port}` entries. Calico
//! rules match a single protocol and a list of ports, so entries are grouped
//! by protocol before rules are generated.

use std::collections::BTreeMap;

use netpol_common::calico::{Port, Protocol};
use netpol_common::k8s::{IntOrString, NetworkPolicyPort};
use netpol_common::{ConversionError, Result};

/// Bundle key meaning "any protocol"
pub const WILDCARD_PROTOCOL: &str = "";

/// Ports grouped by protocol
///
/// Keys iterate in lexicographic order. An empty port list means every port
/// of that protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolPortBundle {
    ports: BTreeMap<String, Vec<Port>>,
}

impl ProtocolPortBundle {
    /// Bundle matching every protocol and port
    pub fn wildcard() -> Self {
        let mut bundle = Self::default();
        bundle.ports.insert(WILDCARD_PROTOCOL.to_string(), Vec::new());
        bundle
    }

    /// Ports for a protocol key
    pub fn get(&self, protocol: &str) -> Option<&[Port]> {
        self.ports.get(protocol).map(Vec::as_slice)
    }

    /// Protocol keys with their ports, in sorted key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Port])> {
        self.ports.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn add(&mut self, protocol: String, port: Option<Port>) {
        self.ports.entry(protocol).or_default().extend(port);
    }
}

/// Parse a protocol key back into a rule protocol
///
/// The wildcard key yields `None`.
pub fn protocol_for_key(key: &str) -> Option<Protocol> {
    if key == WILDCARD_PROTOCOL {
        None
    } else {
        Some(Protocol::from_name(key))
    }
}

/// Group a rule's port entries by protocol
///
/// A port without a protocol is TCP. An entry with neither port nor protocol
/// opens the rule to all traffic and discards everything else. Ports
/// accumulate per protocol in entry order; a protocol-only entry adds the
/// key with no ports, so explicit ports for that protocol still narrow it.
/// Duplicates are kept.
pub fn normalize_ports(specs: &[NetworkPolicyPort]) -> Result<ProtocolPortBundle> {
    if specs.is_empty() {
        return Ok(ProtocolPortBundle::wildcard());
    }

    let mut bundle = ProtocolPortBundle::default();
    for spec in specs {
        let port = spec.port.as_ref().map(parse_port).transpose()?;
        let protocol = match spec.protocol.as_deref().filter(|p| !p.is_empty()) {
            Some(name) => Some(Protocol::from_name(name)),
            None if port.is_some() => Some(Protocol::Tcp),
            None => None,
        };

        let Some(protocol) = protocol else {
            return Ok(ProtocolPortBundle::wildcard());
        };
        bundle.add(protocol.to_string(), port);
    }

    Ok(bundle)
}

fn parse_port(raw: &IntOrString) -> Result<Port> {
    match raw {
        IntOrString::Int(num) => u16::try_from(*num)
            .map(Port::Single)
            .map_err(|_| ConversionError::InvalidPortSpec(num.to_string())),
        IntOrString::String(s) => Port::parse(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(protocol: Option<&str>, port: Option<IntOrString>) -> NetworkPolicyPort {
        NetworkPolicyPort::new(protocol, port)
    }

    fn keys(bundle: &ProtocolPortBundle) -> Vec<&str> {
        bundle.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_no_ports_is_wildcard() {
        let bundle = normalize_ports(&[]).unwrap();
        assert_eq!(keys(&bundle), vec![WILDCARD_PROTOCOL]);
        assert_eq!(bundle.get(""), Some(&[][..]));
    }

    #[test]
    fn test_implicit_tcp() {
        let bundle = normalize_ports(&[port(None, Some(80.into()))]).unwrap();
        assert_eq!(keys(&bundle), vec!["TCP"]);
        assert_eq!(bundle.get("TCP"), Some(&[Port::Single(80)][..]));
    }

    #[test]
    fn test_grouped_by_protocol_sorted() {
        let bundle = normalize_ports(&[
            port(Some("UDP"), Some(53.into())),
            port(None, Some(443.into())),
            port(Some("TCP"), Some("http".into())),
            port(Some("tcp"), Some(443.into())),
            port(Some("SCTP"), Some("9000:9100".into())),
        ])
        .unwrap();

        assert_eq!(keys(&bundle), vec!["SCTP", "TCP", "UDP"]);
        assert_eq!(
            bundle.get("TCP"),
            Some(&[Port::Single(443), Port::Named("http".into())][..])
        );
        assert_eq!(bundle.get("SCTP"), Some(&[Port::Range { min: 9000, max: 9100 }][..]));
    }

    #[test]
    fn test_fully_open_entry_collapses() {
        let bundle = normalize_ports(&[
            port(Some("UDP"), Some(53.into())),
            port(None, None),
            port(Some("TCP"), Some(80.into())),
        ])
        .unwrap();
        assert_eq!(keys(&bundle), vec![WILDCARD_PROTOCOL]);
        assert_eq!(bundle.get(""), Some(&[][..]));
    }

    #[test]
    fn test_protocol_only_entry_adds_no_ports() {
        let bundle = normalize_ports(&[port(Some("UDP"), None), port(Some("UDP"), Some(53.into()))])
            .unwrap();
        assert_eq!(bundle.get("UDP"), Some(&[Port::Single(53)][..]));

        let bundle = normalize_ports(&[port(Some("UDP"), Some(53.into())), port(Some("UDP"), None)])
            .unwrap();
        assert_eq!(bundle.get("UDP"), Some(&[Port::Single(53)][..]));
    }

    #[test]
    fn test_protocol_only_entry_alone_matches_all_ports() {
        let bundle = normalize_ports(&[port(Some("SCTP"), None)]).unwrap();
        assert_eq!(keys(&bundle), vec!["SCTP"]);
        assert_eq!(bundle.get("SCTP"), Some(&[][..]));
    }

    #[test]
    fn test_ports_accumulate_in_entry_order() {
        let bundle = normalize_ports(&[
            port(Some("UDP"), Some(123.into())),
            port(Some("UDP"), Some(53.into())),
            port(Some("UDP"), Some(123.into())),
        ])
        .unwrap();
        assert_eq!(
            bundle.get("UDP"),
            Some(&[Port::Single(123), Port::Single(53), Port::Single(123)][..])
        );
    }

    #[test]
    fn test_invalid_ports() {
        let err = normalize_ports(&[port(None, Some(70000.into()))]).unwrap_err();
        assert_eq!(err, ConversionError::InvalidPortSpec("70000".into()));

        let err = normalize_ports(&[port(Some("TCP"), Some("".into()))]).unwrap_err();
        assert_eq!(err, ConversionError::InvalidPortSpec("".into()));
    }

    #[test]
    fn test_protocol_for_key() {
        assert_eq!(protocol_for_key(""), None);
        assert_eq!(protocol_for_key("TCP"), Some(Protocol::Tcp));
    }
}
