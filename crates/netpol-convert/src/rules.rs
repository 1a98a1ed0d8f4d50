//! Rule expansion
//!
//! One Kubernetes rule entry becomes one Calico rule per protocol per peer.
//! Ports always sit on the destination side: they describe what is being
//! connected to, whichever direction the rule governs.

use netpol_common::calico::{Action, EntityRule, Port, Rule};
use netpol_common::k8s::{NetworkPolicyPeer, NetworkPolicyPort};
use netpol_common::{ConverterConfig, Result};
use serde::Serialize;

use crate::peer::{resolve_peer, ResolvedPeer};
use crate::ports::{normalize_ports, protocol_for_key, ProtocolPortBundle};

/// Direction of a rule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuleDirection {
    /// Peers are sources
    Ingress,
    /// Peers are destinations
    Egress,
}

/// Expand peers and protocol bundles into rules
///
/// Protocols are visited in key order and peers in list order; an empty peer
/// list stands for a single unconstrained peer.
pub fn expand_rules(
    config: &ConverterConfig,
    direction: RuleDirection,
    peers: &[NetworkPolicyPeer],
    bundle: &ProtocolPortBundle,
    namespace: &str,
) -> Result<Vec<Rule>> {
    let resolved = if peers.is_empty() {
        vec![resolve_peer(config, None, namespace)?]
    } else {
        peers
            .iter()
            .map(|peer| resolve_peer(config, Some(peer), namespace))
            .collect::<Result<Vec<_>>>()?
    };

    let mut rules = Vec::new();
    for (key, ports) in bundle.iter() {
        let protocol = protocol_for_key(key);
        for peer in &resolved {
            let (source, destination) = entities(direction, peer.clone(), ports.to_vec());
            rules.push(Rule {
                action: Action::Allow,
                protocol: protocol.clone(),
                source,
                destination,
            });
        }
    }

    Ok(rules)
}

/// Convert one Kubernetes rule entry
pub fn convert_rule(
    config: &ConverterConfig,
    direction: RuleDirection,
    peers: &[NetworkPolicyPeer],
    ports: &[NetworkPolicyPort],
    namespace: &str,
) -> Result<Vec<Rule>> {
    let bundle = normalize_ports(ports)?;
    expand_rules(config, direction, peers, &bundle, namespace)
}

fn entities(
    direction: RuleDirection,
    peer: ResolvedPeer,
    ports: Vec<Port>,
) -> (EntityRule, EntityRule) {
    let peer_entity = EntityRule {
        selector: peer.selector,
        namespace_selector: peer.namespace_selector,
        nets: peer.nets,
        not_nets: peer.not_nets,
        ports: Vec::new(),
    };

    match direction {
        RuleDirection::Ingress => (
            peer_entity,
            EntityRule {
                ports,
                ..Default::default()
            },
        ),
        RuleDirection::Egress => (EntityRule::default(), EntityRule { ports, ..peer_entity }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpol_common::calico::Protocol;
    use netpol_common::k8s::LabelSelector;
    use netpol_common::ConversionError;

    const ORCH: &str = "projectcalico.org/orchestrator == 'k8s'";

    fn config() -> ConverterConfig {
        ConverterConfig::default()
    }

    fn tcp(port: i32) -> NetworkPolicyPort {
        NetworkPolicyPort::new(Some("TCP"), Some(port.into()))
    }

    #[test]
    fn test_empty_rule_allows_everything() {
        let rules = convert_rule(&config(), RuleDirection::Ingress, &[], &[], "prod").unwrap();
        assert_eq!(rules, vec![Rule::allow_all()]);
    }

    #[test]
    fn test_ingress_ports_on_destination() {
        let peers = vec![NetworkPolicyPeer::pods(LabelSelector::from_labels([("role", "frontend")]))];
        let rules =
            convert_rule(&config(), RuleDirection::Ingress, &peers, &[tcp(80)], "prod").unwrap();

        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.action, Action::Allow);
        assert_eq!(rule.protocol, Some(Protocol::Tcp));
        assert_eq!(rule.source.selector, format!("{ORCH} && role == 'frontend'"));
        assert!(rule.source.ports.is_empty());
        assert_eq!(rule.destination, EntityRule { ports: vec![Port::Single(80)], ..Default::default() });
    }

    #[test]
    fn test_egress_peer_and_ports_on_destination() {
        let peers = vec![NetworkPolicyPeer::ip_block("192.168.0.0/16", &["192.168.1.0/24"])];
        let rules =
            convert_rule(&config(), RuleDirection::Egress, &peers, &[tcp(5432)], "prod").unwrap();

        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.source, Default::default());
        assert_eq!(rule.destination.nets, vec!["192.168.0.0/16"]);
        assert_eq!(rule.destination.not_nets, vec!["192.168.1.0/24"]);
        assert_eq!(rule.destination.ports, vec![Port::Single(5432)]);
        assert!(rule.destination.selector.is_empty());
    }

    #[test]
    fn test_cross_product_order() {
        let peers = vec![
            NetworkPolicyPeer::pods(LabelSelector::from_labels([("app", "a")])),
            NetworkPolicyPeer::pods(LabelSelector::from_labels([("app", "b")])),
        ];
        let ports = vec![
            NetworkPolicyPort::new(Some("UDP"), Some(53.into())),
            tcp(53),
            tcp(853),
        ];
        let rules =
            convert_rule(&config(), RuleDirection::Ingress, &peers, &ports, "prod").unwrap();

        let summary: Vec<_> = rules
            .iter()
            .map(|r| (r.protocol.clone().unwrap(), r.source.selector.clone(), r.destination.ports.len()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Protocol::Tcp, format!("{ORCH} && app == 'a'"), 2),
                (Protocol::Tcp, format!("{ORCH} && app == 'b'"), 2),
                (Protocol::Udp, format!("{ORCH} && app == 'a'"), 1),
                (Protocol::Udp, format!("{ORCH} && app == 'b'"), 1),
            ]
        );
    }

    #[test]
    fn test_bad_peer_fails_entry() {
        let peers = vec![
            NetworkPolicyPeer::pods(LabelSelector::default()),
            NetworkPolicyPeer::ip_block("not-a-cidr", &[]),
        ];
        let err = convert_rule(&config(), RuleDirection::Ingress, &peers, &[], "prod").unwrap_err();
        assert!(matches!(err, ConversionError::ParseError { .. }));
    }

    #[test]
    fn test_bad_port_fails_entry() {
        let ports = vec![NetworkPolicyPort::new(None, Some((-1).into()))];
        let err = convert_rule(&config(), RuleDirection::Egress, &[], &ports, "prod").unwrap_err();
        assert_eq!(err, ConversionError::InvalidPortSpec("-1".into()));
    }
}
