//! Rule peer resolution

use ipnetwork::IpNetwork;
use netpol_common::k8s::NetworkPolicyPeer;
use netpol_common::{ConversionError, ConverterConfig, Result};

use crate::selector::{compile_selector, SelectorContext};

/// Match fields derived from one NetworkPolicy peer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPeer {
    /// Endpoint selector
    pub selector: String,
    /// Namespace selector
    pub namespace_selector: String,
    /// Included networks
    pub nets: Vec<String>,
    /// Excluded networks
    pub not_nets: Vec<String>,
}

/// Resolve a peer into selectors and networks
///
/// An absent peer matches everything. An IP block peer yields networks only;
/// the namespace argument is accepted for callers that scope peers but does
/// not affect the result.
pub fn resolve_peer(
    config: &ConverterConfig,
    peer: Option<&NetworkPolicyPeer>,
    _namespace: &str,
) -> Result<ResolvedPeer> {
    let Some(peer) = peer else {
        return Ok(ResolvedPeer::default());
    };

    if let Some(block) = &peer.ip_block {
        let nets = vec![parse_cidr(&block.cidr)?.to_string()];
        let not_nets = block
            .except
            .iter()
            .map(|cidr| parse_cidr(cidr).map(|net| net.to_string()))
            .collect::<Result<Vec<_>>>()?;

        return Ok(ResolvedPeer {
            nets,
            not_nets,
            ..Default::default()
        });
    }

    Ok(ResolvedPeer {
        selector: compile_selector(config, peer.pod_selector.as_ref(), SelectorContext::Pod),
        namespace_selector: compile_selector(
            config,
            peer.namespace_selector.as_ref(),
            SelectorContext::Namespace,
        ),
        ..Default::default()
    })
}

/// Parse a CIDR into its canonical network form
///
/// Host bits are cleared, so `10.1.2.3/8` becomes `10.0.0.0/8`. A prefix
/// length is required.
pub fn parse_cidr(raw: &str) -> Result<IpNetwork> {
    if !raw.contains('/') {
        let err = ConversionError::parse(raw, "missing prefix length");
        tracing::error!(cidr = raw, error = %err, "Failed to parse CIDR");
        return Err(err);
    }

    let net: IpNetwork = raw.parse().map_err(|e| {
        tracing::error!(cidr = raw, error = %e, "Failed to parse CIDR");
        ConversionError::parse(raw, e)
    })?;

    IpNetwork::new(net.network(), net.prefix()).map_err(|e| ConversionError::parse(raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpol_common::k8s::LabelSelector;
    use proptest::prelude::*;

    fn config() -> ConverterConfig {
        ConverterConfig::default()
    }

    #[test]
    fn test_absent_peer_is_unconstrained() {
        let resolved = resolve_peer(&config(), None, "prod").unwrap();
        assert_eq!(resolved, ResolvedPeer::default());
    }

    #[test]
    fn test_ip_block_peer() {
        let peer = NetworkPolicyPeer::ip_block("10.0.0.0/8", &["10.1.0.0/16", "10.2.3.4/16"]);
        let resolved = resolve_peer(&config(), Some(&peer), "prod").unwrap();

        assert_eq!(resolved.nets, vec!["10.0.0.0/8"]);
        assert_eq!(resolved.not_nets, vec!["10.1.0.0/16", "10.2.0.0/16"]);
        assert!(resolved.selector.is_empty());
        assert!(resolved.namespace_selector.is_empty());
    }

    #[test]
    fn test_ip_block_ignores_selectors() {
        let mut peer = NetworkPolicyPeer::ip_block("fd00::1/64", &[]);
        peer.pod_selector = Some(LabelSelector::from_labels([("app", "web")]));

        let resolved = resolve_peer(&config(), Some(&peer), "prod").unwrap();
        assert_eq!(resolved.nets, vec!["fd00::/64"]);
        assert!(resolved.selector.is_empty());
    }

    #[test]
    fn test_malformed_cidr() {
        let peer = NetworkPolicyPeer::ip_block("10.0.0.0/33", &[]);
        let err = resolve_peer(&config(), Some(&peer), "prod").unwrap_err();
        assert!(matches!(err, ConversionError::ParseError { ref input, .. } if input == "10.0.0.0/33"));

        let peer = NetworkPolicyPeer::ip_block("10.0.0.0/8", &["bogus"]);
        assert!(resolve_peer(&config(), Some(&peer), "prod").is_err());
    }

    #[test]
    fn test_bare_address_rejected() {
        assert!(parse_cidr("10.0.0.1").is_err());
    }

    #[test]
    fn test_selector_peer() {
        let peer = NetworkPolicyPeer {
            pod_selector: Some(LabelSelector::from_labels([("role", "frontend")])),
            namespace_selector: Some(LabelSelector::default()),
            ip_block: None,
        };
        let resolved = resolve_peer(&config(), Some(&peer), "prod").unwrap();

        assert_eq!(
            resolved.selector,
            "projectcalico.org/orchestrator == 'k8s' && role == 'frontend'"
        );
        assert_eq!(resolved.namespace_selector, "all()");
        assert!(resolved.nets.is_empty());
    }

    #[test]
    fn test_namespace_only_peer() {
        let peer = NetworkPolicyPeer::namespaces(LabelSelector::from_labels([("team", "infra")]));
        let resolved = resolve_peer(&config(), Some(&peer), "prod").unwrap();

        assert_eq!(resolved.selector, "projectcalico.org/orchestrator == 'k8s'");
        assert_eq!(resolved.namespace_selector, "team == 'infra'");
    }

    proptest! {
        #[test]
        fn prop_ip_block_never_has_selectors(
            a in 0u8..=255,
            prefix in 0u8..=32,
            labels in proptest::collection::btree_map("[a-z]{1,5}", "[a-z]{1,5}", 0..4),
        ) {
            let mut peer = NetworkPolicyPeer::ip_block(format!("{a}.0.0.0/{prefix}"), &[]);
            peer.pod_selector = Some(LabelSelector { match_labels: labels.clone(), ..Default::default() });
            peer.namespace_selector = Some(LabelSelector { match_labels: labels, ..Default::default() });

            let resolved = resolve_peer(&config(), Some(&peer), "prod").unwrap();
            prop_assert!(resolved.selector.is_empty());
            prop_assert!(resolved.namespace_selector.is_empty());
            prop_assert_eq!(resolved.nets.len(), 1);
        }
    }
}
