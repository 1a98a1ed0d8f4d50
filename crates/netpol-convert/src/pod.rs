//! Pod eligibility and address extraction
//!
//! Only scheduled, non host-networked pods are represented as workload
//! endpoints. A pod may only move from invalid to valid, never back, or the
//! endpoint watcher would miss a deletion.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use netpol_common::config::{ANNOTATION_POD_IP, ANNOTATION_POD_IPS};
use netpol_common::k8s::{Pod, PodPhase};
use netpol_common::{ConversionError, Result};

/// Pod is bound to a node
pub fn is_scheduled(pod: &Pod) -> bool {
    !pod.spec.node_name.is_empty()
}

/// Pod shares the host's network namespace
pub fn is_host_networked(pod: &Pod) -> bool {
    pod.spec.host_network
}

/// Pod has an address in its status or in the CNI annotation
pub fn has_ip_address(pod: &Pod) -> bool {
    // The plural fields are never set without the singular ones
    !pod.status.pod_ip.is_empty()
        || pod
            .metadata
            .annotations
            .get(ANNOTATION_POD_IP)
            .is_some_and(|ip| !ip.is_empty())
}

/// Pod should be shown as a workload endpoint
pub fn is_valid_workload_endpoint(pod: &Pod) -> bool {
    if is_host_networked(pod) {
        tracing::debug!(pod = %pod.metadata.name, "Pod is host networked");
        return false;
    }
    if !is_scheduled(pod) {
        tracing::debug!(pod = %pod.metadata.name, "Pod is not scheduled");
        return false;
    }
    true
}

/// Pod is a valid workload endpoint with an address assigned
pub fn is_ready_pod(pod: &Pod) -> bool {
    if !is_valid_workload_endpoint(pod) {
        return false;
    }
    if !has_ip_address(pod) {
        tracing::debug!(pod = %pod.metadata.name, "Pod does not have an IP address");
        return false;
    }
    true
}

/// Pod has reached a terminal phase
pub fn is_finished(pod: &Pod) -> bool {
    matches!(
        pod.status.phase,
        Some(PodPhase::Failed | PodPhase::Succeeded | PodPhase::Completed)
    )
}

/// Addresses of a pod, at most one per family
///
/// Sources in order of preference: status `podIPs`, status `podIP`, the
/// plural CNI annotation, the singular CNI annotation. Returns an empty list
/// when none is set.
pub fn pod_ips(pod: &Pod) -> Result<Vec<IpNetwork>> {
    let annotations = &pod.metadata.annotations;
    let non_empty = |key: &str| annotations.get(key).filter(|v| !v.is_empty());

    let raw: Vec<&str> = if !pod.status.pod_ips.is_empty() {
        tracing::debug!(pod = %pod.metadata.name, "PodIPs field filled in");
        pod.status.pod_ips.iter().map(|ip| ip.ip.as_str()).collect()
    } else if !pod.status.pod_ip.is_empty() {
        tracing::debug!(pod = %pod.metadata.name, "PodIP field filled in");
        vec![pod.status.pod_ip.as_str()]
    } else if let Some(ips) = non_empty(ANNOTATION_POD_IPS) {
        tracing::debug!(pod = %pod.metadata.name, "No PodStatus IPs, using plural annotation");
        ips.split(',').collect()
    } else if let Some(ip) = non_empty(ANNOTATION_POD_IP) {
        tracing::debug!(pod = %pod.metadata.name, "No PodStatus IPs, using singular annotation");
        vec![ip.as_str()]
    } else {
        tracing::debug!(pod = %pod.metadata.name, "Pod has no IP");
        return Ok(Vec::new());
    };

    strings_to_ip_nets(&raw).map_err(|e| {
        tracing::error!(pod = %pod.metadata.name, error = %e, "Failed to parse pod IP");
        e
    })
}

/// Parse addresses or CIDRs
///
/// A bare address becomes a host network; the address of a CIDR is kept
/// as given.
pub fn strings_to_ip_nets<S: AsRef<str>>(raw: &[S]) -> Result<Vec<IpNetwork>> {
    raw.iter().map(|s| parse_cidr_or_ip(s.as_ref())).collect()
}

fn parse_cidr_or_ip(raw: &str) -> Result<IpNetwork> {
    let raw = raw.trim();
    if raw.contains('/') {
        return raw.parse().map_err(|e| ConversionError::parse(raw, e));
    }
    let ip: IpAddr = raw.parse().map_err(|e| ConversionError::parse(raw, e))?;
    let prefix = if ip.is_ipv4() { 32 } else { 128 };
    IpNetwork::new(ip, prefix).map_err(|e| ConversionError::parse(raw, e))
}
