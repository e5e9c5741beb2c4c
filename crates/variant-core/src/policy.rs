//! Network policy data model and set algebra
//!
//! A policy is a directed 5-tuple opening a TCP/UDP port range from a source
//! workload to a destination workload. Equality is structural over all five
//! fields; the reconciler's differ works purely on this equality.

use serde::{Deserialize, Serialize};

/// Transport protocol of a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Inclusive destination port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

/// A directed network-access policy between two workloads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Policy {
    /// GUID of the workload traffic originates from
    pub source: String,
    /// GUID of the workload traffic is destined for
    pub destination: String,
    pub protocol: Protocol,
    pub ports: PortRange,
}

impl Policy {
    /// A single-port TCP policy, the shape every policy authored by the
    /// controller takes.
    pub fn tcp(source: impl Into<String>, destination: impl Into<String>, port: u16) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            protocol: Protocol::Tcp,
            ports: PortRange { start: port, end: port },
        }
    }
}

/// Deduplicate policies by structural equality, first occurrence wins.
pub fn uniq_policies(policies: Vec<Policy>) -> Vec<Policy> {
    let mut result: Vec<Policy> = Vec::with_capacity(policies.len());
    for policy in policies {
        if !result.contains(&policy) {
            result.push(policy);
        }
    }
    result
}

/// Remove every policy whose destination matches the given GUID.
pub fn prune_policies_by_destination(policies: Vec<Policy>, destination: &str) -> Vec<Policy> {
    policies
        .into_iter()
        .filter(|p| p.destination != destination)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = Policy::tcp("src", "dst", 8080);
        let b = Policy::tcp("src", "dst", 8080);
        assert_eq!(a, b);

        let c = Policy::tcp("src", "dst", 8081);
        assert_ne!(a, c);

        let d = Policy::tcp("src", "other", 8080);
        assert_ne!(a, d);

        let mut e = Policy::tcp("src", "dst", 8080);
        e.protocol = Protocol::Udp;
        assert_ne!(a, e);

        let mut f = Policy::tcp("src", "dst", 8080);
        f.ports.end = 8090;
        assert_ne!(a, f);
    }

    #[test]
    fn test_uniq_policies_first_occurrence_wins() {
        let policies = vec![
            Policy::tcp("src", "a", 8080),
            Policy::tcp("src", "b", 9090),
            Policy::tcp("src", "a", 8080),
            Policy::tcp("src", "a", 9090),
        ];
        let uniq = uniq_policies(policies);
        assert_eq!(uniq.len(), 3);
        assert_eq!(uniq[0], Policy::tcp("src", "a", 8080));
        assert_eq!(uniq[1], Policy::tcp("src", "b", 9090));
        assert_eq!(uniq[2], Policy::tcp("src", "a", 9090));
    }

    #[test]
    fn test_prune_by_destination() {
        let policies = vec![
            Policy::tcp("src", "a", 8080),
            Policy::tcp("src", "b", 9090),
            Policy::tcp("src", "a", 9100),
        ];
        let pruned = prune_policies_by_destination(policies, "a");
        assert_eq!(pruned, vec![Policy::tcp("src", "b", 9090)]);
    }

    #[test]
    fn test_prune_no_match_is_identity() {
        let policies = vec![Policy::tcp("src", "a", 8080)];
        let pruned = prune_policies_by_destination(policies.clone(), "missing");
        assert_eq!(pruned, policies);
    }

    #[test]
    fn test_protocol_serialization() {
        assert_eq!(serde_json::to_string(&Protocol::Tcp).unwrap(), "\"tcp\"");
        assert_eq!(serde_json::to_string(&Protocol::Udp).unwrap(), "\"udp\"");
        let proto: Protocol = serde_json::from_str("\"tcp\"").unwrap();
        assert_eq!(proto, Protocol::Tcp);
    }
}
