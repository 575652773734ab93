//! Point-in-time node facts handed to the routing backend

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::annotations::AnnotationMap;

/// A read-only snapshot of the local node's runtime state, built fresh for
/// every reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlPlaneState {
    /// Pod CIDRs assigned to this node, in allocation order
    pub pod_cidrs: Vec<String>,
    /// Parsed virtual router annotations of this node
    pub annotations: AnnotationMap,
    /// The node's externally reachable IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// The node's externally reachable IPv6 address
    pub ipv6: Option<Ipv6Addr>,
}
