/// API version v1alpha1 for Datum Router BGP resources

pub mod bgp_peering_policy;
pub mod router_node;

pub use bgp_peering_policy::{BGPPeeringPolicy, BGPPeeringPolicySpec, Neighbor, VirtualRouter};
pub use router_node::{IpamSpec, RouterNode, RouterNodeSpec};

/// API group for Datum Router resources
pub const API_GROUP: &str = "router.datum.net";
/// API version for Datum Router resources
pub const API_VERSION: &str = "v1alpha1";
