use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// BGPPeeringPolicy describes the BGP peering a set of nodes should
/// establish. Only one policy may select a given node.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "router.datum.net",
    version = "v1alpha1",
    kind = "BGPPeeringPolicy",
    plural = "bgppeeringpolicies",
    shortname = "bgpp",
    derive = "Default",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct BGPPeeringPolicySpec {
    /// Selects the nodes this policy applies to. An absent selector
    /// selects no nodes; an empty selector selects every node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<LabelSelector>,

    /// Virtual routers to instantiate on each selected node
    #[serde(default)]
    pub virtual_routers: Vec<VirtualRouter>,
}

/// A BGP speaker instance identified by its local ASN
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouter {
    /// Local autonomous system number
    #[serde(rename = "localASN")]
    pub local_asn: u32,

    /// Advertise the node's pod CIDRs to every neighbor
    #[serde(default, rename = "exportPodCIDR")]
    pub export_pod_cidr: bool,

    /// Peers to establish sessions with
    #[serde(default)]
    pub neighbors: Vec<Neighbor>,
}

/// A BGP peer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    /// Peer address in CIDR notation (e.g. "10.0.0.1/32")
    pub peer_address: String,

    /// Remote autonomous system number
    #[serde(rename = "peerASN")]
    pub peer_asn: u32,
}
