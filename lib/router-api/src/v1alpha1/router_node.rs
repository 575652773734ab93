use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// RouterNode carries per-node facts assigned by the cluster-pool address
/// allocator. There is exactly one per node, named after the node.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "router.datum.net",
    version = "v1alpha1",
    kind = "RouterNode",
    plural = "routernodes",
    derive = "Default",
)]
pub struct RouterNodeSpec {
    /// Address management state for this node
    #[serde(default)]
    pub ipam: IpamSpec,
}

/// Pod address ranges allocated to the node
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpamSpec {
    /// CIDRs from which pod addresses on this node are allocated
    #[serde(default, rename = "podCIDRs")]
    pub pod_cidrs: Vec<String>,
}
