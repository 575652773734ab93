//! Local node state
//!
//! Where the node's pod CIDRs live depends on the IPAM mode, so there are two
//! providers: one reading the core `Node` object and one reading the node's
//! `RouterNode` object. Both watch only the local node.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client, ResourceExt};
use router_api::RouterNode;
use router_core::{CoreError, Result, Signaler};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::watch::ReflectedWatch;

/// Read access to the local node's labels, annotations and pod CIDRs, plus
/// the watch that keeps them current.
#[async_trait]
pub trait NodeStateProvider: Send + Sync {
    async fn labels(&self) -> Result<BTreeMap<String, String>>;

    async fn annotations(&self) -> Result<BTreeMap<String, String>>;

    async fn pod_cidrs(&self) -> Result<Vec<String>>;

    /// Run the watch until `shutdown` fires
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

/// Node state sourced from the core `Node` object (Kubernetes IPAM)
pub struct KubernetesNodeState {
    name: String,
    watch: ReflectedWatch<Node>,
}

impl KubernetesNodeState {
    pub fn new(client: Client, name: &str, signaler: Signaler) -> Self {
        let watch = ReflectedWatch::named("Node", Api::all(client), name, signaler);
        Self {
            name: name.to_string(),
            watch,
        }
    }

    fn node(&self) -> Result<Arc<Node>> {
        self.watch
            .get(&self.name)
            .ok_or_else(|| CoreError::NodeNotFound(self.name.clone()))
    }
}

#[async_trait]
impl NodeStateProvider for KubernetesNodeState {
    async fn labels(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.node()?.labels().clone())
    }

    async fn annotations(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.node()?.annotations().clone())
    }

    async fn pod_cidrs(&self) -> Result<Vec<String>> {
        let node = self.node()?;
        Ok(node_pod_cidrs(&node))
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.watch.run(shutdown).await
    }
}

/// Node state sourced from the node's `RouterNode` object (cluster-pool IPAM)
pub struct RouterNodeState {
    name: String,
    watch: ReflectedWatch<RouterNode>,
}

impl RouterNodeState {
    pub fn new(client: Client, name: &str, signaler: Signaler) -> Self {
        let watch = ReflectedWatch::named("RouterNode", Api::all(client), name, signaler);
        Self {
            name: name.to_string(),
            watch,
        }
    }

    fn node(&self) -> Result<Arc<RouterNode>> {
        self.watch
            .get(&self.name)
            .ok_or_else(|| CoreError::NodeNotFound(self.name.clone()))
    }
}

#[async_trait]
impl NodeStateProvider for RouterNodeState {
    async fn labels(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.node()?.labels().clone())
    }

    async fn annotations(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.node()?.annotations().clone())
    }

    async fn pod_cidrs(&self) -> Result<Vec<String>> {
        let node = self.node()?;
        Ok(node.spec.ipam.pod_cidrs.clone())
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.watch.run(shutdown).await
    }
}

/// Pod CIDRs of a core `Node`: `podCIDRs` when set, else the legacy
/// single `podCIDR`.
pub fn node_pod_cidrs(node: &Node) -> Vec<String> {
    let Some(spec) = node.spec.as_ref() else {
        return Vec::new();
    };
    if let Some(cidrs) = &spec.pod_cidrs {
        return cidrs.clone();
    }
    match spec.pod_cidr.as_deref() {
        Some(cidr) if !cidr.is_empty() => vec![cidr.to_string()],
        _ => Vec::new(),
    }
}
