//! Node-side BGP control plane
//!
//! Watches BGPPeeringPolicies and the local node, selects the policy that
//! applies to this node and drives a BGP speaker toward it.

pub mod config;
pub mod controller;
pub mod manager;
pub mod node;
pub mod policy_source;
pub mod registry;
pub mod watch;

pub use config::{ControllerConfig, IpamMode};
pub use controller::{ReconciliationController, Sources};
pub use manager::BgpRouterManager;
pub use node::{KubernetesNodeState, NodeStateProvider, RouterNodeState};
pub use policy_source::{KubePolicySource, PolicySource};
pub use registry::{PeerConfig, PeerRegistry, RouterConfig};
