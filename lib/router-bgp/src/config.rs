//! Controller configuration

use std::convert::Infallible;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::Duration;

/// Bound on the final withdrawal issued when the control loop exits
pub const DEFAULT_WITHDRAWAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for draining the controller's tasks on stop
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Address management scheme in use on the cluster. It decides where the
/// node's pod CIDRs are read from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IpamMode {
    /// Pod CIDRs come from the core `Node` object
    #[default]
    Kubernetes,
    /// Pod CIDRs come from the node's `RouterNode` object
    ClusterPool,
    /// Same source as [`IpamMode::ClusterPool`]
    ClusterPoolV2,
    /// Any other scheme. The control plane cannot run with it.
    Other(String),
}

impl FromStr for IpamMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "kubernetes" => IpamMode::Kubernetes,
            "cluster-pool" => IpamMode::ClusterPool,
            "cluster-pool-v2" => IpamMode::ClusterPoolV2,
            other => IpamMode::Other(other.to_string()),
        })
    }
}

impl fmt::Display for IpamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpamMode::Kubernetes => write!(f, "kubernetes"),
            IpamMode::ClusterPool => write!(f, "cluster-pool"),
            IpamMode::ClusterPoolV2 => write!(f, "cluster-pool-v2"),
            IpamMode::Other(mode) => write!(f, "{}", mode),
        }
    }
}

/// Configuration for the BGP control plane controller
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// When false no controller is constructed
    pub enabled: bool,
    pub ipam_mode: IpamMode,
    /// Name of the node this agent runs on
    pub node_name: String,
    pub node_ipv4: Option<Ipv4Addr>,
    pub node_ipv6: Option<Ipv6Addr>,
    /// Deadline for [`stop`](crate::ReconciliationController::stop)
    pub shutdown_timeout: Duration,
    /// Bound on the withdrawal issued when the control loop exits
    pub withdrawal_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ipam_mode: IpamMode::default(),
            node_name: String::new(),
            node_ipv4: None,
            node_ipv6: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            withdrawal_timeout: DEFAULT_WITHDRAWAL_TIMEOUT,
        }
    }
}
