use thiserror::Error;

use crate::annotations::AnnotationError;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(
        "More than one BGPPeeringPolicy applies to this node ({}), please ensure only a single policy matches this node's labels",
        .0.join(", ")
    )]
    AmbiguousPolicy(Vec<String>),

    #[error("Invalid node selector: {0}")]
    InvalidSelector(String),

    #[error("Node {0} not found in local cache")]
    NodeNotFound(String),

    #[error("Failed to list BGPPeeringPolicies, policy cache not synced: {0}")]
    PolicyList(String),

    #[error("Failed to parse annotations: {0}")]
    Annotation(#[from] AnnotationError),

    #[error("Invalid peering configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to configure BGP peers: {0}")]
    Backend(String),

    #[error("Unsupported IPAM mode {0:?}, cannot initialize BGP control plane")]
    UnsupportedIpamMode(String),

    #[error("{0} watch is already running")]
    WatchRunning(String),

    #[error("Controller already started")]
    AlreadyStarted,

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("Shutdown deadline exceeded")]
    ShutdownDeadlineExceeded,
}
