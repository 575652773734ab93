//! Seam between the control plane and a BGP speaker implementation

use async_trait::async_trait;
use router_api::BGPPeeringPolicy;
use router_core::{ControlPlaneState, Result};

/// BgpRouterManager applies a desired peering configuration to a BGP
/// speaker (GoBGP, FRR, BIRD, ...).
///
/// Every call fully replaces the previous configuration. Calling with
/// `(None, None)` withdraws all routers and peers and must never fail.
#[async_trait]
pub trait BgpRouterManager: Send + Sync {
    async fn configure_peers(
        &self,
        policy: Option<&BGPPeeringPolicy>,
        state: Option<&ControlPlaneState>,
    ) -> Result<()>;
}
