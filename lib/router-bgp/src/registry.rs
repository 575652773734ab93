//! In-memory desired BGP configuration
//!
//! PeerRegistry turns a policy plus node state into concrete router
//! configurations and holds them for a speaker to consume.

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use kube::ResourceExt;
use router_api::BGPPeeringPolicy;
use router_core::{ControlPlaneState, CoreError, Result};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::manager::BgpRouterManager;

/// Port a virtual router listens on unless annotated otherwise
pub const DEFAULT_BGP_PORT: u16 = 179;

/// A configured BGP peer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerConfig {
    pub address: IpNetwork,
    pub asn: u32,
}

/// Desired configuration for one virtual router
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterConfig {
    pub local_asn: u32,
    pub router_id: Ipv4Addr,
    pub listen_port: u16,
    pub neighbors: Vec<PeerConfig>,
    pub advertisements: Vec<IpNetwork>,
}

#[derive(Default)]
struct Desired {
    generation: u64,
    routers: BTreeMap<u32, RouterConfig>,
}

/// PeerRegistry maintains the desired set of virtual routers keyed by
/// local ASN
pub struct PeerRegistry {
    desired: Arc<RwLock<Desired>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            desired: Arc::new(RwLock::new(Desired::default())),
        }
    }

    /// List all desired routers, ordered by local ASN
    pub async fn routers(&self) -> Vec<RouterConfig> {
        let desired = self.desired.read().await;
        desired.routers.values().cloned().collect()
    }

    /// Get the desired router for a local ASN
    pub async fn router(&self, asn: u32) -> Option<RouterConfig> {
        let desired = self.desired.read().await;
        desired.routers.get(&asn).cloned()
    }

    pub async fn router_count(&self) -> usize {
        let desired = self.desired.read().await;
        desired.routers.len()
    }

    /// Number of configurations applied so far, withdrawals included
    pub async fn generation(&self) -> u64 {
        let desired = self.desired.read().await;
        desired.generation
    }

    async fn replace(&self, routers: BTreeMap<u32, RouterConfig>) {
        let mut desired = self.desired.write().await;

        let removed: Vec<u32> = desired
            .routers
            .keys()
            .filter(|asn| !routers.contains_key(*asn))
            .copied()
            .collect();
        let added: Vec<u32> = routers
            .keys()
            .filter(|asn| !desired.routers.contains_key(*asn))
            .copied()
            .collect();
        let updated: Vec<u32> = routers
            .iter()
            .filter(|(asn, cfg)| desired.routers.get(*asn).is_some_and(|old| old != *cfg))
            .map(|(asn, _)| *asn)
            .collect();

        if !(removed.is_empty() && added.is_empty() && updated.is_empty()) {
            info!(
                ?added,
                ?removed,
                ?updated,
                "Desired BGP virtual routers changed"
            );
        }

        desired.routers = routers;
        desired.generation += 1;
        debug!("Applied desired BGP configuration generation {}", desired.generation);
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BgpRouterManager for PeerRegistry {
    async fn configure_peers(
        &self,
        policy: Option<&BGPPeeringPolicy>,
        state: Option<&ControlPlaneState>,
    ) -> Result<()> {
        let Some(policy) = policy else {
            self.replace(BTreeMap::new()).await;
            return Ok(());
        };
        let state = state.ok_or_else(|| {
            CoreError::InvalidConfiguration(format!(
                "policy {} provided without control plane state",
                policy.name_any()
            ))
        })?;

        let routers = desired_routers(policy, state)?;
        self.replace(routers).await;
        Ok(())
    }
}

/// Build the router configurations a policy asks for on this node
pub fn desired_routers(
    policy: &BGPPeeringPolicy,
    state: &ControlPlaneState,
) -> Result<BTreeMap<u32, RouterConfig>> {
    let mut routers = BTreeMap::new();

    for vr in &policy.spec.virtual_routers {
        if routers.contains_key(&vr.local_asn) {
            return Err(CoreError::InvalidConfiguration(format!(
                "policy {} defines local ASN {} more than once",
                policy.name_any(),
                vr.local_asn
            )));
        }

        let router_id = state
            .annotations
            .resolve_router_id(vr.local_asn)
            .or(state.ipv4)
            .ok_or_else(|| {
                CoreError::InvalidConfiguration(format!(
                    "router id for ASN {} not specified by annotation and no IPv4 address assigned",
                    vr.local_asn
                ))
            })?;

        let listen_port = state
            .annotations
            .get(vr.local_asn)
            .and_then(|attrs| attrs.local_port)
            .unwrap_or(DEFAULT_BGP_PORT);

        let neighbors = vr
            .neighbors
            .iter()
            .map(|n| {
                let address = n.peer_address.parse::<IpNetwork>().map_err(|e| {
                    CoreError::InvalidConfiguration(format!(
                        "invalid peer address {:?}: {}",
                        n.peer_address, e
                    ))
                })?;
                Ok(PeerConfig {
                    address,
                    asn: n.peer_asn,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let advertisements = if vr.export_pod_cidr {
            state
                .pod_cidrs
                .iter()
                .map(|cidr| {
                    cidr.parse::<IpNetwork>().map_err(|e| {
                        CoreError::InvalidConfiguration(format!(
                            "invalid pod CIDR {:?}: {}",
                            cidr, e
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        routers.insert(
            vr.local_asn,
            RouterConfig {
                local_asn: vr.local_asn,
                router_id,
                listen_port,
                neighbors,
                advertisements,
            },
        );
    }

    Ok(routers)
}
