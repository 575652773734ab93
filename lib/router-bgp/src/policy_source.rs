//! Cluster-wide BGPPeeringPolicy listing

use async_trait::async_trait;
use kube::{Api, Client};
use router_api::BGPPeeringPolicy;
use router_core::{CoreError, Result, Signaler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::watch::ReflectedWatch;

/// List+watch access to peering policies
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Every policy currently known. The first call waits for the initial
    /// listing so that an unsynced cache never reads as "no policies".
    async fn list(&self) -> Result<Vec<Arc<BGPPeeringPolicy>>>;

    /// Run the watch until `shutdown` fires
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

/// Policies watched from the API server
pub struct KubePolicySource {
    watch: ReflectedWatch<BGPPeeringPolicy>,
}

impl KubePolicySource {
    pub fn new(client: Client, signaler: Signaler) -> Self {
        Self {
            watch: ReflectedWatch::all("BGPPeeringPolicy", Api::all(client), signaler),
        }
    }
}

#[async_trait]
impl PolicySource for KubePolicySource {
    async fn list(&self) -> Result<Vec<Arc<BGPPeeringPolicy>>> {
        self.watch
            .wait_until_ready()
            .await
            .map_err(|e| CoreError::PolicyList(e.to_string()))?;
        Ok(self.watch.state())
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.watch.run(shutdown).await
    }
}
