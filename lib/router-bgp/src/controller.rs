//! BGP control plane controller
//!
//! The controller listens for changes to peering policies and to the local
//! node, and drives the configured [`BgpRouterManager`] toward the peering
//! the single applicable policy describes.

use kube::{Client, ResourceExt};
use router_core::signal::{self, Signaler, Signals};
use router_core::{
    select_policy, AnnotationMap, ControlPlaneState, CoreError, Result, WorkerPool,
};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Span};

use crate::config::{ControllerConfig, IpamMode};
use crate::manager::BgpRouterManager;
use crate::node::{KubernetesNodeState, NodeStateProvider, RouterNodeState};
use crate::policy_source::{KubePolicySource, PolicySource};

/// One slot each for the policy watch, the node watch and the control loop
const POOL_SIZE: usize = 3;

/// The event sources a controller reconciles from. `signaler` must be the
/// one both sources raise their change events on.
pub struct Sources {
    pub signaler: Signaler,
    pub signals: Signals,
    pub node_state: Arc<dyn NodeStateProvider>,
    pub policies: Arc<dyn PolicySource>,
}

/// ReconciliationController is the node-side BGP control plane.
pub struct ReconciliationController {
    node_state: Arc<dyn NodeStateProvider>,
    policies: Arc<dyn PolicySource>,
    manager: Arc<dyn BgpRouterManager>,
    signaler: Signaler,
    signals: Mutex<Signals>,
    node_ipv4: Option<Ipv4Addr>,
    node_ipv6: Option<Ipv6Addr>,
    withdrawal_timeout: Duration,
    pool: WorkerPool,
    started: AtomicBool,
    span: Span,
}

impl ReconciliationController {
    /// Build a controller watching the API server.
    ///
    /// Returns `Ok(None)` when the control plane is disabled. The IPAM mode
    /// decides whether node state comes from the `Node` or the `RouterNode`
    /// object.
    pub fn new(
        client: Client,
        config: &ControllerConfig,
        manager: Arc<dyn BgpRouterManager>,
    ) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        if config.node_name.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "node name must be set".to_string(),
            ));
        }

        let (signaler, signals) = signal::channel();

        let node_state: Arc<dyn NodeStateProvider> = match &config.ipam_mode {
            IpamMode::Kubernetes => Arc::new(KubernetesNodeState::new(
                client.clone(),
                &config.node_name,
                signaler.clone(),
            )),
            IpamMode::ClusterPool | IpamMode::ClusterPoolV2 => Arc::new(RouterNodeState::new(
                client.clone(),
                &config.node_name,
                signaler.clone(),
            )),
            IpamMode::Other(mode) => return Err(CoreError::UnsupportedIpamMode(mode.clone())),
        };
        let policies = Arc::new(KubePolicySource::new(client, signaler.clone()));

        info!(
            node = %config.node_name,
            ipam = %config.ipam_mode,
            "Configured BGP control plane"
        );

        Ok(Some(Self::with_sources(
            config,
            Sources {
                signaler,
                signals,
                node_state,
                policies,
            },
            manager,
        )))
    }

    /// Build a controller from already constructed sources
    pub fn with_sources(
        config: &ControllerConfig,
        sources: Sources,
        manager: Arc<dyn BgpRouterManager>,
    ) -> Self {
        Self {
            node_state: sources.node_state,
            policies: sources.policies,
            manager,
            signaler: sources.signaler,
            signals: Mutex::new(sources.signals),
            node_ipv4: config.node_ipv4,
            node_ipv6: config.node_ipv6,
            withdrawal_timeout: config.withdrawal_timeout,
            pool: WorkerPool::new(POOL_SIZE),
            started: AtomicBool::new(false),
            span: tracing::info_span!("bgp_control_plane", node = %config.node_name),
        }
    }

    /// Replace the span all of the controller's logging is recorded under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Signaler that wakes this controller
    pub fn signaler(&self) -> &Signaler {
        &self.signaler
    }

    /// Start the policy watch, the node watch and the control loop.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CoreError::AlreadyStarted);
        }
        let _entered = self.span.enter();

        let this = Arc::clone(self);
        self.pool.submit("policy-watch", move |token| async move {
            this.policies.run(token).await?;
            Ok::<_, anyhow::Error>(())
        })?;

        let this = Arc::clone(self);
        self.pool.submit("node-state-watch", move |token| async move {
            this.node_state.run(token).await?;
            Ok::<_, anyhow::Error>(())
        })?;

        let this = Arc::clone(self);
        self.pool.submit("controller", move |token| async move {
            this.run(token).await;
            Ok::<_, anyhow::Error>(())
        })?;

        Ok(())
    }

    /// Cancel all tasks and wait for them, giving up after `deadline`.
    pub async fn stop(&self, deadline: Duration) -> Result<()> {
        info!(parent: &self.span, "Stopping BGP control plane controller");
        tokio::time::timeout(deadline, self.pool.close())
            .await
            .map_err(|_| CoreError::ShutdownDeadlineExceeded)
    }

    /// Run the control loop until `shutdown` fires.
    ///
    /// Every drained signal triggers one full reconciliation. Once `shutdown`
    /// fires, no further reconciliation starts; all peering is withdrawn
    /// before returning.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut signals = self.signals.lock().await;

        // kick off the first reconciliation
        self.signaler.event();

        info!("BGP control plane controller now running");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                woke = signals.recv() => {
                    if !woke {
                        warn!("All signal sources are gone, exiting control loop");
                        break;
                    }
                    info!("BGP control plane controller woken for reconciliation");
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {
                            warn!("Shutdown interrupted an in-flight reconciliation");
                            break;
                        }
                        result = self.reconcile() => match result {
                            Ok(()) => debug!("Successfully completed reconciliation"),
                            Err(e) => error!("Encountered error during reconciliation: {}", e),
                        },
                    }
                }
            }
        }

        if tokio::time::timeout(self.withdrawal_timeout, self.full_withdrawal())
            .await
            .is_err()
        {
            error!(
                "Full withdrawal did not complete within {:?}",
                self.withdrawal_timeout
            );
        }
        info!("BGP control plane controller shut down");
    }

    /// Run one reconciliation pass against the current state of the world.
    ///
    /// Only a single BGPPeeringPolicy may apply to this node. When none
    /// applies, or more than one does, all peering is withdrawn.
    pub async fn reconcile(&self) -> Result<()> {
        let policies = self.policies.list().await?;
        debug!(count = policies.len(), "Listed BGPPeeringPolicies");

        let labels = self.node_state.labels().await?;

        let policy = match select_policy(&labels, &policies) {
            Ok(policy) => policy,
            Err(e) => {
                error!("Policy selection failed: {}", e);
                self.full_withdrawal().await;
                return Err(e);
            }
        };
        let Some(policy) = policy else {
            debug!("No BGP peering policy applies to this node, any existing BGP sessions will be removed");
            self.full_withdrawal().await;
            return Ok(());
        };

        // a malformed annotation fails the pass before anything is applied
        let annotations = self.node_state.annotations().await?;
        let annotations = AnnotationMap::new(&annotations)?;

        let pod_cidrs = self.node_state.pod_cidrs().await?;

        let state = ControlPlaneState {
            pod_cidrs,
            annotations,
            ipv4: self.node_ipv4,
            ipv6: self.node_ipv6,
        };

        debug!(
            policy = %policy.name_any(),
            "Asking BGP router manager to configure peering"
        );
        self.manager
            .configure_peers(Some(&policy), Some(&state))
            .await
            .map_err(|e| {
                CoreError::Backend(format!(
                    "cannot apply BGP peering policy {}: {}",
                    policy.name_any(),
                    e
                ))
            })
    }

    /// Instruct the router manager to withdraw all routers and peers.
    pub async fn full_withdrawal(&self) {
        if let Err(e) = self.manager.configure_peers(None, None).await {
            error!("BGP router manager failed a full withdrawal: {}", e);
        }
    }
}
