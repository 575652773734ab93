use anyhow::Result;
use clap::Parser;
use kube::Client;
use router_bgp::{ControllerConfig, IpamMode, PeerRegistry, ReconciliationController};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Node-local BGP control plane", long_about = None)]
struct Args {
    /// Enable the BGP control plane
    #[arg(long, env = "BGP_CONTROL_PLANE_ENABLED")]
    enabled: bool,

    /// IPAM mode of the cluster (kubernetes, cluster-pool, cluster-pool-v2)
    #[arg(long, env = "IPAM_MODE", default_value = "kubernetes")]
    ipam_mode: IpamMode,

    /// Name of the node this agent runs on
    #[arg(long, env = "NODE_NAME")]
    node_name: String,

    /// Externally reachable IPv4 address of this node
    #[arg(long, env = "NODE_IPV4")]
    node_ipv4: Option<Ipv4Addr>,

    /// Externally reachable IPv6 address of this node
    #[arg(long, env = "NODE_IPV6")]
    node_ipv6: Option<Ipv6Addr>,

    /// Seconds to wait for the controller to drain on shutdown
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    shutdown_timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            enabled: self.enabled,
            ipam_mode: self.ipam_mode.clone(),
            node_name: self.node_name.clone(),
            node_ipv4: self.node_ipv4,
            node_ipv6: self.node_ipv6,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            ..Default::default()
        }
    }
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Starting bgp-controller v{}", env!("CARGO_PKG_VERSION"));

    let config = args.controller_config();
    let client = Client::try_default().await?;
    let registry = Arc::new(PeerRegistry::new());

    let Some(controller) = ReconciliationController::new(client, &config, registry)? else {
        info!("BGP control plane disabled, waiting for shutdown signal");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    };
    let controller = Arc::new(controller);
    controller.start()?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping controller...");

    if let Err(e) = controller.stop(config.shutdown_timeout).await {
        error!("BGP control plane did not stop cleanly: {}", e);
        return Err(e.into());
    }
    info!("Shutdown complete");

    Ok(())
}
