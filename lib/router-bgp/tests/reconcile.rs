//! Controller reconciliation scenarios against in-memory sources and a
//! recording router manager.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::ResourceExt;
use router_api::v1alpha1::BGPPeeringPolicySpec;
use router_api::{BGPPeeringPolicy, Neighbor, VirtualRouter};
use router_bgp::{
    BgpRouterManager, ControllerConfig, IpamMode, NodeStateProvider, PolicySource,
    ReconciliationController, Sources,
};
use router_core::{signal, AnnotationMap, ControlPlaneState, CoreError, Result};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeNode {
    labels: Option<BTreeMap<String, String>>,
    annotations: BTreeMap<String, String>,
    pod_cidrs: Vec<String>,
    ignore_shutdown: bool,
}

#[async_trait]
impl NodeStateProvider for FakeNode {
    async fn labels(&self) -> Result<BTreeMap<String, String>> {
        self.labels
            .clone()
            .ok_or_else(|| CoreError::NodeNotFound("node-a".to_string()))
    }

    async fn annotations(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.annotations.clone())
    }

    async fn pod_cidrs(&self) -> Result<Vec<String>> {
        Ok(self.pod_cidrs.clone())
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        if self.ignore_shutdown {
            std::future::pending::<()>().await;
        }
        shutdown.cancelled().await;
        Ok(())
    }
}

#[derive(Default)]
struct FakePolicies {
    policies: Vec<Arc<BGPPeeringPolicy>>,
    lists: AtomicUsize,
}

#[async_trait]
impl PolicySource for FakePolicies {
    async fn list(&self) -> Result<Vec<Arc<BGPPeeringPolicy>>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.policies.clone())
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        shutdown.cancelled().await;
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct Call {
    policy: Option<String>,
    state: Option<ControlPlaneState>,
}

impl Call {
    fn is_withdrawal(&self) -> bool {
        self.policy.is_none() && self.state.is_none()
    }
}

#[derive(Default)]
struct RecordingManager {
    calls: Mutex<Vec<Call>>,
    reject_policies: bool,
}

impl RecordingManager {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BgpRouterManager for RecordingManager {
    async fn configure_peers(
        &self,
        policy: Option<&BGPPeeringPolicy>,
        state: Option<&ControlPlaneState>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            policy: policy.map(|p| p.name_any()),
            state: state.cloned(),
        });
        if policy.is_some() && self.reject_policies {
            return Err(CoreError::InvalidConfiguration("speaker unavailable".to_string()));
        }
        Ok(())
    }
}

struct Harness {
    controller: Arc<ReconciliationController>,
    policies: Arc<FakePolicies>,
    manager: Arc<RecordingManager>,
}

fn harness(node: FakeNode, policies: Vec<Arc<BGPPeeringPolicy>>, manager: RecordingManager) -> Harness {
    let config = ControllerConfig {
        enabled: true,
        ipam_mode: IpamMode::Kubernetes,
        node_name: "node-a".to_string(),
        node_ipv4: Some(Ipv4Addr::new(192, 0, 2, 5)),
        node_ipv6: None,
        ..Default::default()
    };
    let (signaler, signals) = signal::channel();
    let policies = Arc::new(FakePolicies {
        policies,
        ..Default::default()
    });
    let manager = Arc::new(manager);

    let controller = ReconciliationController::with_sources(
        &config,
        Sources {
            signaler,
            signals,
            node_state: Arc::new(node),
            policies: policies.clone(),
        },
        manager.clone(),
    );

    Harness {
        controller: Arc::new(controller),
        policies,
        manager,
    }
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn edge_node() -> FakeNode {
    FakeNode {
        labels: Some(labels(&[("role", "edge")])),
        pod_cidrs: vec!["10.0.1.0/24".to_string()],
        ..Default::default()
    }
}

fn edge_policy(name: &str) -> Arc<BGPPeeringPolicy> {
    Arc::new(BGPPeeringPolicy::new(
        name,
        BGPPeeringPolicySpec {
            node_selector: Some(LabelSelector {
                match_labels: Some(labels(&[("role", "edge")])),
                ..Default::default()
            }),
            virtual_routers: vec![VirtualRouter {
                local_asn: 64512,
                export_pod_cidr: true,
                neighbors: vec![Neighbor {
                    peer_address: "10.0.0.1/32".to_string(),
                    peer_asn: 64513,
                }],
            }],
        },
    ))
}

async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

#[tokio::test]
async fn test_no_policies_withdraws_once() {
    let h = harness(edge_node(), vec![], RecordingManager::default());

    h.controller.reconcile().await.unwrap();

    let calls = h.manager.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].is_withdrawal());
}

#[tokio::test]
async fn test_ambiguous_policies_withdraw_and_surface_error() {
    let h = harness(
        edge_node(),
        vec![edge_policy("edge-a"), edge_policy("edge-b")],
        RecordingManager::default(),
    );

    let err = h.controller.reconcile().await.unwrap_err();
    match err {
        CoreError::AmbiguousPolicy(names) => assert_eq!(names, vec!["edge-a", "edge-b"]),
        other => panic!("expected ambiguous policy error, got {}", other),
    }

    let calls = h.manager.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].is_withdrawal());
}

#[tokio::test]
async fn test_single_policy_configures_peers() {
    let h = harness(
        edge_node(),
        vec![edge_policy("edge"), {
            let mut other = (*edge_policy("core")).clone();
            other.spec.node_selector = Some(LabelSelector {
                match_labels: Some(labels(&[("role", "core")])),
                ..Default::default()
            });
            Arc::new(other)
        }],
        RecordingManager::default(),
    );

    h.controller.reconcile().await.unwrap();

    let calls = h.manager.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].policy.as_deref(), Some("edge"));
    assert_eq!(
        calls[0].state,
        Some(ControlPlaneState {
            pod_cidrs: vec!["10.0.1.0/24".to_string()],
            annotations: AnnotationMap::default(),
            ipv4: Some(Ipv4Addr::new(192, 0, 2, 5)),
            ipv6: None,
        })
    );
}

#[tokio::test]
async fn test_annotations_reach_backend() {
    let node = FakeNode {
        annotations: labels(&[
            ("router.datum.net/bgp-virtual-router.64512", "router-id=172.16.0.1"),
            ("kubeadm.alpha.kubernetes.io/cri-socket", "unix:///run/containerd.sock"),
        ]),
        ..edge_node()
    };
    let h = harness(node, vec![edge_policy("edge")], RecordingManager::default());

    h.controller.reconcile().await.unwrap();

    let calls = h.manager.calls();
    let state = calls[0].state.as_ref().unwrap();
    assert_eq!(
        state.annotations.resolve_router_id(64512),
        Some(Ipv4Addr::new(172, 16, 0, 1))
    );
}

#[tokio::test]
async fn test_malformed_annotation_skips_backend() {
    let node = FakeNode {
        annotations: labels(&[("router.datum.net/bgp-virtual-router.64512", "router-id=bogus")]),
        ..edge_node()
    };
    let h = harness(node, vec![edge_policy("edge")], RecordingManager::default());

    let err = h.controller.reconcile().await.unwrap_err();
    assert!(matches!(err, CoreError::Annotation(_)));
    assert!(h.manager.calls().is_empty());
}

#[tokio::test]
async fn test_missing_node_leaves_backend_untouched() {
    let h = harness(FakeNode::default(), vec![edge_policy("edge")], RecordingManager::default());

    let err = h.controller.reconcile().await.unwrap_err();
    assert!(matches!(err, CoreError::NodeNotFound(_)));
    assert!(h.manager.calls().is_empty());
}

#[tokio::test]
async fn test_backend_error_is_surfaced() {
    let manager = RecordingManager {
        reject_policies: true,
        ..Default::default()
    };
    let h = harness(edge_node(), vec![edge_policy("edge")], manager);

    let err = h.controller.reconcile().await.unwrap_err();
    assert!(matches!(err, CoreError::Backend(_)));
    assert_eq!(h.manager.calls().len(), 1);
}

#[tokio::test]
async fn test_signal_burst_runs_one_pass() {
    let h = harness(edge_node(), vec![edge_policy("edge")], RecordingManager::default());
    for _ in 0..25 {
        h.controller.signaler().event();
    }

    let token = CancellationToken::new();
    let controller = h.controller.clone();
    let loop_token = token.clone();
    let handle = tokio::spawn(async move { controller.run(loop_token).await });

    eventually("first pass", || h.policies.lists.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.policies.lists.load(Ordering::SeqCst), 1);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_cancel_while_idle_withdraws() {
    let h = harness(edge_node(), vec![edge_policy("edge")], RecordingManager::default());

    let token = CancellationToken::new();
    let controller = h.controller.clone();
    let loop_token = token.clone();
    let handle = tokio::spawn(async move { controller.run(loop_token).await });

    let manager = h.manager.clone();
    eventually("initial configuration", move || manager.calls().len() == 1).await;
    assert_eq!(h.manager.calls()[0].policy.as_deref(), Some("edge"));

    token.cancel();
    tokio::time::timeout(Duration::from_secs(60), handle)
        .await
        .expect("control loop did not exit")
        .unwrap();

    let calls = h.manager.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].is_withdrawal());
    assert_eq!(h.policies.lists.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancel_before_first_pass_only_withdraws() {
    let h = harness(edge_node(), vec![edge_policy("edge")], RecordingManager::default());
    let token = CancellationToken::new();
    token.cancel();

    h.controller.run(token).await;

    let calls = h.manager.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].is_withdrawal());
    assert_eq!(h.policies.lists.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_start_and_stop() {
    let h = harness(edge_node(), vec![edge_policy("edge")], RecordingManager::default());

    h.controller.start().unwrap();
    assert!(matches!(h.controller.start(), Err(CoreError::AlreadyStarted)));

    let manager = h.manager.clone();
    eventually("initial configuration", move || manager.calls().len() == 1).await;

    h.controller.stop(Duration::from_secs(5)).await.unwrap();

    let calls = h.manager.calls();
    assert!(calls.last().unwrap().is_withdrawal());
}

#[tokio::test]
async fn test_stop_reports_deadline_exceeded() {
    let node = FakeNode {
        ignore_shutdown: true,
        ..edge_node()
    };
    let h = harness(node, vec![edge_policy("edge")], RecordingManager::default());

    h.controller.start().unwrap();
    let result = h.controller.stop(Duration::from_millis(50)).await;
    assert!(matches!(result, Err(CoreError::ShutdownDeadlineExceeded)));
}

#[tokio::test]
async fn test_immediate_stop_always_withdraws() {
    for _ in 0..30 {
        let h = harness(edge_node(), vec![edge_policy("edge")], RecordingManager::default());

        h.controller.start().unwrap();
        h.controller.stop(Duration::from_secs(5)).await.unwrap();

        let calls = h.manager.calls();
        assert!(!calls.is_empty(), "control loop never ran");
        assert!(calls.last().unwrap().is_withdrawal());
    }
}
