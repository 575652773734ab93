//! Datum Router API types and CRDs for the BGP control plane
//!
//! This library defines the custom resources consumed by the node agent:
//! - BGPPeeringPolicy: cluster-wide declarative BGP peering, selected per node
//! - RouterNode: per-node pod CIDR allocations from the cluster-pool allocator

pub mod v1alpha1;

pub use v1alpha1::{BGPPeeringPolicy, Neighbor, RouterNode, VirtualRouter};
