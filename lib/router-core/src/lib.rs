//! Core BGP control plane logic
//!
//! This library provides:
//! - Coalescing wake-up signals for the control loop
//! - Node selector evaluation and single-policy selection
//! - Parsing of per-node virtual router annotations
//! - The point-in-time state snapshot handed to routing backends
//! - A bounded pool for the controller's long-running tasks

pub mod annotations;
pub mod error;
pub mod policy;
pub mod pool;
pub mod selector;
pub mod signal;
pub mod state;

pub use annotations::{AnnotationError, AnnotationMap, VirtualRouterAttributes};
pub use error::{CoreError, Result};
pub use policy::select_policy;
pub use pool::WorkerPool;
pub use selector::Selector;
pub use signal::{Signaler, Signals};
pub use state::ControlPlaneState;
