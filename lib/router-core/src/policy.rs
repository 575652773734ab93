//! Policy selection
//!
//! A policy applies to a node when its node selector matches the node's
//! labels. At most one policy may apply to a node; more than one is a
//! configuration error and no policy is applied.

use router_api::BGPPeeringPolicy;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

use crate::selector::Selector;
use crate::{CoreError, Result};

/// Select the single policy whose node selector matches `labels`.
///
/// Returns `Ok(None)` when nothing matches. Candidates whose selector cannot
/// be parsed are logged and treated as non-matching.
pub fn select_policy(
    labels: &BTreeMap<String, String>,
    policies: &[Arc<BGPPeeringPolicy>],
) -> Result<Option<Arc<BGPPeeringPolicy>>> {
    let mut matched: Vec<&Arc<BGPPeeringPolicy>> = Vec::new();

    for policy in policies {
        let selector = match Selector::parse(policy.spec.node_selector.as_ref()) {
            Ok(selector) => selector,
            Err(e) => {
                error!(
                    policy = %policy.name_any(),
                    "Failed to convert BGPPeeringPolicy's node selector, ignoring policy: {}",
                    e
                );
                continue;
            }
        };
        debug!(
            policy = %policy.name_any(),
            selector = %selector,
            "Comparing BGP policy node selector with node's labels"
        );
        if selector.matches(labels) {
            matched.push(policy);
        }
    }

    match matched.as_slice() {
        [] => Ok(None),
        [policy] => Ok(Some(Arc::clone(policy))),
        many => {
            let mut names: Vec<String> = many.iter().map(|p| p.name_any()).collect();
            names.sort();
            Err(CoreError::AmbiguousPolicy(names))
        }
    }
}
