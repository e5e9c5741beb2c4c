//! Policy differ
//!
//! Computes the add/prune delta between the desired and current policy sets.
//! The known-variants table is the safety gate: a current policy is only
//! eligible for pruning when its destination was at some point authored by
//! this controller. Destinations are promoted to "authored" before the
//! create call is issued, so prune logic stays safe across partial failures.

use std::collections::HashMap;
use variant_core::Policy;

/// The delta the applier executes: prune first, then add.
#[derive(Debug, Default, PartialEq)]
pub struct PolicyDelta {
    pub to_add: Vec<Policy>,
    pub to_prune: Vec<Policy>,
}

/// Diff desired against current.
///
/// Every policy in `to_add` has its destination marked authored in
/// `known_variants`; `to_prune` only contains policies whose destination is
/// already marked authored.
pub fn diff_policies(
    desired: &[Policy],
    current: &[Policy],
    known_variants: &mut HashMap<String, bool>,
) -> PolicyDelta {
    let mut to_add = Vec::new();
    for policy in desired {
        if !current.contains(policy) {
            known_variants.insert(policy.destination.clone(), true);
            to_add.push(policy.clone());
        }
    }

    let mut to_prune = Vec::new();
    for policy in current {
        if !desired.contains(policy)
            && known_variants.get(&policy.destination).copied().unwrap_or(false)
        {
            to_prune.push(policy.clone());
        }
    }

    PolicyDelta { to_add, to_prune }
}
