// SPDX-License-Identifier: MIT OR Apache-2.0

//! Derivation of enforceable access sets from the trust graph.
//!
//! Trust reaches exactly two hops from the owner and no further: identities
//! the owner trusts directly may push and pull, identities trusted by those
//! may only pull, and a third hop confers nothing.

use std::collections::BTreeSet;

use crate::graph::TrustGraph;
use crate::identity::KeyMaterial;

/// The two capability sets derived from a trust graph.
///
/// Never stored independently; recomputed from the graph on every run and
/// immediately materialized. Both sets are disjoint from each other and
/// from the owner by construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessSets {
    /// Identities with read/write capability: trusted directly by the owner.
    pub push_pull: BTreeSet<KeyMaterial>,
    /// Identities with read-only capability: trusted by a push-pull
    /// identity and not already owner or push-pull.
    pub pull_only: BTreeSet<KeyMaterial>,
}

impl AccessSets {
    /// Compute the access sets for the given graph.
    ///
    /// Pure and deterministic; the result depends only on the owner's
    /// 2-hop neighbourhood.
    pub fn derive(graph: &TrustGraph) -> Self {
        let owner = graph.owner();

        let mut push_pull = graph.trusted_by(owner);
        push_pull.remove(owner);

        let mut pull_only = BTreeSet::new();
        for identity in &push_pull {
            for trustee in graph.trusted_by(identity) {
                if &trustee != owner && !push_pull.contains(&trustee) {
                    pull_only.insert(trustee);
                }
            }
        }

        Self {
            push_pull,
            pull_only,
        }
    }
}
