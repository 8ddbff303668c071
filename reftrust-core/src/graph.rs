// SPDX-License-Identifier: MIT OR Apache-2.0

//! The trust graph: identities as nodes, directed trust edges between them.
//!
//! The graph is the sole authoritative access-control state. It is mutated
//! only by validator-approved operations and persisted across invocations;
//! each run folds the operations introduced by the current push into the
//! previously persisted graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::identity::KeyMaterial;

/// Subject line which records a trust grant.
pub const GRANT_TRUST: &str = "grant-trust";

/// Subject line which records a trust revocation.
pub const REVOKE_TRUST: &str = "revoke-trust";

/// The two operations a validated commit may apply to the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrustOpKind {
    Grant,
    Revoke,
}

impl TrustOpKind {
    /// Map a commit subject line to an operation.
    ///
    /// Only an exact match counts; any other subject is a no-op for the
    /// graph, not an error.
    pub fn from_subject(subject: &str) -> Option<Self> {
        match subject {
            GRANT_TRUST => Some(Self::Grant),
            REVOKE_TRUST => Some(Self::Revoke),
            _ => None,
        }
    }
}

/// One ordered trust operation extracted from a validated commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustOp {
    /// The identity owning the branch the operation was committed to.
    pub actor: KeyMaterial,
    /// The identity being granted or revoked.
    pub target: KeyMaterial,
    pub kind: TrustOpKind,
}

impl TrustOp {
    pub fn grant(actor: KeyMaterial, target: KeyMaterial) -> Self {
        Self {
            actor,
            target,
            kind: TrustOpKind::Grant,
        }
    }

    pub fn revoke(actor: KeyMaterial, target: KeyMaterial) -> Self {
        Self {
            actor,
            target,
            kind: TrustOpKind::Revoke,
        }
    }
}

/// Directed graph of identities with exactly one designated owner.
///
/// Every edge target is a node; nodes are auto-created with an empty edge
/// set when first referenced. Node and edge sets are true sets, so adding
/// an existing edge changes nothing. No operation can change the owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustGraph {
    owner: KeyMaterial,
    nodes: BTreeMap<KeyMaterial, BTreeSet<KeyMaterial>>,
}

impl TrustGraph {
    /// Create a graph holding only the owner with an empty edge set.
    pub fn new(owner: KeyMaterial) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(owner.clone(), BTreeSet::new());
        Self { owner, nodes }
    }

    pub fn owner(&self) -> &KeyMaterial {
        &self.owner
    }

    /// All identities the given identity has an outgoing trust edge to.
    ///
    /// Unknown identities have no edges.
    pub fn trusted_by(&self, identity: &KeyMaterial) -> BTreeSet<KeyMaterial> {
        self.nodes.get(identity).cloned().unwrap_or_default()
    }

    pub fn contains(&self, identity: &KeyMaterial) -> bool {
        self.nodes.contains_key(identity)
    }

    /// Apply one validated operation.
    pub fn apply(&mut self, op: &TrustOp) {
        match op.kind {
            TrustOpKind::Grant => self.apply_grant(&op.actor, &op.target),
            TrustOpKind::Revoke => self.apply_revoke(&op.actor, &op.target),
        }
    }

    /// Add the edge actor → target, creating either node if absent.
    ///
    /// Idempotent: granting an existing edge changes nothing.
    pub fn apply_grant(&mut self, actor: &KeyMaterial, target: &KeyMaterial) {
        self.nodes.entry(target.clone()).or_default();
        self.nodes
            .entry(actor.clone())
            .or_default()
            .insert(target.clone());
    }

    /// Remove the edge actor → target if present.
    ///
    /// Revoking an absent edge is a no-op, not an error. The target node
    /// itself is kept; only the edge disappears.
    pub fn apply_revoke(&mut self, actor: &KeyMaterial, target: &KeyMaterial) {
        if let Some(edges) = self.nodes.get_mut(actor) {
            edges.remove(target);
        }
    }

    pub(crate) fn nodes(&self) -> &BTreeMap<KeyMaterial, BTreeSet<KeyMaterial>> {
        &self.nodes
    }

    pub(crate) fn insert_node(&mut self, identity: KeyMaterial, edges: BTreeSet<KeyMaterial>) {
        for target in &edges {
            self.nodes.entry(target.clone()).or_default();
        }
        self.nodes.entry(identity).or_default().extend(edges);
    }
}

#[cfg(test)]
mod tests {
    use super::{TrustGraph, TrustOp, TrustOpKind};
    use crate::identity::KeyMaterial;

    fn key(name: &str) -> KeyMaterial {
        KeyMaterial::new(name)
    }

    #[test]
    fn grant_is_idempotent() {
        let mut graph = TrustGraph::new(key("owner"));
        graph.apply_grant(&key("owner"), &key("a"));
        let once = graph.clone();
        graph.apply_grant(&key("owner"), &key("a"));
        assert_eq!(graph, once);
        assert!(graph.trusted_by(&key("owner")).contains(&key("a")));
    }

    #[test]
    fn grant_auto_creates_target_node() {
        let mut graph = TrustGraph::new(key("owner"));
        graph.apply_grant(&key("owner"), &key("a"));
        assert!(graph.contains(&key("a")));
        assert!(graph.trusted_by(&key("a")).is_empty());
    }

    #[test]
    fn revoke_of_absent_edge_is_noop() {
        let mut graph = TrustGraph::new(key("owner"));
        let before = graph.clone();
        graph.apply_revoke(&key("owner"), &key("a"));
        assert_eq!(graph, before);
    }

    #[test]
    fn revoke_removes_only_the_edge() {
        let mut graph = TrustGraph::new(key("owner"));
        graph.apply_grant(&key("owner"), &key("a"));
        graph.apply_revoke(&key("owner"), &key("a"));
        assert!(!graph.trusted_by(&key("owner")).contains(&key("a")));
        assert!(graph.contains(&key("a")));
    }

    #[test]
    fn operations_never_change_the_owner() {
        let mut graph = TrustGraph::new(key("owner"));
        graph.apply(&TrustOp::grant(key("a"), key("owner")));
        graph.apply(&TrustOp {
            actor: key("a"),
            target: key("b"),
            kind: TrustOpKind::Revoke,
        });
        assert_eq!(graph.owner(), &key("owner"));
    }

    #[test]
    fn subjects_map_to_operations() {
        assert_eq!(
            TrustOpKind::from_subject("grant-trust"),
            Some(TrustOpKind::Grant)
        );
        assert_eq!(
            TrustOpKind::from_subject("revoke-trust"),
            Some(TrustOpKind::Revoke)
        );
        assert_eq!(TrustOpKind::from_subject("fix typo"), None);
        assert_eq!(TrustOpKind::from_subject("Grant-Trust"), None);
    }
}
