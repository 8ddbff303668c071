// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted trust-graph document.
//!
//! The durable form of the graph is a small JSON document with an explicit
//! schema, validated when loaded. A missing or malformed document is a
//! configuration failure surfaced before any validation runs, never a
//! panic deep inside derivation logic.
//!
//! ```json
//! {
//!   "owner": "<raw key material>",
//!   "trustgraph": [
//!     { "pub_key": "<raw key material>", "trust": ["<raw key material>"] }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::TrustGraph;
use crate::identity::KeyMaterial;

/// Serialized trust graph as it lives on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustDocument {
    pub owner: String,
    pub trustgraph: Vec<TrustEntry>,
}

/// One node of the serialized graph: an identity and its trustees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustEntry {
    pub pub_key: String,
    pub trust: Vec<String>,
}

impl TrustDocument {
    /// Parse and validate a document from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let document: Self = serde_json::from_str(json)?;
        if document.owner.is_empty() {
            return Err(DocumentError::MissingOwner);
        }
        Ok(document)
    }

    /// Serialize the document to JSON text.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Snapshot a graph into its durable form.
    ///
    /// Entries are emitted in key order so repeated snapshots of the same
    /// graph are byte-identical.
    pub fn from_graph(graph: &TrustGraph) -> Self {
        let trustgraph = graph
            .nodes()
            .iter()
            .map(|(identity, edges)| TrustEntry {
                pub_key: identity.as_str().to_string(),
                trust: edges.iter().map(|key| key.as_str().to_string()).collect(),
            })
            .collect();

        Self {
            owner: graph.owner().as_str().to_string(),
            trustgraph,
        }
    }

    /// Rebuild the in-memory graph from the document.
    ///
    /// Edge targets missing their own entry are auto-created with an empty
    /// edge set, matching the graph invariant.
    pub fn into_graph(self) -> Result<TrustGraph, DocumentError> {
        if self.owner.is_empty() {
            return Err(DocumentError::MissingOwner);
        }

        let mut graph = TrustGraph::new(KeyMaterial::new(self.owner));
        for entry in self.trustgraph {
            let edges: BTreeSet<KeyMaterial> =
                entry.trust.into_iter().map(KeyMaterial::new).collect();
            graph.insert_node(KeyMaterial::new(entry.pub_key), edges);
        }
        Ok(graph)
    }
}

/// Error types for loading and storing the trust-graph document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Document text does not match the schema.
    #[error("trust-graph document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Document carries no owner identity.
    #[error("trust-graph document has no owner")]
    MissingOwner,
}

#[cfg(test)]
mod tests {
    use super::{DocumentError, TrustDocument};
    use crate::graph::TrustGraph;
    use crate::identity::KeyMaterial;

    #[test]
    fn schema_round_trip() {
        let json = r#"{
            "owner": "key-o",
            "trustgraph": [
                { "pub_key": "key-a", "trust": [] },
                { "pub_key": "key-o", "trust": ["key-a"] }
            ]
        }"#;

        let document = TrustDocument::from_json(json).unwrap();
        let graph = document.clone().into_graph().unwrap();
        assert_eq!(graph.owner(), &KeyMaterial::new("key-o"));
        assert!(
            graph
                .trusted_by(&KeyMaterial::new("key-o"))
                .contains(&KeyMaterial::new("key-a"))
        );

        assert_eq!(TrustDocument::from_graph(&graph), document);
    }

    #[test]
    fn snapshot_is_deterministic() {
        let mut graph = TrustGraph::new(KeyMaterial::new("key-o"));
        graph.apply_grant(&KeyMaterial::new("key-o"), &KeyMaterial::new("key-b"));
        graph.apply_grant(&KeyMaterial::new("key-o"), &KeyMaterial::new("key-a"));

        let first = TrustDocument::from_graph(&graph).to_json().unwrap();
        let second = TrustDocument::from_graph(&graph).to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn dangling_trustees_become_nodes() {
        let json = r#"{
            "owner": "key-o",
            "trustgraph": [
                { "pub_key": "key-o", "trust": ["key-a"] }
            ]
        }"#;

        let graph = TrustDocument::from_json(json).unwrap().into_graph().unwrap();
        assert!(graph.contains(&KeyMaterial::new("key-a")));
        assert!(graph.trusted_by(&KeyMaterial::new("key-a")).is_empty());
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            TrustDocument::from_json("{ not json"),
            Err(DocumentError::Malformed(_))
        ));
        assert!(matches!(
            TrustDocument::from_json(r#"{ "trustgraph": [] }"#),
            Err(DocumentError::Malformed(_))
        ));
        assert!(matches!(
            TrustDocument::from_json(r#"{ "owner": "", "trustgraph": [] }"#),
            Err(DocumentError::MissingOwner)
        ));
    }
}
