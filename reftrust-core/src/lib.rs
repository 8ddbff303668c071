// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trust-graph access control derived from signed commit histories.
//!
//! A shared repository doubles as its own access-control ledger: every
//! identity owns one append-only branch, validated pushes carry signed
//! grant and revoke operations, and the server folds them into a single
//! persisted trust graph from which enforceable access sets are derived.
//!
//! This crate holds the pure pieces of that pipeline: the identity codec,
//! the update validator, the trust graph engine, access derivation and the
//! persisted document schema. The version-control engine is reached only
//! through the [`repository::RepositoryLog`] port, so everything here runs
//! against an in-memory fixture in tests.

pub mod access;
pub mod document;
pub mod graph;
pub mod identity;
pub mod repository;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod validate;

pub use access::AccessSets;
pub use document::{DocumentError, TrustDocument, TrustEntry};
pub use graph::{GRANT_TRUST, REVOKE_TRUST, TrustGraph, TrustOp, TrustOpKind};
pub use identity::{EncodingError, Fingerprint, KEY_ALGORITHM, KeyMaterial};
pub use repository::{
    BRANCH_REF_PREFIX, CommitInfo, RefUpdate, RefUpdateError, RepositoryError, RepositoryLog,
    Revision, SignatureStatus, ZERO_REVISION,
};
pub use validate::{CONTROL_BRANCH_SUFFIX, RefOutcome, SkipReason, ValidationError, Validator};
