// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-time server provisioning.
//!
//! Creates everything a managed repository needs before the first push:
//! the hook configuration, the trust-graph document holding the owner and
//! no edges, the owner-only signer allowlist, both capability scripts and
//! the log files. Client-side bootstrap (personal branches, local signing
//! configuration) is out of scope.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use reftrust_core::{AccessSets, KeyMaterial, Revision, TrustGraph};

use crate::audit::AuditLog;
use crate::config::HookConfig;
use crate::materialize;
use crate::run::HookError;

/// Provision a repository for access control.
///
/// Idempotent in effect: re-running resets the artifacts to their initial
/// state, including the trust graph.
pub fn provision(
    git_dir: &Path,
    root_reference: Revision,
    owner: KeyMaterial,
    authorized_keys: Option<PathBuf>,
) -> Result<HookConfig, HookError> {
    // Capability scripts embed this path, so it has to be absolute.
    let git_dir = git_dir.canonicalize()?;

    let config = HookConfig::new(root_reference, git_dir, authorized_keys)?;
    config.store()?;

    let graph = TrustGraph::new(owner.clone());
    let access = AccessSets::derive(&graph);

    crate::run::store_graph(&config, &graph)?;
    materialize::write_allowed_signers(&config, &owner, &access)?;
    materialize::rewrite_authorized_keys(&config, &access)?;
    materialize::write_capability_scripts(&config)?;

    OpenOptions::new()
        .append(true)
        .create(true)
        .open(&config.ssh_log_path)?;

    let mut audit = AuditLog::open(&config.audit_log_path)?;
    audit.record(format!(
        "repository provisioned: root {} owner {}",
        config.root_reference, owner
    ))?;

    Ok(config)
}
