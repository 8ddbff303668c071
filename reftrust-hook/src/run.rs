// SPDX-License-Identifier: MIT OR Apache-2.0

//! One gateway run: validate a push, fold the result into the graph,
//! rematerialize access.
//!
//! The run is strictly sequential and fail-closed. The persisted graph is
//! loaded before any validation; buffered trust operations are applied
//! only after every ref has passed; artifacts are rewritten only after the
//! graph has been persisted. Any error anywhere rejects the entire push
//! and leaves graph and artifacts exactly as they were.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::{fs, process};

use thiserror::Error;

use reftrust_core::{
    AccessSets, DocumentError, RefOutcome, RefUpdate, RefUpdateError, RepositoryLog,
    TrustDocument, TrustGraph, TrustOp, TrustOpKind, ValidationError, Validator,
};

use crate::audit::AuditLog;
use crate::config::{ConfigError, HookConfig};
use crate::git::GitRepository;
use crate::lock::RunLock;
use crate::materialize::{self, MaterializeError};

/// Run the gateway against the production git repository.
pub fn run_pre_receive(config: &HookConfig, input: impl BufRead) -> Result<(), HookError> {
    let repository = GitRepository::new(&config.git_dir);
    execute(config, &repository, input)
}

/// Run the gateway against any repository port.
///
/// Holds the run lock for the whole sequence and guarantees the audit log
/// records the outcome, accepted or not, before returning.
pub fn execute<R: RepositoryLog>(
    config: &HookConfig,
    repository: &R,
    input: impl BufRead,
) -> Result<(), HookError> {
    let mut audit = AuditLog::open(&config.audit_log_path)?;
    let _lock = RunLock::acquire(&config.lock_path)?;

    audit.record(format!(
        "run started: pid {} repository {}",
        process::id(),
        config.git_dir.display()
    ))?;

    match process_push(config, repository, input, &mut audit) {
        Ok(()) => {
            audit.record("push accepted")?;
            Ok(())
        }
        Err(err) => {
            // Best effort; the rejection stands even if the audit write
            // fails.
            let _ = audit.record(format!("push rejected: {err}"));
            Err(err)
        }
    }
}

fn process_push<R: RepositoryLog>(
    config: &HookConfig,
    repository: &R,
    input: impl BufRead,
    audit: &mut AuditLog,
) -> Result<(), HookError> {
    // Configuration failures abort before any validation.
    let mut graph = load_graph(config)?;

    let updates = parse_input(input)?;
    let validator = Validator::new(repository, &config.root_reference);

    let mut ops: Vec<TrustOp> = Vec::new();
    for update in &updates {
        audit.record(format!(
            "ref {}: {} -> {}",
            update.ref_name, update.old, update.new
        ))?;
        match validator.validate_ref(update)? {
            RefOutcome::Skipped(reason) => {
                audit.record(format!("ref {} skipped: {reason}", update.ref_name))?;
            }
            RefOutcome::Validated(ref_ops) => {
                audit.record(format!(
                    "ref {} validated, {} trust operation(s)",
                    update.ref_name,
                    ref_ops.len()
                ))?;
                ops.extend(ref_ops);
            }
        }
    }

    // Every ref passed; only now do the buffered operations touch the
    // graph, in the order the commits were encountered.
    for op in &ops {
        graph.apply(op);
        let verb = match op.kind {
            TrustOpKind::Grant => "granted",
            TrustOpKind::Revoke => "revoked",
        };
        audit.record(format!("{verb} trust: {} -> {}", op.actor, op.target))?;
    }

    let access = AccessSets::derive(&graph);
    store_graph(config, &graph)?;
    materialize::write_allowed_signers(config, graph.owner(), &access)?;
    materialize::rewrite_authorized_keys(config, &access)?;

    audit.record(format!(
        "access materialized: {} push-pull, {} pull-only",
        access.push_pull.len(),
        access.pull_only.len()
    ))?;
    Ok(())
}

fn load_graph(config: &HookConfig) -> Result<TrustGraph, HookError> {
    let text =
        fs::read_to_string(&config.document_path).map_err(|source| HookError::DocumentIo {
            path: config.document_path.clone(),
            source,
        })?;
    Ok(TrustDocument::from_json(&text)?.into_graph()?)
}

pub(crate) fn store_graph(config: &HookConfig, graph: &TrustGraph) -> Result<(), HookError> {
    let text = TrustDocument::from_graph(graph).to_json()?;
    fs::write(&config.document_path, text).map_err(|source| HookError::DocumentIo {
        path: config.document_path.clone(),
        source,
    })
}

fn parse_input(input: impl BufRead) -> Result<Vec<RefUpdate>, HookError> {
    let mut updates = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        updates.push(line.parse::<RefUpdate>()?);
    }
    Ok(updates)
}

/// Everything that can end a run with a rejection.
#[derive(Error, Debug)]
pub enum HookError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persisted trust-graph document missing or unreadable.
    #[error("failed to access trust-graph document {path}")]
    DocumentIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    RefUpdate(#[from] RefUpdateError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    /// Audit log, run lock or control channel failure.
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
}
