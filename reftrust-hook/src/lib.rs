// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-side pre-receive gateway enforcing trust-graph access control.
//!
//! The version-control engine invokes this gateway once per push with one
//! ref-update record per line on stdin. The gateway validates every ref
//! against the rules in `reftrust-core`, folds the extracted trust
//! operations into the persisted graph, derives the access sets and
//! rewrites the signer allowlist and the forced-command entries. Exit code
//! zero accepts the push; anything else rejects every ref in it.

pub mod audit;
pub mod config;
pub mod git;
pub mod lock;
pub mod materialize;
pub mod provision;
pub mod run;

pub use config::{ConfigError, HookConfig};
pub use git::GitRepository;
pub use provision::provision;
pub use run::{HookError, execute, run_pre_receive};
