// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit hook configuration, constructed once at startup and threaded
//! through every component. There is no ambient global; the root reference
//! and every artifact path live here.

use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use reftrust_core::Revision;

/// Name of the configuration document inside the git directory.
pub const CONFIG_FILE: &str = "reftrust.json";

/// Durable half of the configuration, written at provisioning.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    root_reference: String,
    #[serde(default)]
    authorized_keys: Option<PathBuf>,
}

/// Everything the gateway needs to know about one repository.
#[derive(Clone, Debug)]
pub struct HookConfig {
    /// Hash of the fixed zero-parent genesis commit identifying which
    /// branches belong to this system.
    pub root_reference: Revision,
    /// Absolute path of the repository's git directory.
    pub git_dir: PathBuf,
    /// Persisted trust-graph document.
    pub document_path: PathBuf,
    /// Signer allowlist consumed by the signature-verification primitive.
    pub allowed_signers_path: PathBuf,
    /// Shared authorized_keys file holding the forced-command entries.
    pub authorized_keys_path: PathBuf,
    /// Append-only audit trail.
    pub audit_log_path: PathBuf,
    /// Log of forwarded SSH commands, written by the capability scripts.
    pub ssh_log_path: PathBuf,
    /// Read-only capability script.
    pub pull_script_path: PathBuf,
    /// Read/write capability script.
    pub push_pull_script_path: PathBuf,
    /// Lock file serializing whole runs against each other.
    pub lock_path: PathBuf,
}

impl HookConfig {
    /// Build a configuration for the given git directory.
    ///
    /// With no explicit authorized_keys path, the invoking user's
    /// `~/.ssh/authorized_keys` is used.
    pub fn new(
        root_reference: Revision,
        git_dir: PathBuf,
        authorized_keys: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if root_reference.as_str().is_empty() {
            return Err(ConfigError::MissingRootReference);
        }

        let authorized_keys = match authorized_keys {
            Some(path) => path,
            None => {
                let home = env::var_os("HOME").ok_or(ConfigError::NoHomeDirectory)?;
                PathBuf::from(home).join(".ssh").join("authorized_keys")
            }
        };

        Ok(Self {
            root_reference,
            document_path: git_dir.join("trust_graph.json"),
            allowed_signers_path: git_dir.join("allowed_signers"),
            authorized_keys_path: authorized_keys,
            audit_log_path: git_dir.join("reftrust.log"),
            ssh_log_path: git_dir.join("ssh.log"),
            pull_script_path: git_dir.join("git-pull.sh"),
            push_pull_script_path: git_dir.join("git-push-pull.sh"),
            lock_path: git_dir.join("reftrust.lock"),
            git_dir,
        })
    }

    /// Load the configuration written at provisioning.
    ///
    /// Missing or malformed configuration is fatal before any validation
    /// runs.
    pub fn load(git_dir: &Path) -> Result<Self, ConfigError> {
        let path = git_dir.join(CONFIG_FILE);
        let text = fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::Missing(path.clone()),
            _ => ConfigError::Unreadable {
                path: path.clone(),
                source,
            },
        })?;
        let document: ConfigDocument = serde_json::from_str(&text)?;
        Self::new(
            Revision::new(document.root_reference),
            git_dir.to_path_buf(),
            document.authorized_keys,
        )
    }

    /// Persist the durable half of the configuration.
    pub fn store(&self) -> Result<(), ConfigError> {
        let document = ConfigDocument {
            root_reference: self.root_reference.as_str().to_string(),
            authorized_keys: Some(self.authorized_keys_path.clone()),
        };
        let path = self.git_dir.join(CONFIG_FILE);
        let text = serde_json::to_string_pretty(&document)?;
        fs::write(&path, text).map_err(|source| ConfigError::Unreadable { path, source })
    }
}

/// Error types for hook configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration document; the repository was never provisioned.
    #[error("hook configuration {0} is missing; run `reftrust-hook init` first")]
    Missing(PathBuf),

    /// Configuration document could not be read or written.
    #[error("failed to access hook configuration {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration document does not match the schema.
    #[error("hook configuration is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Configuration carries no root reference.
    #[error("hook configuration has an empty root reference")]
    MissingRootReference,

    /// No home directory to locate the default authorized_keys file.
    #[error("no home directory found to locate authorized_keys")]
    NoHomeDirectory,
}

#[cfg(test)]
mod tests {
    use std::fs;

    use reftrust_core::Revision;

    use super::{ConfigError, HookConfig};

    #[test]
    fn store_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = HookConfig::new(
            Revision::new("97c6ba700b9f79a72b1d97160ca4d767e2c66e53"),
            dir.path().to_path_buf(),
            Some(dir.path().join("authorized_keys")),
        )
        .unwrap();
        config.store().unwrap();

        let loaded = HookConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.root_reference, config.root_reference);
        assert_eq!(loaded.authorized_keys_path, config.authorized_keys_path);
        assert_eq!(loaded.document_path, config.document_path);
    }

    #[test]
    fn missing_configuration_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            HookConfig::load(dir.path()),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn malformed_configuration_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("reftrust.json"), "{ nope").unwrap();
        assert!(matches!(
            HookConfig::load(dir.path()),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn empty_root_reference_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = HookConfig::new(
            Revision::new(""),
            dir.path().to_path_buf(),
            Some(dir.path().join("authorized_keys")),
        );
        assert!(matches!(result, Err(ConfigError::MissingRootReference)));
    }
}
