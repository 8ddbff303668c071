// SPDX-License-Identifier: MIT OR Apache-2.0

//! Materialization of derived access into durable artifacts.
//!
//! Two artifacts are rewritten after every accepted push: the signer
//! allowlist, which decides whose signatures the verification primitive
//! will call good for future commits, and the forced-command entries in
//! the shared authorized_keys file. The allowlist is owned outright by
//! this system and rewritten whole; authorized_keys is shared with the
//! rest of the machine, so only entries pointing at this repository's
//! capability scripts are ever touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use reftrust_core::{AccessSets, KEY_ALGORITHM, KeyMaterial};

use crate::config::HookConfig;

/// Session restrictions attached to every forced-command entry.
const AUTH_OPTIONS: &str =
    "no-agent-forwarding,no-port-forwarding,no-pty,no-user-rc,no-X11-forwarding";

/// Read-only capability script: forwards nothing but an upload-pack for
/// this repository.
const PULL_SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# reftrust capability script: pull only.
echo "$SSH_ORIGINAL_COMMAND" >> {{ssh_log}}
pullpatt="git-upload-pack '{{git_dir}}'$"
if echo "$SSH_ORIGINAL_COMMAND" | grep -qE "$pullpatt"; then
    exec $SSH_ORIGINAL_COMMAND
fi
echo "reftrust: command not permitted" >&2
exit 1
"#;

/// Read/write capability script: upload-pack or receive-pack for this
/// repository, nothing else.
const PUSH_PULL_SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# reftrust capability script: push and pull.
echo "$SSH_ORIGINAL_COMMAND" >> {{ssh_log}}
pullpatt="git-upload-pack '{{git_dir}}'$"
if echo "$SSH_ORIGINAL_COMMAND" | grep -qE "$pullpatt"; then
    exec $SSH_ORIGINAL_COMMAND
fi
pushpatt="git-receive-pack '{{git_dir}}'$"
if echo "$SSH_ORIGINAL_COMMAND" | grep -qE "$pushpatt"; then
    exec $SSH_ORIGINAL_COMMAND
fi
echo "reftrust: command not permitted" >&2
exit 1
"#;

/// Substitute `{{name}}` placeholders in a script template.
///
/// Every placeholder must resolve; leftovers are a bug in the template,
/// not something to ship into an executable script.
fn render_template(
    template: &str,
    substitutions: &[(&str, &str)],
) -> Result<String, MaterializeError> {
    let mut rendered = template.to_string();
    for (name, value) in substitutions {
        rendered = rendered.replace(&format!("{{{{{name}}}}}"), value);
    }
    if let Some(start) = rendered.find("{{") {
        let tail: String = rendered[start..].chars().take(24).collect();
        return Err(MaterializeError::UnresolvedPlaceholder(tail));
    }
    Ok(rendered)
}

fn write(path: &Path, contents: &str) -> Result<(), MaterializeError> {
    fs::write(path, contents).map_err(|source| MaterializeError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewrite the signer allowlist from the derived access sets.
///
/// One line per identity in {owner} ∪ push-pull; pull-only identities do
/// not sign anything the validator accepts, so they are not listed.
pub fn write_allowed_signers(
    config: &HookConfig,
    owner: &KeyMaterial,
    access: &AccessSets,
) -> Result<(), MaterializeError> {
    let mut lines = String::new();
    lines.push_str(&format!("* {KEY_ALGORITHM} {owner}\n"));
    for identity in &access.push_pull {
        lines.push_str(&format!("* {KEY_ALGORITHM} {identity}\n"));
    }
    write(&config.allowed_signers_path, &lines)
}

fn forced_command_line(script: &Path, identity: &KeyMaterial) -> String {
    format!(
        "command=\"{}\",{AUTH_OPTIONS} {KEY_ALGORITHM} {identity}\n",
        script.display()
    )
}

/// Rewrite this repository's forced-command entries in authorized_keys.
///
/// Only previously written entries for this repository's capability
/// scripts are removed; unrelated entries in the shared file are preserved
/// byte-for-byte. A missing file counts as empty.
pub fn rewrite_authorized_keys(
    config: &HookConfig,
    access: &AccessSets,
) -> Result<(), MaterializeError> {
    let existing = match fs::read_to_string(&config.authorized_keys_path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(MaterializeError::Read {
                path: config.authorized_keys_path.clone(),
                source,
            });
        }
    };

    let pull_prefix = format!("command=\"{}\"", config.pull_script_path.display());
    let push_pull_prefix = format!("command=\"{}\"", config.push_pull_script_path.display());

    let mut lines = String::new();
    for line in existing.lines() {
        if line.starts_with(&pull_prefix) || line.starts_with(&push_pull_prefix) {
            continue;
        }
        lines.push_str(line);
        lines.push('\n');
    }

    for identity in &access.push_pull {
        lines.push_str(&forced_command_line(&config.push_pull_script_path, identity));
    }
    for identity in &access.pull_only {
        lines.push_str(&forced_command_line(&config.pull_script_path, identity));
    }

    write(&config.authorized_keys_path, &lines)
}

/// Render and install both capability scripts.
pub fn write_capability_scripts(config: &HookConfig) -> Result<(), MaterializeError> {
    let git_dir = config.git_dir.display().to_string();
    let ssh_log = config.ssh_log_path.display().to_string();
    let substitutions = [("git_dir", git_dir.as_str()), ("ssh_log", ssh_log.as_str())];

    for (path, template) in [
        (&config.pull_script_path, PULL_SCRIPT_TEMPLATE),
        (&config.push_pull_script_path, PUSH_PULL_SCRIPT_TEMPLATE),
    ] {
        let script = render_template(template, &substitutions)?;
        write(path, &script)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|source| {
                MaterializeError::Write {
                    path: path.clone(),
                    source,
                }
            })?;
        }
    }
    Ok(())
}

/// Error types for access materialization.
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unresolved placeholder in capability script template near {0:?}")]
    UnresolvedPlaceholder(String),
}
