// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reftrust_hook::{HookConfig, provision, run_pre_receive};
use reftrust_core::{KeyMaterial, Revision};

#[derive(Debug, Parser)]
#[command(
    name = "reftrust-hook",
    about = "Trust-graph access control for shared git repositories",
    version
)]
struct Cli {
    /// Git directory of the managed repository. Defaults to $GIT_DIR or
    /// the current directory, matching how git invokes hooks.
    #[arg(long, global = true)]
    git_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a push; reads ref-update records from stdin.
    ///
    /// This is the pre-receive hook entry point. Exit code zero accepts
    /// the push, anything else rejects every ref in it.
    PreReceive,

    /// Provision a repository for access control.
    Init {
        /// Raw public-key material of the repository owner.
        #[arg(long)]
        owner: String,

        /// Hash of the zero-parent root commit marking managed branches.
        #[arg(long)]
        root_reference: String,

        /// Path of the authorized_keys file to manage. Defaults to
        /// ~/.ssh/authorized_keys.
        #[arg(long)]
        authorized_keys: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let git_dir = cli
        .git_dir
        .or_else(|| std::env::var_os("GIT_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let result = match cli.command {
        Command::PreReceive => pre_receive(&git_dir),
        Command::Init {
            owner,
            root_reference,
            authorized_keys,
        } => init(&git_dir, owner, root_reference, authorized_keys),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn pre_receive(git_dir: &Path) -> anyhow::Result<()> {
    let config = HookConfig::load(git_dir)?;
    let stdin = io::stdin();
    run_pre_receive(&config, stdin.lock()).context("push rejected")
}

fn init(
    git_dir: &Path,
    owner: String,
    root_reference: String,
    authorized_keys: Option<PathBuf>,
) -> anyhow::Result<()> {
    anyhow::ensure!(!owner.is_empty(), "owner key material must not be empty");
    let config = provision(
        git_dir,
        Revision::new(root_reference),
        KeyMaterial::new(owner),
        authorized_keys,
    )
    .context("provisioning failed")?;
    println!(
        "provisioned {} (root reference {})",
        config.git_dir.display(),
        config.root_reference
    );
    Ok(())
}
