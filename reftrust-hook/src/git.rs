// SPDX-License-Identifier: MIT OR Apache-2.0

//! Production [`RepositoryLog`] backed by git plumbing.
//!
//! Every query shells out to git against a fixed git directory. Metadata
//! for one commit is fetched with a single NUL-separated `git show` so the
//! claimed fields cannot bleed into each other.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use reftrust_core::{
    CommitInfo, RepositoryError, RepositoryLog, Revision, SignatureStatus,
};

/// Format string yielding NUL-separated commit metadata:
/// id, committer name, committer email, subject, signature status code,
/// signing-key fingerprint.
const SHOW_FORMAT: &str = "--format=%H%x00%cn%x00%ce%x00%s%x00%G?%x00%GK";

/// A git repository addressed by its git directory.
#[derive(Clone, Debug)]
pub struct GitRepository {
    git_dir: PathBuf,
}

impl GitRepository {
    pub fn new(git_dir: &Path) -> Self {
        Self {
            git_dir: git_dir.to_path_buf(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<Output, RepositoryError> {
        Command::new("git")
            .arg("--git-dir")
            .arg(&self.git_dir)
            .args(args)
            .output()
            .map_err(|err| RepositoryError::Query(format!("failed to invoke git: {err}")))
    }

    /// Run a revision-listing query and collect one revision per line.
    fn rev_lines(&self, args: &[&str]) -> Result<Vec<Revision>, RepositoryError> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Err(RepositoryError::Query(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(Revision::new)
            .collect())
    }
}

impl RepositoryLog for GitRepository {
    fn root_commits(&self, rev: &Revision) -> Result<Vec<Revision>, RepositoryError> {
        self.rev_lines(&["rev-list", "--max-parents=0", rev.as_str()])
    }

    fn is_ancestor(&self, old: &Revision, new: &Revision) -> Result<bool, RepositoryError> {
        let output = self.git(&["merge-base", "--is-ancestor", old.as_str(), new.as_str()])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(RepositoryError::Query(format!(
                "git merge-base --is-ancestor failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn merge_commits(&self, rev: &Revision) -> Result<Vec<Revision>, RepositoryError> {
        self.rev_lines(&["rev-list", "--min-parents=2", rev.as_str()])
    }

    fn commits_between(
        &self,
        old: Option<&Revision>,
        new: &Revision,
    ) -> Result<Vec<Revision>, RepositoryError> {
        let range = match old {
            Some(old) => format!("{old}..{new}"),
            None => new.to_string(),
        };
        let mut revisions = self.rev_lines(&["rev-list", &range])?;
        // rev-list reports newest first; the validator wants oldest first.
        revisions.reverse();
        Ok(revisions)
    }

    fn commit_info(&self, rev: &Revision) -> Result<CommitInfo, RepositoryError> {
        let output = self.git(&["show", "-s", SHOW_FORMAT, rev.as_str()])?;
        if !output.status.success() {
            return Err(RepositoryError::UnknownRevision(rev.to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let fields: Vec<&str> = text.trim_end_matches('\n').split('\0').collect();
        let [id, name, email, subject, status, fingerprint] = fields.as_slice() else {
            return Err(RepositoryError::Query(format!(
                "unexpected metadata shape for commit {rev}"
            )));
        };

        let signature = SignatureStatus::from_code(status);
        let signing_key_fingerprint = match (signature.is_verified(), fingerprint.is_empty()) {
            (true, false) => Some((*fingerprint).to_string()),
            _ => None,
        };

        Ok(CommitInfo {
            id: Revision::new(*id),
            committer_name: (*name).to_string(),
            committer_email: (*email).to_string(),
            subject: (*subject).to_string(),
            signature,
            signing_key_fingerprint,
        })
    }
}
