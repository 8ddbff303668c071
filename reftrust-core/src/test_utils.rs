// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
//!
//! An in-memory [`RepositoryLog`] over hand-built commit DAGs, plus helpers
//! for constructing identities and signed operation commits. This is what
//! lets the validator and the graph engine run without a real repository.

use std::collections::{HashMap, HashSet, VecDeque};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::identity::KeyMaterial;
use crate::repository::{
    CommitInfo, RepositoryError, RepositoryLog, Revision, SignatureStatus,
};

/// Key material derived from a human-readable seed.
///
/// The material is valid base64 so fingerprints can be computed from it.
pub fn test_key(seed: &str) -> KeyMaterial {
    KeyMaterial::new(STANDARD.encode(seed.as_bytes()))
}

/// One commit of the fixture DAG.
#[derive(Clone, Debug)]
pub struct MemoryCommit {
    pub id: Revision,
    pub parents: Vec<Revision>,
    pub committer_name: String,
    pub committer_email: String,
    pub subject: String,
    pub signature: SignatureStatus,
    pub signing_key_fingerprint: Option<String>,
}

impl MemoryCommit {
    /// A zero-parent genesis commit.
    pub fn root(id: &str) -> Self {
        Self {
            id: Revision::new(id),
            parents: Vec::new(),
            committer_name: String::new(),
            committer_email: String::new(),
            subject: String::new(),
            signature: SignatureStatus::Unsigned,
            signing_key_fingerprint: None,
        }
    }

    /// A commit correctly signed by `author`, with the committer-email
    /// claim encoding the author and the committer-name claim naming
    /// `target`'s raw key material.
    pub fn signed_op(
        id: &str,
        parent: &str,
        author: &KeyMaterial,
        target: &KeyMaterial,
        subject: &str,
    ) -> Self {
        let fingerprint = author.fingerprint().expect("test key is valid base64");
        Self {
            id: Revision::new(id),
            parents: vec![Revision::new(parent)],
            committer_name: target.as_str().to_string(),
            committer_email: author.to_token(),
            subject: subject.to_string(),
            signature: SignatureStatus::Good,
            signing_key_fingerprint: Some(fingerprint.as_str().to_string()),
        }
    }

    /// An unsigned commit.
    pub fn unsigned(id: &str, parent: &str, subject: &str) -> Self {
        Self {
            id: Revision::new(id),
            parents: vec![Revision::new(parent)],
            committer_name: String::new(),
            committer_email: String::new(),
            subject: subject.to_string(),
            signature: SignatureStatus::Unsigned,
            signing_key_fingerprint: None,
        }
    }

    pub fn with_parents(mut self, parents: &[&str]) -> Self {
        self.parents = parents.iter().map(|id| Revision::new(*id)).collect();
        self
    }

    pub fn with_signature(mut self, status: SignatureStatus) -> Self {
        self.signature = status;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Option<&str>) -> Self {
        self.signing_key_fingerprint = fingerprint.map(str::to_string);
        self
    }

    pub fn with_committer_email(mut self, email: &str) -> Self {
        self.committer_email = email.to_string();
        self
    }
}

/// In-memory fixture repository.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository {
    commits: HashMap<Revision, MemoryCommit>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, commit: MemoryCommit) {
        self.commits.insert(commit.id.clone(), commit);
    }

    pub fn with_commits(commits: impl IntoIterator<Item = MemoryCommit>) -> Self {
        let mut repository = Self::new();
        for commit in commits {
            repository.insert(commit);
        }
        repository
    }

    /// The given revision and every ancestor of it.
    fn ancestors(&self, rev: &Revision) -> Result<HashSet<Revision>, RepositoryError> {
        if !self.commits.contains_key(rev) {
            return Err(RepositoryError::UnknownRevision(rev.to_string()));
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([rev.clone()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let commit = self
                .commits
                .get(&current)
                .ok_or_else(|| RepositoryError::UnknownRevision(current.to_string()))?;
            queue.extend(commit.parents.iter().cloned());
        }
        Ok(seen)
    }
}

impl RepositoryLog for MemoryRepository {
    fn root_commits(&self, rev: &Revision) -> Result<Vec<Revision>, RepositoryError> {
        let mut roots: Vec<Revision> = self
            .ancestors(rev)?
            .into_iter()
            .filter(|id| self.commits[id].parents.is_empty())
            .collect();
        roots.sort();
        Ok(roots)
    }

    fn is_ancestor(&self, old: &Revision, new: &Revision) -> Result<bool, RepositoryError> {
        Ok(self.ancestors(new)?.contains(old))
    }

    fn merge_commits(&self, rev: &Revision) -> Result<Vec<Revision>, RepositoryError> {
        let mut merges: Vec<Revision> = self
            .ancestors(rev)?
            .into_iter()
            .filter(|id| self.commits[id].parents.len() >= 2)
            .collect();
        merges.sort();
        Ok(merges)
    }

    fn commits_between(
        &self,
        old: Option<&Revision>,
        new: &Revision,
    ) -> Result<Vec<Revision>, RepositoryError> {
        let mut included = self.ancestors(new)?;
        if let Some(old) = old {
            for excluded in self.ancestors(old)? {
                included.remove(&excluded);
            }
        }

        // Emit oldest first: a commit only appears once all its in-range
        // parents have appeared.
        let mut pending: Vec<Revision> = included.iter().cloned().collect();
        pending.sort();
        let mut ordered = Vec::with_capacity(pending.len());
        let mut emitted: HashSet<Revision> = HashSet::new();
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|id| {
                let ready = self.commits[id]
                    .parents
                    .iter()
                    .all(|parent| !included.contains(parent) || emitted.contains(parent));
                if ready {
                    ordered.push(id.clone());
                    emitted.insert(id.clone());
                }
                !ready
            });
            if pending.len() == before {
                return Err(RepositoryError::Query(
                    "commit graph contains a cycle".to_string(),
                ));
            }
        }
        Ok(ordered)
    }

    fn commit_info(&self, rev: &Revision) -> Result<CommitInfo, RepositoryError> {
        let commit = self
            .commits
            .get(rev)
            .ok_or_else(|| RepositoryError::UnknownRevision(rev.to_string()))?;
        Ok(CommitInfo {
            id: commit.id.clone(),
            committer_name: commit.committer_name.clone(),
            committer_email: commit.committer_email.clone(),
            subject: commit.subject.clone(),
            signature: commit.signature,
            signing_key_fingerprint: commit.signing_key_fingerprint.clone(),
        })
    }
}
