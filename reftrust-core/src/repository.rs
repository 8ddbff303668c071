// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only port onto the version-control engine.
//!
//! Everything the validator needs to know about history is expressed as a
//! handful of pure queries behind [`RepositoryLog`]. The production
//! implementation shells out to git plumbing; tests run against an
//! in-memory fixture. The port itself adds no state.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The all-zero revision marking an absent ref side.
pub const ZERO_REVISION: &str = "0000000000000000000000000000000000000000";

/// Prefix of branch refs on the control channel.
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// One revision id as reported by the version-control engine.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn zero() -> Self {
        Self(ZERO_REVISION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the all-zero revision, meaning "no revision".
    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_REVISION
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Revision").field(&self.0).finish()
    }
}

impl From<&str> for Revision {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Signature verification status of one commit.
///
/// Mirrors the codes the signature-verification primitive reports; anything
/// unrecognized collapses into [`SignatureStatus::Error`], keeping the gate
/// fail-closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureStatus {
    /// A good signature from an allowlisted key.
    Good,
    /// A good signature from a key outside the allowlist.
    UntrustedGood,
    /// A signature which fails verification.
    Bad,
    /// No signature at all.
    Unsigned,
    /// Verification could not be performed.
    Error,
}

impl SignatureStatus {
    /// Parse a one-letter status code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "G" => Self::Good,
            "U" => Self::UntrustedGood,
            "B" => Self::Bad,
            "N" => Self::Unsigned,
            _ => Self::Error,
        }
    }

    /// True when the commit carries a verifiable signature.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Good | Self::UntrustedGood)
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Good => "good",
            Self::UntrustedGood => "untrusted-good",
            Self::Bad => "bad",
            Self::Unsigned => "unsigned",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Per-commit metadata as claimed by the committer plus the verified
/// signature facts.
///
/// The name, email and subject fields are attacker-controlled claims; only
/// the signature status and signing-key fingerprint are established by the
/// verification primitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: Revision,
    pub committer_name: String,
    pub committer_email: String,
    pub subject: String,
    pub signature: SignatureStatus,
    /// Present only when the signature status is good or untrusted-good.
    pub signing_key_fingerprint: Option<String>,
}

/// One ref-update record from the control channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefUpdate {
    pub old: Revision,
    pub new: Revision,
    pub ref_name: String,
}

impl RefUpdate {
    /// The branch name, when this ref is a branch at all.
    pub fn branch_name(&self) -> Option<&str> {
        self.ref_name.strip_prefix(BRANCH_REF_PREFIX)
    }
}

impl FromStr for RefUpdate {
    type Err = RefUpdateError;

    /// Parse one whitespace-separated `old new refname` record.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split_whitespace();
        let (Some(old), Some(new), Some(ref_name), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(RefUpdateError::Malformed(line.to_string()));
        };

        Ok(Self {
            old: Revision::new(old),
            new: Revision::new(new),
            ref_name: ref_name.to_string(),
        })
    }
}

/// Error type for control-channel records.
#[derive(Error, Debug)]
pub enum RefUpdateError {
    #[error("malformed ref-update record: {0:?}")]
    Malformed(String),
}

/// Read-only queries against the version-control engine.
pub trait RepositoryLog {
    /// All zero-parent ancestors of the given revision.
    fn root_commits(&self, rev: &Revision) -> Result<Vec<Revision>, RepositoryError>;

    /// True when `old` is an ancestor of `new` (or equal to it).
    fn is_ancestor(&self, old: &Revision, new: &Revision) -> Result<bool, RepositoryError>;

    /// All ancestors of the given revision (inclusive) with two or more
    /// parents.
    fn merge_commits(&self, rev: &Revision) -> Result<Vec<Revision>, RepositoryError>;

    /// Revisions reachable from `new` but not from `old`, oldest first.
    ///
    /// With no `old`, the full history of `new` is returned.
    fn commits_between(
        &self,
        old: Option<&Revision>,
        new: &Revision,
    ) -> Result<Vec<Revision>, RepositoryError>;

    /// Metadata of one commit.
    fn commit_info(&self, rev: &Revision) -> Result<CommitInfo, RepositoryError>;

    /// True when moving `old` to `new` only appends history.
    ///
    /// A zero `old` (branch creation) is always a fast-forward.
    fn is_fast_forward(&self, old: &Revision, new: &Revision) -> Result<bool, RepositoryError> {
        if old.is_zero() {
            return Ok(true);
        }
        self.is_ancestor(old, new)
    }
}

/// Error types for repository queries.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The underlying engine query failed.
    #[error("repository query failed: {0}")]
    Query(String),

    /// A revision the engine does not know about.
    #[error("unknown revision {0}")]
    UnknownRevision(String),
}
