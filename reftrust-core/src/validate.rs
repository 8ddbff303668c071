// SPDX-License-Identifier: MIT OR Apache-2.0

//! The update validator: a sequential gate every pushed ref must pass.
//!
//! Each ref runs through the same ordered checks and the first violation
//! rejects the entire push. Refs which are not part of this system (wrong
//! root commit, wrong branch-name shape) are skipped, not rejected, so
//! unrelated branches pass through untouched. Trust operations extracted
//! from validated commits are only buffered here; the caller applies them
//! after every ref in the push has passed, which is what makes a push
//! atomic.

use thiserror::Error;

use crate::graph::{TrustOp, TrustOpKind};
use crate::identity::{EncodingError, KeyMaterial};
use crate::repository::{RefUpdate, RepositoryError, RepositoryLog, Revision, SignatureStatus};

/// Branch-name suffix of the reserved control branch.
pub const CONTROL_BRANCH_SUFFIX: &str = "gac";

/// Result of validating one ref.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefOutcome {
    /// The ref is not managed by this system and passes through untouched.
    Skipped(SkipReason),
    /// The ref passed every check; these operations are ready to apply
    /// once the rest of the push has also passed.
    Validated(Vec<TrustOp>),
}

/// Why a ref was left alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a branch ref at all.
    NotABranch,
    /// The history does not descend from the configured root commit.
    ForeignRoot,
    /// The branch name does not carry the root reference prefix.
    ForeignBranchName,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotABranch => "not a branch ref",
            Self::ForeignRoot => "history does not descend from the root commit",
            Self::ForeignBranchName => "branch name does not carry the root reference",
        };
        write!(f, "{s}")
    }
}

/// Sequential validation gate over one push.
///
/// Holds the injected repository port and the configured root reference;
/// accumulates no state of its own between refs.
#[derive(Debug)]
pub struct Validator<'a, R> {
    repository: &'a R,
    root_reference: &'a Revision,
}

impl<'a, R: RepositoryLog> Validator<'a, R> {
    pub fn new(repository: &'a R, root_reference: &'a Revision) -> Self {
        Self {
            repository,
            root_reference,
        }
    }

    /// Run one ref through the full gate.
    ///
    /// Returns the buffered trust operations on success; any error rejects
    /// the whole push the ref belongs to.
    pub fn validate_ref(&self, update: &RefUpdate) -> Result<RefOutcome, ValidationError> {
        tracing::debug!(ref_name = %update.ref_name, old = %update.old, new = %update.new, "validating ref");

        let Some(branch) = update.branch_name() else {
            return Ok(RefOutcome::Skipped(SkipReason::NotABranch));
        };

        // Membership of a live ref is decided by its self-describing root
        // commit. A deletion has no new revision to query, so its
        // membership is decided by branch-name shape alone below.
        if !update.new.is_zero() {
            let roots = self.repository.root_commits(&update.new)?;
            if roots.len() != 1 || roots[0] != *self.root_reference {
                return Ok(RefOutcome::Skipped(SkipReason::ForeignRoot));
            }
        }

        let token = match branch
            .strip_prefix(self.root_reference.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
        {
            Some(token) => token,
            None => return Ok(RefOutcome::Skipped(SkipReason::ForeignBranchName)),
        };

        // The control branch is immutable after creation.
        if token == CONTROL_BRANCH_SUFFIX {
            return Err(ValidationError::ProtectedBranch(branch.to_string()));
        }

        let branch_owner = KeyMaterial::from_token(token)?;

        if update.new.is_zero() {
            return Err(ValidationError::BranchDeletion(branch.to_string()));
        }

        if !self.repository.is_fast_forward(&update.old, &update.new)? {
            return Err(ValidationError::NonFastForward(branch.to_string()));
        }

        if let Some(merge) = self.repository.merge_commits(&update.new)?.first() {
            return Err(ValidationError::MergeCommit(merge.clone()));
        }

        let old = (!update.old.is_zero()).then_some(&update.old);
        let commits = self.repository.commits_between(old, &update.new)?;

        let mut ops = Vec::new();
        for id in commits {
            // The root reference commit is the genesis marker, not an
            // operation; it carries no signature to check.
            if &id == self.root_reference {
                continue;
            }
            if let Some(op) = self.validate_commit(&id, &branch_owner)? {
                ops.push(op);
            }
        }

        tracing::debug!(ref_name = %update.ref_name, ops = ops.len(), "ref validated");
        Ok(RefOutcome::Validated(ops))
    }

    /// Per-commit sub-check: signature present, signing key bound to the
    /// branch owner twice over, subject mapped to an operation.
    fn validate_commit(
        &self,
        id: &Revision,
        branch_owner: &KeyMaterial,
    ) -> Result<Option<TrustOp>, ValidationError> {
        let info = self.repository.commit_info(id)?;

        if !info.signature.is_verified() {
            return Err(ValidationError::NotSigned {
                id: id.clone(),
                status: info.signature,
            });
        }

        let Some(signed_with) = info.signing_key_fingerprint.as_deref() else {
            return Err(ValidationError::MissingFingerprint(id.clone()));
        };

        // Two independently derived claims must both name the signing key:
        // the identity encoded in the branch name and the identity encoded
        // in the committer-email field. They catch different forgery
        // vectors (wrong branch vs. wrong claimed email), so a mismatch on
        // either is reported distinctly.
        if branch_owner.fingerprint()? != *signed_with {
            return Err(ValidationError::BranchKeyMismatch {
                id: id.clone(),
                signed_with: signed_with.to_string(),
            });
        }

        let claimed = KeyMaterial::from_token(&info.committer_email)?;
        if claimed.fingerprint()? != *signed_with {
            return Err(ValidationError::ClaimedKeyMismatch {
                id: id.clone(),
                signed_with: signed_with.to_string(),
            });
        }

        Ok(TrustOpKind::from_subject(&info.subject).map(|kind| TrustOp {
            actor: branch_owner.clone(),
            target: KeyMaterial::new(info.committer_name),
            kind,
        }))
    }

    /// Validate every ref of a push and collect the buffered operations.
    ///
    /// Nothing is applied here; an error anywhere leaves the graph exactly
    /// as it was.
    pub fn validate_push(&self, updates: &[RefUpdate]) -> Result<Vec<TrustOp>, ValidationError> {
        let mut ops = Vec::new();
        for update in updates {
            if let RefOutcome::Validated(mut ref_ops) = self.validate_ref(update)? {
                ops.append(&mut ref_ops);
            }
        }
        Ok(ops)
    }
}

/// Everything which rejects a push.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Write to the reserved control branch.
    #[error("branch {0} is the protected control branch")]
    ProtectedBranch(String),

    /// Branch token or committer-email token failed to decode.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Deletion of a managed branch.
    #[error("deletion of managed branch {0}")]
    BranchDeletion(String),

    /// The update rewrites existing history.
    #[error("non-fast-forward update of branch {0}")]
    NonFastForward(String),

    /// A merge commit in the pushed history.
    #[error("merge commit {0} in pushed history")]
    MergeCommit(Revision),

    /// Commit without a verifiable signature.
    #[error("commit {id} is not signed (signature status: {status})")]
    NotSigned {
        id: Revision,
        status: SignatureStatus,
    },

    /// Verified commit reported without a signing-key fingerprint.
    #[error("commit {0} carries no signing-key fingerprint")]
    MissingFingerprint(Revision),

    /// The signing key is not the key encoded in the branch name.
    #[error("commit {id} signed with {signed_with}, which is not the branch owner's key")]
    BranchKeyMismatch { id: Revision, signed_with: String },

    /// The signing key is not the key claimed in the committer-email field.
    #[error("commit {id} signed with {signed_with}, which is not the claimed committer identity")]
    ClaimedKeyMismatch { id: Revision, signed_with: String },

    /// The repository port itself failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
