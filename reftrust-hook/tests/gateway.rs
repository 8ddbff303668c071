// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end gateway runs against an in-memory repository fixture.

use std::fs;

use reftrust_core::test_utils::{MemoryCommit, MemoryRepository, test_key};
use reftrust_core::{KeyMaterial, Revision, TrustDocument, ZERO_REVISION};
use reftrust_hook::{HookConfig, execute, provision};

const ROOT: &str = "97c6ba700b9f79a72b1d97160ca4d767e2c66e53";

struct Fixture {
    _dir: tempfile::TempDir,
    config: HookConfig,
    owner: KeyMaterial,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let owner = test_key("owner");
    let config = provision(
        dir.path(),
        Revision::new(ROOT),
        owner.clone(),
        Some(dir.path().join("authorized_keys")),
    )
    .unwrap();
    Fixture {
        _dir: dir,
        config,
        owner,
    }
}

fn branch_ref(key: &KeyMaterial) -> String {
    format!("refs/heads/{ROOT}_{}", key.to_token())
}

fn creation_line(new: &str, ref_name: &str) -> String {
    format!("{ZERO_REVISION} {new} {ref_name}\n")
}

fn document(config: &HookConfig) -> TrustDocument {
    TrustDocument::from_json(&fs::read_to_string(&config.document_path).unwrap()).unwrap()
}

#[test]
fn accepted_grant_push_materializes_access() {
    let fx = fixture();
    let b = test_key("key-b");
    let repository = MemoryRepository::with_commits([
        MemoryCommit::root(ROOT),
        MemoryCommit::signed_op("a1", ROOT, &fx.owner, &b, "grant-trust"),
    ]);

    let input = creation_line("a1", &branch_ref(&fx.owner));
    execute(&fx.config, &repository, input.as_bytes()).unwrap();

    let doc = document(&fx.config);
    let owner_entry = doc
        .trustgraph
        .iter()
        .find(|entry| entry.pub_key == fx.owner.as_str())
        .unwrap();
    assert_eq!(owner_entry.trust, vec![b.as_str().to_string()]);

    let signers = fs::read_to_string(&fx.config.allowed_signers_path).unwrap();
    assert!(signers.contains(fx.owner.as_str()));
    assert!(signers.contains(b.as_str()));

    let keys = fs::read_to_string(&fx.config.authorized_keys_path).unwrap();
    assert!(keys.contains("git-push-pull.sh"));
    assert!(keys.contains(b.as_str()));

    let audit = fs::read_to_string(&fx.config.audit_log_path).unwrap();
    assert!(audit.contains("push accepted"));
}

#[test]
fn two_branches_in_one_push_derive_pull_only() {
    let fx = fixture();
    let b = test_key("key-b");
    let c = test_key("key-c");
    let repository = MemoryRepository::with_commits([
        MemoryCommit::root(ROOT),
        MemoryCommit::signed_op("a1", ROOT, &fx.owner, &b, "grant-trust"),
        MemoryCommit::signed_op("b1", ROOT, &b, &c, "grant-trust"),
    ]);

    let mut input = creation_line("a1", &branch_ref(&fx.owner));
    input.push_str(&creation_line("b1", &branch_ref(&b)));
    execute(&fx.config, &repository, input.as_bytes()).unwrap();

    let keys = fs::read_to_string(&fx.config.authorized_keys_path).unwrap();
    let push_pull_line = keys
        .lines()
        .find(|line| line.contains(b.as_str()))
        .unwrap();
    assert!(push_pull_line.contains("git-push-pull.sh"));
    let pull_line = keys
        .lines()
        .find(|line| line.contains(c.as_str()))
        .unwrap();
    assert!(pull_line.contains("git-pull.sh"));
    assert!(!pull_line.contains("git-push-pull.sh"));

    // C may pull but must not sign accepted commits.
    let signers = fs::read_to_string(&fx.config.allowed_signers_path).unwrap();
    assert!(!signers.contains(c.as_str()));
}

#[test]
fn merge_commit_push_changes_nothing() {
    let fx = fixture();
    let b = test_key("key-b");
    let repository = MemoryRepository::with_commits([
        MemoryCommit::root(ROOT),
        MemoryCommit::signed_op("a1", ROOT, &fx.owner, &b, "grant-trust"),
        MemoryCommit::signed_op("a2", ROOT, &fx.owner, &b, "grant-trust"),
        MemoryCommit::signed_op("m", "a1", &fx.owner, &b, "merge").with_parents(&["a1", "a2"]),
    ]);

    let document_before = fs::read_to_string(&fx.config.document_path).unwrap();
    let signers_before = fs::read_to_string(&fx.config.allowed_signers_path).unwrap();
    let keys_before = fs::read_to_string(&fx.config.authorized_keys_path).unwrap();

    let input = creation_line("m", &branch_ref(&fx.owner));
    assert!(execute(&fx.config, &repository, input.as_bytes()).is_err());

    assert_eq!(
        fs::read_to_string(&fx.config.document_path).unwrap(),
        document_before
    );
    assert_eq!(
        fs::read_to_string(&fx.config.allowed_signers_path).unwrap(),
        signers_before
    );
    assert_eq!(
        fs::read_to_string(&fx.config.authorized_keys_path).unwrap(),
        keys_before
    );

    let audit = fs::read_to_string(&fx.config.audit_log_path).unwrap();
    assert!(audit.contains("push rejected"));
}

#[test]
fn control_branch_push_is_rejected() {
    let fx = fixture();
    let repository = MemoryRepository::with_commits([
        MemoryCommit::root(ROOT),
        MemoryCommit::unsigned("c1", ROOT, "update"),
    ]);

    let input = creation_line("c1", &format!("refs/heads/{ROOT}_gac"));
    assert!(execute(&fx.config, &repository, input.as_bytes()).is_err());
}

#[test]
fn rejected_second_ref_discards_first_refs_operations() {
    let fx = fixture();
    let b = test_key("key-b");
    let repository = MemoryRepository::with_commits([
        MemoryCommit::root(ROOT),
        MemoryCommit::signed_op("a1", ROOT, &fx.owner, &b, "grant-trust"),
        MemoryCommit::unsigned("b1", ROOT, "grant-trust"),
    ]);

    let document_before = fs::read_to_string(&fx.config.document_path).unwrap();

    let mut input = creation_line("a1", &branch_ref(&fx.owner));
    input.push_str(&creation_line("b1", &branch_ref(&b)));
    assert!(execute(&fx.config, &repository, input.as_bytes()).is_err());

    // The first ref validated, but nothing from it may stick.
    assert_eq!(
        fs::read_to_string(&fx.config.document_path).unwrap(),
        document_before
    );
}

#[test]
fn unrelated_branches_pass_through() {
    let fx = fixture();
    let repository = MemoryRepository::with_commits([
        MemoryCommit::root("another-root"),
        MemoryCommit::unsigned("x1", "another-root", "work"),
    ]);

    let input = creation_line("x1", "refs/heads/feature");
    execute(&fx.config, &repository, input.as_bytes()).unwrap();

    let audit = fs::read_to_string(&fx.config.audit_log_path).unwrap();
    assert!(audit.contains("skipped"));
    assert!(audit.contains("push accepted"));
}

#[test]
fn missing_document_aborts_before_validation() {
    let fx = fixture();
    fs::remove_file(&fx.config.document_path).unwrap();
    let repository = MemoryRepository::with_commits([MemoryCommit::root(ROOT)]);

    let input = creation_line(ROOT, &branch_ref(&fx.owner));
    assert!(execute(&fx.config, &repository, input.as_bytes()).is_err());
}

#[test]
fn malformed_document_aborts_before_validation() {
    let fx = fixture();
    fs::write(&fx.config.document_path, "{ not a document").unwrap();
    let repository = MemoryRepository::with_commits([MemoryCommit::root(ROOT)]);

    let input = creation_line(ROOT, &branch_ref(&fx.owner));
    assert!(execute(&fx.config, &repository, input.as_bytes()).is_err());

    // The malformed document is left for the operator to inspect, not
    // overwritten with a fresh one.
    assert_eq!(
        fs::read_to_string(&fx.config.document_path).unwrap(),
        "{ not a document"
    );
}
