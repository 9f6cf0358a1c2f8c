//! The [`GitRepo`] trait — the single abstraction boundary between cage and git.
//!
//! All cage crates interact with git exclusively through this trait. The trait
//! is object-safe so callers can use `dyn GitRepo` or `Box<dyn GitRepo>`.
//!
//! Method groups:
//!
//! | Group        | Methods                                           |
//! |-------------|-----------------------------------------------------|
//! | Refs         | `read_ref`, `write_ref`, `delete_ref`, ...          |
//! | Rev-parse    | `rev_parse`, `rev_parse_opt`                        |
//! | Object read  | `read_blob`, `read_tree`, `read_commit`             |
//! | Object write | `write_blob`, `write_tree`, `create_commit`         |
//! | Tree editing | `edit_tree`                                         |
//! | Index        | `read_index`, `write_index`, `unstage_all`          |
//! | Checkout     | `checkout_tree`                                     |
//! | Status       | `is_dirty`, `status`                                |
//! | Diff         | `diff_trees`                                        |
//! | Worktrees    | `worktree_add/remove/list`                          |
//! | Stash        | `stash_create`, `stash_apply`                       |
//! | Push/Fetch   | `push_branch`, `push_tag`, `fetch_ref`              |
//! | Config       | `read_config`, `write_config`                       |
//! | Ancestry     | `is_ancestor`, `merge_base`                         |

use std::path::Path;

use crate::error::GitError;
use crate::types::{
    CommitInfo, DiffEntry, GitOid, IndexEntry, RefEdit, RefName, StatusEntry, TreeEdit, TreeEntry,
    WorktreeInfo,
};

/// The git abstraction trait used by all cage crates.
///
/// Implementations may be backed by gix (the preferred backend), a git CLI
/// shim (for operations gix does not yet expose), or a test double.
///
/// # Object safety
///
/// This trait is object-safe: no generic methods, no `Self` in return position
/// outside of `Result`. Callers may use `&dyn GitRepo` or `Box<dyn GitRepo>`.
pub trait GitRepo {
    // -----------------------------------------------------------------------
    // Refs
    //
    // Replaces: git rev-parse, git update-ref, git update-ref -d,
    //           git update-ref --stdin, git for-each-ref
    // -----------------------------------------------------------------------

    /// Resolve a ref to its OID, returning `None` if the ref does not exist.
    ///
    /// Replaces: `git rev-parse <ref>` (when used to resolve a known ref name).
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    /// Create or overwrite a ref unconditionally.
    ///
    /// Replaces: `git update-ref <name> <oid>`.
    ///
    /// `log_message` is written to the reflog entry. Pass an empty string if
    /// no reflog message is needed.
    fn write_ref(&self, name: &RefName, oid: GitOid, log_message: &str) -> Result<(), GitError>;

    /// Delete a ref. No-op if the ref does not exist.
    ///
    /// Replaces: `git update-ref -d <name>`.
    fn delete_ref(&self, name: &RefName) -> Result<(), GitError>;

    /// Atomically apply a batch of ref updates with compare-and-swap semantics.
    ///
    /// All updates succeed or all fail. Each [`RefEdit`] carries an expected
    /// old OID; if any ref's current value differs, the entire transaction is
    /// aborted and [`GitError::RefConflict`] is returned.
    ///
    /// Replaces: `git update-ref --stdin` with `start`/`prepare`/`commit`.
    fn atomic_ref_update(&self, edits: &[RefEdit]) -> Result<(), GitError>;

    /// List refs matching a prefix (e.g., `"refs/heads/"`, `"refs/cage/"`).
    ///
    /// Returns `(ref_name, oid)` pairs sorted by ref name. The prefix is
    /// matched literally.
    ///
    /// Replaces: `git for-each-ref --format=... refs/some/prefix/`.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError>;

    /// The branch ref `HEAD` currently points to, or `None` when detached.
    ///
    /// Replaces: `git symbolic-ref -q HEAD`.
    fn head_ref(&self) -> Result<Option<RefName>, GitError>;

    // -----------------------------------------------------------------------
    // Rev-parse
    //
    // Replaces: git rev-parse <spec>
    // -----------------------------------------------------------------------

    /// Resolve a revision specification to an OID.
    ///
    /// Supports the same syntax as `git rev-parse`: commit-ish references,
    /// `HEAD~3`, `@{u}`, etc.
    ///
    /// Returns [`GitError::NotFound`] if the spec cannot be resolved.
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError>;

    /// Like [`rev_parse`](Self::rev_parse) but returns `None` instead of an
    /// error when the spec cannot be resolved.
    fn rev_parse_opt(&self, spec: &str) -> Result<Option<GitOid>, GitError>;

    // -----------------------------------------------------------------------
    // Object read
    //
    // Replaces: git cat-file blob, git ls-tree, git cat-file commit
    // -----------------------------------------------------------------------

    /// Read the contents of a blob object.
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError>;

    /// Read the entries of a tree object (one level deep, not recursive).
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError>;

    /// Read a commit object's metadata.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    // -----------------------------------------------------------------------
    // Object write
    //
    // Replaces: git hash-object -w, git mktree, git commit-tree
    // -----------------------------------------------------------------------

    /// Write a blob to the object store and return its OID.
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError>;

    /// Write a tree object from a list of entries and return its OID.
    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError>;

    /// Create a commit object and optionally update a ref to point to it.
    ///
    /// If `update_ref` is `Some`, the given ref is updated to the new commit
    /// OID after the commit is written.
    fn create_commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        message: &str,
        update_ref: Option<&RefName>,
    ) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Tree editing
    // -----------------------------------------------------------------------

    /// Apply a set of edits to an existing tree and return the OID of the new tree.
    ///
    /// Edits may insert, update, or remove entries at arbitrary paths
    /// (including nested paths like `"src/lib.rs"`). Intermediate trees are
    /// created or updated as needed.
    fn edit_tree(&self, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Index
    //
    // Replaces: git ls-files, git read-tree, git update-index, git reset
    // -----------------------------------------------------------------------

    /// Read the current index (staging area) entries.
    fn read_index(&self) -> Result<Vec<IndexEntry>, GitError>;

    /// Replace the index with the given entries.
    fn write_index(&self, entries: &[IndexEntry]) -> Result<(), GitError>;

    /// Reset the index to HEAD's tree without touching the working tree.
    ///
    /// Replaces: `git reset HEAD`.
    fn unstage_all(&self) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Checkout
    // -----------------------------------------------------------------------

    /// Check out a tree into the working directory.
    ///
    /// Materializes the tree at `oid` into `workdir`, updating the index
    /// to match. Existing working-tree files not in the tree are removed.
    fn checkout_tree(&self, oid: GitOid, workdir: &Path) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Status
    //
    // Replaces: git status --porcelain, git diff --quiet
    // -----------------------------------------------------------------------

    /// Returns `true` if the working tree or index has uncommitted changes.
    fn is_dirty(&self) -> Result<bool, GitError>;

    /// Return the list of changed files with their statuses.
    fn status(&self) -> Result<Vec<StatusEntry>, GitError>;

    // -----------------------------------------------------------------------
    // Diff
    // -----------------------------------------------------------------------

    /// Diff two trees and return the list of changed files.
    ///
    /// If `old` is `None`, the diff is against an empty tree (i.e., all files
    /// in `new` appear as additions).
    fn diff_trees(&self, old: Option<GitOid>, new: GitOid) -> Result<Vec<DiffEntry>, GitError>;

    // -----------------------------------------------------------------------
    // Worktrees
    // -----------------------------------------------------------------------

    /// Create a new linked worktree at `path` with HEAD detached at `target`.
    fn worktree_add(&self, name: &str, target: GitOid, path: &Path) -> Result<(), GitError>;

    /// Remove a linked worktree by name.
    fn worktree_remove(&self, name: &str) -> Result<(), GitError>;

    /// List all worktrees (main + linked).
    fn worktree_list(&self) -> Result<Vec<WorktreeInfo>, GitError>;

    // -----------------------------------------------------------------------
    // Stash
    // -----------------------------------------------------------------------

    /// Create a stash commit from the current working tree and index state
    /// without modifying them. Returns `None` if there is nothing to stash.
    fn stash_create(&self) -> Result<Option<GitOid>, GitError>;

    /// Apply a stash commit to the working tree. Does not remove the stash
    /// object. Conflicts are left as merge markers in the working tree.
    fn stash_apply(&self, oid: GitOid) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Push / Fetch
    // -----------------------------------------------------------------------

    /// Push a local ref to a remote.
    ///
    /// If `force` is true, the push is a force-push.
    fn push_branch(
        &self,
        remote: &str,
        local_ref: &str,
        remote_ref: &str,
        force: bool,
    ) -> Result<(), GitError>;

    /// Push a single tag to a remote.
    fn push_tag(&self, remote: &str, tag: &str) -> Result<(), GitError>;

    /// Fetch a single ref from a remote and return the OID it now points to.
    ///
    /// Updates `refs/remotes/<remote>/<remote_ref>` locally; does not touch
    /// the working tree or any local branch.
    fn fetch_ref(&self, remote: &str, remote_ref: &str) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Config
    // -----------------------------------------------------------------------

    /// Read a git config value. Returns `None` if the key is not set.
    fn read_config(&self, key: &str) -> Result<Option<String>, GitError>;

    /// Set a git config value.
    fn write_config(&self, key: &str, value: &str) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Ancestry
    //
    // Replaces: git merge-base --is-ancestor, git merge-base
    // -----------------------------------------------------------------------

    /// Check if `ancestor` is an ancestor of `descendant`.
    fn is_ancestor(&self, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError>;

    /// Find the best common ancestor (merge base) of two commits.
    ///
    /// Returns `None` if the commits have no common ancestor.
    fn merge_base(&self, a: GitOid, b: GitOid) -> Result<Option<GitOid>, GitError>;
}
