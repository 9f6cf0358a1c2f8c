//! Git abstraction layer for cage (C5: Git Bridge).
//!
//! This crate defines the [`GitRepo`] trait — the single interface through
//! which `cage` interacts with git. No other cage crate should import gix
//! directly; they depend on `cage-git` and program against the trait, and
//! `cage`'s `bridge` module builds the spec-facing porcelain operations
//! (`status`, `commit`, `push`, `pull`, `merge`, `history`) on top of it.
//!
//! # Crate layout
//!
//! - [`repo`] — the [`GitRepo`] trait definition.
//! - [`types`] — value types used in trait signatures ([`GitOid`], [`RefName`],
//!   [`TreeEntry`], [`DiffEntry`], etc.).
//! - [`error`] — the [`GitError`] enum returned by all trait methods.
//! - [`gix_repo`] — the gix-backed [`GitRepo`] implementation, [`GixRepo`].
//!
//! The remaining modules (`refs_impl`, `objects_impl`, `checkout_impl`,
//! `index_impl`, `status_impl`, `diff_impl`, `worktree_impl`, `stash_impl`,
//! `push_impl`, `fetch_impl`, `config_impl`) hold `GixRepo`'s per-category
//! implementations and are not part of the public API.

mod checkout_impl;
mod config_impl;
mod diff_impl;
mod error;
mod fetch_impl;
pub mod gix_repo;
mod index_impl;
mod objects_impl;
mod push_impl;
mod refs_impl;
pub mod repo;
mod stash_impl;
mod status_impl;
pub mod types;
mod worktree_impl;

pub use error::GitError;
pub use gix_repo::GixRepo;
pub use repo::GitRepo;
pub use types::{
    ChangeType, CommitInfo, DiffEntry, EntryMode, FileStatus, GitOid, IndexEntry, OidParseError,
    RefEdit, RefName, RefNameError, StatusEntry, TreeEdit, TreeEntry, WorktreeInfo,
};
