//! The [`WorkingCopy`] trait — the engine's only window onto local disk
//! state. Mirrors the division of labor in [`crate::repo_session`]: no
//! filesystem code lives in this crate.

use crate::conflict::{ConflictAction, ConflictKind, ConflictReason};
use crate::error::Error;
use crate::types::{NodeKind, Rev};

/// One side of a text or tree conflict's repository origin, as recorded by
/// the working copy at the time the conflict was raised.
#[derive(Debug, Clone)]
pub struct ConflictVersion {
    pub repos_url: url::Url,
    pub repos_uuid: String,
    pub path_in_repos: String,
    pub peg_rev: Rev,
    pub node_kind: NodeKind,
}

/// The four property values recorded for a property conflict.
#[derive(Debug, Clone, Default)]
pub struct PropConflictValues {
    pub base: Option<Vec<u8>>,
    pub working: Option<Vec<u8>>,
    pub incoming_old: Option<Vec<u8>>,
    pub incoming_new: Option<Vec<u8>>,
}

/// A single legacy conflict descriptor as read off disk by
/// [`WorkingCopy::read_conflict_descriptors`]. `ConflictEnvelope` groups
/// these by kind when a conflict is opened.
#[derive(Debug, Clone)]
pub struct ConflictDescriptor {
    pub kind: ConflictKind,
    pub operation: crate::conflict::Operation,
    pub action: ConflictAction,
    pub reason: ConflictReason,
    pub victim_node_kind: NodeKind,
    pub src_left_version: Option<ConflictVersion>,
    pub src_right_version: Option<ConflictVersion>,

    // Text conflicts
    pub base_abspath: Option<String>,
    pub my_abspath: Option<String>,
    pub their_abspath: Option<String>,
    pub mime_type: Option<String>,

    // Property conflicts
    pub property_name: Option<String>,
    pub property_values: Option<PropConflictValues>,
    pub property_reject_abspath: Option<String>,
}

/// The legacy `conflict_choice` enum a text/property resolution translates
/// an [`crate::options::OptionId`] into before calling
/// [`WorkingCopy::resolve_text_conflict`]/[`WorkingCopy::resolve_prop_conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Base,
    TheirsFull,
    MineFull,
    TheirsConflict,
    MineConflict,
    Merged,
}

/// An opaque handle representing an acquired working-copy write lock.
/// Dropping it without calling [`WorkingCopy::release`] is a logic error in
/// a resolver, not something this type enforces on its own (the trait is
/// object-safe and therefore cannot express a linear/must-use drop glue);
/// every resolver goes through [`crate::resolvers::with_resolve_lock`],
/// which always pairs acquire with release.
#[derive(Debug)]
pub struct LockToken(pub String);

/// Abstraction over the on-disk working copy operations the engine needs.
pub trait WorkingCopy {
    /// Acquire the write lock required before mutating `abspath`, per the
    /// "resolve" discipline in spec §4.8/§5.
    fn acquire_for_resolve(&mut self, abspath: &str) -> Result<LockToken, Error>;

    /// Release a previously acquired lock.
    fn release(&mut self, token: LockToken) -> Result<(), Error>;

    fn delete_node(&mut self, abspath: &str) -> Result<(), Error>;

    fn copy_node(&mut self, src_abspath: &str, dst_abspath: &str, metadata_only: bool) -> Result<(), Error>;

    /// Add a file fetched from the repository to version control at
    /// `abspath`, with its repository properties and origin.
    fn add_repos_file(
        &mut self,
        abspath: &str,
        contents: &[u8],
        props: &[(String, Vec<u8>)],
        copyfrom_url: &str,
        copyfrom_rev: Rev,
    ) -> Result<(), Error>;

    /// Run the (externally supplied) two-file text-merge algorithm.
    fn merge_files(
        &mut self,
        base: &str,
        theirs: &str,
        mine: &str,
        propdiffs: &[(String, Option<Vec<u8>>, Option<Vec<u8>>)],
    ) -> Result<(), Error>;

    /// Clear the tree-conflict record at `abspath`. This is the resolution
    /// signal every tree-conflict resolver ends with.
    fn clear_tree_conflict(&mut self, abspath: &str) -> Result<(), Error>;

    /// Break the "moved away" half of a move: leave the victim as a plain
    /// unversioned/obstructed node rather than a recorded move.
    fn break_moved_away(&mut self, abspath: &str) -> Result<(), Error>;

    /// The inverse of `break_moved_away`: (re)establish `abspath` as the
    /// source of a move.
    fn raise_moved_away(&mut self, abspath: &str) -> Result<(), Error>;

    /// Update the destination of a recorded move to track new upstream
    /// changes.
    fn update_moved_away_node(&mut self, abspath: &str) -> Result<(), Error>;

    /// `(is_copy, copyfrom_rev, copyfrom_relpath)` for the node at
    /// `abspath`.
    fn node_origin(&mut self, abspath: &str) -> Result<(bool, Rev, Option<String>), Error>;

    /// If `abspath` was moved away locally, the abspath it was moved to.
    fn node_moved_away(&mut self, abspath: &str) -> Result<Option<String>, Error>;

    /// If `abspath` is the destination of a local move, the abspath it was
    /// moved from.
    fn node_moved_here(&mut self, abspath: &str) -> Result<Option<String>, Error>;

    fn wcroot(&mut self, abspath: &str) -> Result<String, Error>;

    fn tmpdir(&mut self, abspath: &str) -> Result<String, Error>;

    fn prop_list(&mut self, abspath: &str) -> Result<Vec<(String, Vec<u8>)>, Error>;

    fn read_conflict_descriptors(&mut self, abspath: &str) -> Result<Vec<ConflictDescriptor>, Error>;

    /// Resolve the text conflict at `abspath` to `choice`, clearing its
    /// conflict markers.
    fn resolve_text_conflict(&mut self, abspath: &str, choice: ConflictChoice) -> Result<(), Error>;

    /// Resolve the property conflict named `propname` (or, if `None`, every
    /// still-conflicted property) at `abspath` to `choice`.
    fn resolve_prop_conflict(
        &mut self,
        abspath: &str,
        propname: Option<&str>,
        choice: ConflictChoice,
    ) -> Result<(), Error>;

    /// Whether a node currently exists on disk at `abspath`, and its kind.
    fn disk_node_kind(&mut self, abspath: &str) -> Result<NodeKind, Error>;

    /// The working-copy's recorded base revision for `abspath`.
    fn base_revision(&mut self, abspath: &str) -> Result<Rev, Error>;
}
