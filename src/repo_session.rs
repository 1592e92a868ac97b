//! The [`RepoSession`] trait — the engine's only window onto the
//! repository. No network code lives in this crate; every call the engine
//! makes against the repository goes through this trait, so the host
//! application can back it with a real RA session, a cached proxy, or (in
//! tests) an in-memory fake.

use crate::error::Error;
use crate::types::{NodeKind, RelPath, Rev};

/// One revision's worth of metadata and changed paths, as delivered by
/// [`RepoSession::get_log`].
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub rev: Rev,
    pub author: Option<String>,
    pub changed_paths: Vec<ChangedPath>,
}

/// A single entry in a log revision's changed-paths list.
#[derive(Debug, Clone)]
pub struct ChangedPath {
    pub relpath: RelPath,
    pub action: ChangeAction,
    pub node_kind: NodeKind,
    /// Set when this entry is a copy (`action == Added` with history).
    pub copyfrom: Option<CopyFrom>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Added,
    Deleted,
    Modified,
    Replaced,
}

#[derive(Debug, Clone)]
pub struct CopyFrom {
    pub relpath: RelPath,
    pub rev: Rev,
}

/// A location of a node in repository history: the path it had at a given
/// peg revision.
#[derive(Debug, Clone)]
pub struct Location {
    pub relpath: RelPath,
    pub rev: Rev,
}

/// One segment of a node's location history, as delivered by
/// [`RepoSession::get_location_segments`]. A `None` path marks a gap (the
/// node did not exist in repository history for this span of revisions).
#[derive(Debug, Clone)]
pub struct LocationSegment {
    pub path: Option<RelPath>,
    pub range_start: Rev,
    pub range_end: Rev,
}

/// Receiver callback signature for [`RepoSession::get_log`]. Returning
/// `Err` aborts the walk; the driver distinguishes between an error it
/// should propagate and the crate-private cancellation sentinel at the
/// call site, so this trait only ever sees a plain [`Error`].
pub type LogReceiver<'a> = dyn FnMut(&LogEntry) -> Result<(), Error> + 'a;

pub type SegmentReceiver<'a> = dyn FnMut(&LocationSegment) -> Result<(), Error> + 'a;

/// Abstraction over the repository-access calls the engine needs.
///
/// All relpaths crossing this boundary are canonical (no leading slash,
/// see [`crate::types::RelPath`]). Revision numbers use [`Rev`], whose
/// `INVALID` sentinel stands in for "no such revision".
///
/// No method here is re-entrant from within a receiver passed to another
/// method on the same session.
pub trait RepoSession {
    /// Open (or reopen) a session rooted at `url`.
    fn open(&mut self, url: &str) -> Result<(), Error>;

    /// Walk the log for `paths` over `start..=end` (descending, i.e.
    /// newest-first, when `start > end`), invoking `receiver` once per
    /// revision. `revprops` names the revision properties the caller wants
    /// populated on each [`LogEntry`] (e.g. `"svn:author"`); sessions may
    /// populate more.
    fn get_log(
        &mut self,
        paths: &[RelPath],
        start: Rev,
        end: Rev,
        revprops: &[&str],
        receiver: &mut LogReceiver<'_>,
    ) -> Result<(), Error>;

    /// Resolve `relpath@peg` at each of `wanted_revs`, returning only the
    /// revisions for which the node existed.
    fn get_locations(
        &mut self,
        relpath: &RelPath,
        peg: Rev,
        wanted_revs: &[Rev],
    ) -> Result<Vec<Location>, Error>;

    /// Walk `relpath`'s location segments (history of where the node lived)
    /// over `start..=end`, as seen from `peg`.
    fn get_location_segments(
        &mut self,
        relpath: &RelPath,
        peg: Rev,
        start: Rev,
        end: Rev,
        receiver: &mut SegmentReceiver<'_>,
    ) -> Result<(), Error>;

    /// Find the revision in which `relpath` was deleted between `start` and
    /// `end`, if any.
    fn get_deleted_rev(
        &mut self,
        relpath: &RelPath,
        start: Rev,
        end: Rev,
    ) -> Result<Rev, Error>;

    /// Read a single revision property.
    fn rev_prop(&mut self, rev: Rev, name: &str) -> Result<Option<String>, Error>;

    /// Check the kind of node at `relpath@rev`.
    fn check_path(&mut self, relpath: &RelPath, rev: Rev) -> Result<NodeKind, Error>;

    /// Fetch the full contents (and properties) of a file.
    fn get_file(
        &mut self,
        relpath: &RelPath,
        rev: Rev,
        sink: &mut dyn std::io::Write,
    ) -> Result<Vec<(String, Vec<u8>)>, Error>;

    /// Reparent this session at a new repository root URL.
    fn reparent(&mut self, url: &str) -> Result<(), Error>;

    fn get_latest_revnum(&mut self) -> Result<Rev, Error>;

    /// The youngest common ancestor of two pegged locations, if they share
    /// one.
    fn get_youngest_common_ancestor(
        &mut self,
        loc1: (&RelPath, Rev),
        loc2: (&RelPath, Rev),
    ) -> Result<Option<Location>, Error>;
}
