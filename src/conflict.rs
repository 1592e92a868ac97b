//! [`Conflict`] — the per-conflict object threaded through the rest of the
//! public API: `open_conflict` constructs one from the legacy descriptors
//! `WorkingCopy::read_conflict_descriptors` returns; `DescriptionCatalog`
//! and `OptionRegistry` read it; a chosen `Resolver` mutates the working
//! copy through it.

use indexmap::IndexMap;
use tracing::instrument;

use crate::details::{IncomingAddDetails, IncomingDeleteDetails, IncomingEditDetails, LocalMissingDetails};
use crate::error::Error;
use crate::locators::{AdditionLocator, DeletionLocator, EditLocator};
use crate::moves::MovesTable;
use crate::options::OptionId;
use crate::repo_session::RepoSession;
use crate::types::{NodeKind, RelPath, Rev};
use crate::working_copy::{ConflictDescriptor, WorkingCopy};

/// The user action that surfaced the conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Update,
    Switch,
    Merge,
    None,
}

/// The kind of conflict a single legacy descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Text,
    Property,
    Tree,
}

/// What the repository side wanted to do at the victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    Edit,
    Add,
    Delete,
    Replace,
}

/// State of the working copy that clashed with the incoming action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    Edited,
    Obstructed,
    Deleted,
    Missing,
    Unversioned,
    Added,
    Replaced,
    MovedAway,
    MovedHere,
}

/// The incoming-side detail record appropriate to a conflict's
/// `incoming_action`, populated on first access and cached thereafter.
#[derive(Debug, Clone)]
pub enum IncomingDetails {
    Delete(IncomingDeleteDetails),
    Add(IncomingAddDetails),
    Edit(IncomingEditDetails),
}

/// The local-side detail record appropriate to a conflict's `local_reason`.
#[derive(Debug, Clone)]
pub enum LocalDetails {
    Missing(LocalMissingDetails),
}

/// The per-conflict object. Owns its detail caches and any move chain
/// referenced by them; does not share mutable state with other conflicts.
pub struct Conflict {
    local_abspath: String,
    text_desc: Option<ConflictDescriptor>,
    tree_desc: Option<ConflictDescriptor>,
    prop_descs: IndexMap<String, ConflictDescriptor>,

    resolution_text: OptionId,
    resolution_tree: OptionId,
    resolved_props: IndexMap<String, OptionId>,

    incoming_details: Option<IncomingDetails>,
    local_details: Option<LocalDetails>,
    /// Kept alive alongside `incoming_details`/`local_details` so that any
    /// `MoveIndex` stashed in a detail record stays valid.
    pub(crate) moves: Option<MovesTable>,
}

impl Conflict {
    /// Construct a conflict from the legacy descriptors on disk at `path`.
    #[instrument(skip(wc))]
    pub fn open<W: WorkingCopy + ?Sized>(wc: &mut W, path: &str) -> Result<Conflict, Error> {
        let descriptors = wc.read_conflict_descriptors(path)?;

        let mut text_desc = None;
        let mut tree_desc = None;
        let mut prop_descs = IndexMap::new();

        for desc in descriptors {
            match desc.kind {
                ConflictKind::Text => text_desc = Some(desc),
                ConflictKind::Tree => tree_desc = Some(desc),
                ConflictKind::Property => {
                    if let Some(name) = desc.property_name.clone() {
                        prop_descs.insert(name, desc);
                    }
                }
            }
        }

        Ok(Conflict {
            local_abspath: path.to_string(),
            text_desc,
            tree_desc,
            prop_descs,
            resolution_text: OptionId::Unspecified,
            resolution_tree: OptionId::Unspecified,
            resolved_props: IndexMap::new(),
            incoming_details: None,
            local_details: None,
            moves: None,
        })
    }

    pub fn local_abspath(&self) -> &str {
        &self.local_abspath
    }

    /// `(text_conflicted, prop_names_still_conflicted, tree_conflicted)`.
    ///
    /// `text_conflicted`/`tree_conflicted` are `false` exactly when a
    /// resolution has been accepted since the conflict was opened, or when
    /// no descriptor of that kind was present to begin with (invariant 3,
    /// spec §8).
    pub fn get_conflicted(&self) -> (bool, Vec<String>, bool) {
        let text_conflicted =
            self.text_desc.is_some() && self.resolution_text == OptionId::Unspecified;
        let tree_conflicted =
            self.tree_desc.is_some() && self.resolution_tree == OptionId::Unspecified;
        let prop_names = self
            .prop_descs
            .keys()
            .filter(|name| !self.resolved_props.contains_key(*name))
            .cloned()
            .collect();
        (text_conflicted, prop_names, tree_conflicted)
    }

    pub fn tree_desc(&self) -> Option<&ConflictDescriptor> {
        self.tree_desc.as_ref()
    }

    pub fn text_desc(&self) -> Option<&ConflictDescriptor> {
        self.text_desc.as_ref()
    }

    pub fn prop_desc(&self, name: &str) -> Option<&ConflictDescriptor> {
        self.prop_descs.get(name)
    }

    pub fn prop_descs(&self) -> &IndexMap<String, ConflictDescriptor> {
        &self.prop_descs
    }

    /// The descriptor driving whichever summary accessors (`get_operation`,
    /// `get_incoming_change`, `get_local_change`) a caller needs — prefers
    /// the tree descriptor, falling back to the text descriptor, matching
    /// the fact that a path can carry at most one tree conflict but may
    /// carry both a text and several property conflicts simultaneously.
    fn primary_desc(&self) -> Option<&ConflictDescriptor> {
        self.tree_desc.as_ref().or(self.text_desc.as_ref())
    }

    pub fn get_operation(&self) -> Operation {
        self.primary_desc().map_or(Operation::None, |d| d.operation)
    }

    pub fn get_incoming_change(&self) -> Option<ConflictAction> {
        self.primary_desc().map(|d| d.action)
    }

    pub fn get_local_change(&self) -> Option<ConflictReason> {
        self.primary_desc().map(|d| d.reason)
    }

    pub fn get_repos_info(&self) -> (Option<&crate::working_copy::ConflictVersion>, Option<&crate::working_copy::ConflictVersion>) {
        match self.primary_desc() {
            Some(d) => (d.src_left_version.as_ref(), d.src_right_version.as_ref()),
            None => (None, None),
        }
    }

    pub fn tree_get_victim_node_kind(&self) -> NodeKind {
        self.tree_desc.as_ref().map_or(NodeKind::Unknown, |d| d.victim_node_kind)
    }

    pub fn text_get_mime_type(&self) -> Option<&str> {
        self.text_desc.as_ref().and_then(|d| d.mime_type.as_deref())
    }

    pub fn is_binary(&self) -> bool {
        self.text_get_mime_type()
            .is_some_and(|m| !m.starts_with("text/"))
    }

    /// Lazily populate and return the incoming-side detail record for the
    /// tree conflict, using the appropriate Locator. Cached after the
    /// first call (spec §4.9).
    pub fn incoming_details<S: RepoSession + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<&IncomingDetails, Error> {
        if self.incoming_details.is_none() {
            let Some(tree_desc) = &self.tree_desc else {
                return Err(Error::resolver_failure(
                    &self.local_abspath,
                    "no tree conflict is recorded at this path",
                ));
            };
            let right = tree_desc.src_right_version.as_ref();
            let left = tree_desc.src_left_version.as_ref();

            let details = match tree_desc.action {
                ConflictAction::Delete | ConflictAction::Replace => {
                    let relpath = RelPath::new(
                        left.map(|v| v.path_in_repos.clone())
                            .or_else(|| right.map(|v| v.path_in_repos.clone()))
                            .unwrap_or_default(),
                    );
                    let parent = relpath.parent();
                    let old_rev = left.map_or(Rev::INVALID, |v| v.peg_rev);
                    let new_rev = right.map_or(Rev::INVALID, |v| v.peg_rev);

                    if old_rev.get() > new_rev.get() {
                        // Reverse operation: the "delete" is really the
                        // reversal of an addition.
                        let mut d = AdditionLocator::locate_addition_for_reverse(
                            session, &relpath, old_rev, new_rev,
                        )?;
                        self.attach_move_from_deletion(session, &relpath, &parent, new_rev, old_rev, &mut d)?;
                        IncomingDetails::Delete(d)
                    } else {
                        let basename = relpath.basename().to_string();
                        let located = DeletionLocator::locate(
                            session, &basename, &parent, new_rev, old_rev, None,
                        )?;
                        let (loc, table) = located.ok_or_else(|| {
                            Error::resolver_failure(
                                &self.local_abspath,
                                "expected a deletion in the probed revision range but found none",
                            )
                        })?;
                        self.moves = Some(table);
                        IncomingDetails::Delete(IncomingDeleteDetails {
                            deleted_rev: loc.deleted_rev,
                            added_rev: Rev::INVALID,
                            repos_relpath: relpath,
                            rev_author: loc.deleted_rev_author,
                            replacing_node_kind: loc.replacing_node_kind,
                            mv: loc.mv,
                        })
                    }
                }
                ConflictAction::Add => {
                    let relpath = RelPath::new(
                        right.map(|v| v.path_in_repos.clone()).unwrap_or_default(),
                    );
                    let new_rev = right.map_or(Rev::INVALID, |v| v.peg_rev);
                    let d = AdditionLocator::locate_addition_and_deletion(
                        session, &relpath, new_rev, None,
                    )?;
                    IncomingDetails::Add(d)
                }
                ConflictAction::Edit => {
                    let relpath = RelPath::new(
                        right.map(|v| v.path_in_repos.clone()).unwrap_or_default(),
                    );
                    let kind = tree_desc.victim_node_kind;
                    let rev_a = left.map_or(Rev::INVALID, |v| v.peg_rev);
                    let rev_b = right.map_or(Rev::INVALID, |v| v.peg_rev);
                    let d = EditLocator::locate(session, &relpath, kind, rev_a, rev_b)?;
                    IncomingDetails::Edit(d)
                }
            };
            self.incoming_details = Some(details);
        }
        Ok(self.incoming_details.as_ref().expect("populated above"))
    }

    fn attach_move_from_deletion<S: RepoSession + ?Sized>(
        &mut self,
        session: &mut S,
        relpath: &RelPath,
        parent: &RelPath,
        start_rev: Rev,
        end_rev: Rev,
        details: &mut IncomingDeleteDetails,
    ) -> Result<(), Error> {
        let basename = relpath.basename().to_string();
        if let Some((loc, table)) = DeletionLocator::locate(session, &basename, parent, start_rev, end_rev, None)? {
            details.mv = loc.mv;
            self.moves = Some(table);
        }
        Ok(())
    }

    /// Lazily populate the local-side detail record. Only conflicts whose
    /// `local_reason == Missing` during a merge have one (spec §3).
    pub fn local_details<S: RepoSession + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<Option<&LocalDetails>, Error> {
        let Some(tree_desc) = &self.tree_desc else {
            return Ok(None);
        };
        if tree_desc.reason != ConflictReason::Missing || tree_desc.operation != Operation::Merge {
            return Ok(None);
        }
        if self.local_details.is_none() {
            let left = tree_desc.src_left_version.as_ref();
            let relpath = RelPath::new(
                left.map(|v| v.path_in_repos.clone()).unwrap_or_default(),
            );
            let parent = relpath.parent();
            let basename = relpath.basename().to_string();
            let peg = left.map_or(Rev::INVALID, |v| v.peg_rev);

            let located = DeletionLocator::locate(session, &basename, &parent, peg, Rev::new(0), None)?;
            let (loc, table) = located.ok_or_else(|| {
                Error::resolver_failure(&self.local_abspath, "expected a deletion for the missing local node")
            })?;
            self.moves = Some(table);
            self.local_details = Some(LocalDetails::Missing(LocalMissingDetails {
                deleted_rev: loc.deleted_rev,
                deleted_rev_author: loc.deleted_rev_author,
                mv: loc.mv,
            }));
        }
        Ok(self.local_details.as_ref())
    }

    pub fn moves_table(&self) -> Option<&MovesTable> {
        self.moves.as_ref()
    }

    pub fn resolution_text(&self) -> OptionId {
        self.resolution_text
    }

    pub fn resolution_tree(&self) -> OptionId {
        self.resolution_tree
    }

    pub fn resolved_prop(&self, name: &str) -> Option<OptionId> {
        self.resolved_props.get(name).copied()
    }

    pub(crate) fn set_resolution_text(&mut self, id: OptionId) {
        self.resolution_text = id;
    }

    pub(crate) fn set_resolution_tree(&mut self, id: OptionId) {
        self.resolution_tree = id;
    }

    pub(crate) fn set_resolved_prop(&mut self, name: &str, id: OptionId) {
        self.resolved_props.insert(name.to_string(), id);
    }

    pub(crate) fn resolve_all_props(&mut self, id: OptionId) {
        let names: Vec<String> = self.prop_descs.keys().cloned().collect();
        for name in names {
            self.resolved_props.insert(name, id);
        }
    }

    pub fn get_incoming_old_repos_location(&self) -> Option<&crate::working_copy::ConflictVersion> {
        self.primary_desc().and_then(|d| d.src_left_version.as_ref())
    }

    pub fn get_incoming_new_repos_location(&self) -> Option<&crate::working_copy::ConflictVersion> {
        self.primary_desc().and_then(|d| d.src_right_version.as_ref())
    }

    /// `(base_abspath, my_abspath, their_abspath)` of the on-disk conflict
    /// marker files the working copy already materialized for a text
    /// conflict.
    pub fn text_get_contents(&self) -> Option<(Option<&str>, Option<&str>, Option<&str>)> {
        self.text_desc.as_ref().map(|d| {
            (
                d.base_abspath.as_deref(),
                d.my_abspath.as_deref(),
                d.their_abspath.as_deref(),
            )
        })
    }

    pub fn prop_get_propvals(&self, name: &str) -> Option<&crate::working_copy::PropConflictValues> {
        self.prop_descs.get(name).and_then(|d| d.property_values.as_ref())
    }

    pub fn prop_get_reject_abspath(&self, name: &str) -> Option<&str> {
        self.prop_descs
            .get(name)
            .and_then(|d| d.property_reject_abspath.as_deref())
    }

    /// Describe the incoming change, consulting detail/move caches already
    /// populated by a prior [`Conflict::incoming_details`] call (or the
    /// generic action/reason sentence if none has been populated yet).
    pub fn tree_get_description(&self, config: &crate::types::EngineConfig) -> String {
        crate::description::DescriptionCatalog::describe_incoming(
            self,
            self.incoming_details.as_ref(),
            self.moves.as_ref(),
            config,
        )
    }

    pub fn tree_get_local_description(&self, config: &crate::types::EngineConfig) -> String {
        crate::description::DescriptionCatalog::describe_local(
            self,
            self.local_details.as_ref(),
            self.moves.as_ref(),
            config,
        )
    }

    /// Populate and return both detail records in one call — the usual
    /// entry point once a conflict's resolution options are about to be
    /// enumerated or described in full.
    pub fn tree_get_details<S: RepoSession + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<(&IncomingDetails, Option<&LocalDetails>), Error> {
        self.incoming_details(session)?;
        self.local_details(session)?;
        Ok((
            self.incoming_details.as_ref().expect("populated above"),
            self.local_details.as_ref(),
        ))
    }

    pub fn text_get_resolution_options(&self) -> Vec<crate::options::Option> {
        crate::options::OptionRegistry::text_options(self)
    }

    pub fn prop_get_resolution_options(&self, name: &str) -> Vec<crate::options::Option> {
        crate::options::OptionRegistry::prop_options(self, name)
    }

    pub fn tree_get_resolution_options(&self) -> Vec<crate::options::Option> {
        crate::options::OptionRegistry::tree_options(self)
    }

    pub fn text_get_resolution(&self) -> OptionId {
        self.resolution_text
    }

    pub fn tree_get_resolution(&self) -> OptionId {
        self.resolution_tree
    }

    /// Resolve the text conflict to `id`. Returns
    /// [`Error::OptionNotApplicable`] if `id` was not among
    /// [`Conflict::text_get_resolution_options`].
    pub fn text_resolve<W: WorkingCopy + ?Sized>(
        &mut self,
        wc: &mut W,
        id: OptionId,
        config: &crate::types::EngineConfig,
    ) -> Result<(), Error> {
        if id != OptionId::Postpone
            && !crate::options::OptionRegistry::is_applicable(self, ConflictKind::Text, id, None)
        {
            return Err(Error::OptionNotApplicable { id });
        }
        crate::resolvers::resolve_text_by_id(self, wc, id, config)
    }

    /// Resolve the property conflict named `name` (or every conflicted
    /// property when `name` is `None`) to `id`.
    pub fn prop_resolve<W: WorkingCopy + ?Sized>(
        &mut self,
        wc: &mut W,
        name: Option<&str>,
        id: OptionId,
        config: &crate::types::EngineConfig,
    ) -> Result<(), Error> {
        if id != OptionId::Postpone {
            if let Some(name) = name {
                if !crate::options::OptionRegistry::is_applicable(self, ConflictKind::Property, id, Some(name)) {
                    return Err(Error::OptionNotApplicable { id });
                }
            }
        }
        crate::resolvers::resolve_prop_by_id(self, wc, name, id, config)
    }

    /// Resolve the tree conflict to `id`.
    pub fn tree_resolve<S, W>(
        &mut self,
        session: &mut S,
        wc: &mut W,
        id: OptionId,
        config: &crate::types::EngineConfig,
    ) -> Result<(), Error>
    where
        S: RepoSession + ?Sized,
        W: WorkingCopy + ?Sized,
    {
        let is_legacy_alias = matches!(id, OptionId::WorkingTextWhereConflicted | OptionId::MergedText);
        if id != OptionId::Postpone
            && !is_legacy_alias
            && !crate::options::OptionRegistry::is_applicable(self, ConflictKind::Tree, id, None)
        {
            return Err(Error::OptionNotApplicable { id });
        }
        crate::resolvers::resolve_tree_by_id(self, session, wc, id, config)
    }
}

#[cfg(test)]
mod tests {
    //! End-to-end tree-conflict resolution scenarios: open a conflict
    //! recorded against a fake working copy, ask for resolution options,
    //! resolve, and check the fake's resulting state. Named after the
    //! merge-incoming-add seed scenarios this engine is built to
    //! discriminate between.

    use std::collections::HashMap;
    use std::fs;
    use std::time::Duration;

    use crate::error::Error;
    use crate::options::OptionId;
    use crate::repo_session::{ChangeAction, ChangedPath, LogEntry};
    use crate::types::{EngineConfig, NodeKind, RelPath, Rev};
    use crate::working_copy::{ConflictChoice, ConflictDescriptor, ConflictVersion, LockToken, PropConflictValues};
    use crate::{Conflict, ConflictAction, ConflictKind, ConflictReason, Operation, RepoSession, WorkingCopy};

    /// Builds a [`FakeRepoSession`] with a fluent interface so a scenario
    /// test can state only the history it actually needs.
    #[derive(Default)]
    struct FakeRepoBuilder {
        log_entries: Vec<LogEntry>,
        segments: Vec<crate::repo_session::LocationSegment>,
        locations: HashMap<(String, i64), Vec<(i64, String)>>,
        check_path: HashMap<(String, i64), NodeKind>,
        files: HashMap<(String, i64), (Vec<u8>, Vec<(String, Vec<u8>)>)>,
        deleted_rev: Rev,
        latest: Rev,
        author: Option<String>,
    }

    impl FakeRepoBuilder {
        fn new() -> Self {
            FakeRepoBuilder {
                deleted_rev: Rev::INVALID,
                latest: Rev::new(0),
                ..Default::default()
            }
        }

        fn log_entry(mut self, entry: LogEntry) -> Self {
            self.log_entries.push(entry);
            self
        }

        fn segment(mut self, path: Option<&str>, start: i64, end: i64) -> Self {
            self.segments.push(crate::repo_session::LocationSegment {
                path: path.map(RelPath::new),
                range_start: Rev::new(start),
                range_end: Rev::new(end),
            });
            self
        }

        fn file(mut self, relpath: &str, rev: i64, content: &[u8], props: Vec<(&str, &[u8])>) -> Self {
            self.files.insert(
                (relpath.to_string(), rev),
                (
                    content.to_vec(),
                    props.into_iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect(),
                ),
            );
            self
        }

        fn latest(mut self, rev: i64) -> Self {
            self.latest = Rev::new(rev);
            self
        }

        fn author(mut self, author: &str) -> Self {
            self.author = Some(author.to_string());
            self
        }

        fn build(self) -> FakeRepoSession {
            FakeRepoSession {
                log_entries: self.log_entries,
                segments: self.segments,
                locations: self.locations,
                check_path: self.check_path,
                files: self.files,
                deleted_rev: self.deleted_rev,
                latest: self.latest,
                author: self.author,
            }
        }
    }

    struct FakeRepoSession {
        log_entries: Vec<LogEntry>,
        segments: Vec<crate::repo_session::LocationSegment>,
        locations: HashMap<(String, i64), Vec<(i64, String)>>,
        check_path: HashMap<(String, i64), NodeKind>,
        files: HashMap<(String, i64), (Vec<u8>, Vec<(String, Vec<u8>)>)>,
        deleted_rev: Rev,
        latest: Rev,
        author: Option<String>,
    }

    impl RepoSession for FakeRepoSession {
        fn open(&mut self, _url: &str) -> Result<(), Error> {
            Ok(())
        }

        fn get_log(
            &mut self,
            _paths: &[RelPath],
            _start: Rev,
            _end: Rev,
            _revprops: &[&str],
            receiver: &mut crate::repo_session::LogReceiver<'_>,
        ) -> Result<(), Error> {
            for entry in &self.log_entries {
                receiver(entry)?;
            }
            Ok(())
        }

        fn get_locations(
            &mut self,
            relpath: &RelPath,
            peg: Rev,
            wanted_revs: &[Rev],
        ) -> Result<Vec<crate::repo_session::Location>, Error> {
            let key = (relpath.as_str().to_string(), peg.get());
            let Some(entries) = self.locations.get(&key) else {
                return Ok(vec![]);
            };
            Ok(wanted_revs
                .iter()
                .filter_map(|want| {
                    entries
                        .iter()
                        .find(|(r, _)| *r == want.get())
                        .map(|(r, p)| crate::repo_session::Location {
                            relpath: RelPath::new(p.clone()),
                            rev: Rev::new(*r),
                        })
                })
                .collect())
        }

        fn get_location_segments(
            &mut self,
            _relpath: &RelPath,
            _peg: Rev,
            _start: Rev,
            _end: Rev,
            receiver: &mut crate::repo_session::SegmentReceiver<'_>,
        ) -> Result<(), Error> {
            for seg in &self.segments {
                receiver(seg)?;
            }
            Ok(())
        }

        fn get_deleted_rev(&mut self, _relpath: &RelPath, _start: Rev, _end: Rev) -> Result<Rev, Error> {
            Ok(self.deleted_rev)
        }

        fn rev_prop(&mut self, _rev: Rev, _name: &str) -> Result<Option<String>, Error> {
            Ok(self.author.clone())
        }

        fn check_path(&mut self, relpath: &RelPath, rev: Rev) -> Result<NodeKind, Error> {
            Ok(self
                .check_path
                .get(&(relpath.as_str().to_string(), rev.get()))
                .copied()
                .unwrap_or(NodeKind::None))
        }

        fn get_file(
            &mut self,
            relpath: &RelPath,
            rev: Rev,
            sink: &mut dyn std::io::Write,
        ) -> Result<Vec<(String, Vec<u8>)>, Error> {
            let key = (relpath.as_str().to_string(), rev.get());
            let (content, props) = self.files.get(&key).cloned().unwrap_or_default();
            sink.write_all(&content)?;
            Ok(props)
        }

        fn reparent(&mut self, _url: &str) -> Result<(), Error> {
            Ok(())
        }

        fn get_latest_revnum(&mut self) -> Result<Rev, Error> {
            Ok(self.latest)
        }

        fn get_youngest_common_ancestor(
            &mut self,
            _loc1: (&RelPath, Rev),
            _loc2: (&RelPath, Rev),
        ) -> Result<Option<crate::repo_session::Location>, Error> {
            Ok(None)
        }
    }

    /// An in-tempdir working copy fake. Conflict descriptors and bookkeeping
    /// live in memory; file mutations (`delete_node`, `add_repos_file`,
    /// `merge_files`) touch real paths under `root` so resolvers that shell
    /// out to `std::fs` exercise real I/O.
    struct FakeWorkingCopy {
        root: tempfile::TempDir,
        descriptors: HashMap<String, Vec<ConflictDescriptor>>,
        cleared_tree_conflict: HashMap<String, bool>,
        disk_kind: HashMap<String, NodeKind>,
        node_origin: HashMap<String, (bool, Rev, Option<String>)>,
        props: HashMap<String, Vec<(String, Vec<u8>)>>,
    }

    impl FakeWorkingCopy {
        fn new() -> Self {
            FakeWorkingCopy {
                root: tempfile::tempdir().expect("create tempdir"),
                descriptors: HashMap::new(),
                cleared_tree_conflict: HashMap::new(),
                disk_kind: HashMap::new(),
                node_origin: HashMap::new(),
                props: HashMap::new(),
            }
        }

        fn abspath(&self, name: &str) -> String {
            self.root.path().join(name).to_string_lossy().into_owned()
        }

        #[allow(clippy::too_many_arguments)]
        fn set_tree_conflict(
            &mut self,
            abspath: &str,
            operation: Operation,
            action: ConflictAction,
            reason: ConflictReason,
            victim_node_kind: NodeKind,
            src_left: Option<ConflictVersion>,
            src_right: Option<ConflictVersion>,
        ) {
            self.descriptors.entry(abspath.to_string()).or_default().push(ConflictDescriptor {
                kind: ConflictKind::Tree,
                operation,
                action,
                reason,
                victim_node_kind,
                src_left_version: src_left,
                src_right_version: src_right,
                base_abspath: None,
                my_abspath: None,
                their_abspath: None,
                mime_type: None,
                property_name: None,
                property_values: None,
                property_reject_abspath: None,
            });
            self.cleared_tree_conflict.insert(abspath.to_string(), false);
        }

        fn write_file(&self, abspath: &str, content: &[u8]) {
            fs::write(abspath, content).expect("write fake working file");
        }

        fn set_node_origin(&mut self, abspath: &str, is_copy: bool, copyfrom_rev: Rev, copyfrom_relpath: Option<&str>) {
            self.node_origin.insert(abspath.to_string(), (is_copy, copyfrom_rev, copyfrom_relpath.map(str::to_string)));
        }

        fn set_props(&mut self, abspath: &str, props: Vec<(&str, &[u8])>) {
            self.props.insert(
                abspath.to_string(),
                props.into_iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect(),
            );
        }

        fn is_tree_conflict_cleared(&self, abspath: &str) -> bool {
            self.cleared_tree_conflict.get(abspath).copied().unwrap_or(false)
        }
    }

    impl WorkingCopy for FakeWorkingCopy {
        fn acquire_for_resolve(&mut self, abspath: &str) -> Result<LockToken, Error> {
            Ok(LockToken(abspath.to_string()))
        }

        fn release(&mut self, _token: LockToken) -> Result<(), Error> {
            Ok(())
        }

        fn delete_node(&mut self, abspath: &str) -> Result<(), Error> {
            self.disk_kind.insert(abspath.to_string(), NodeKind::None);
            if std::path::Path::new(abspath).exists() {
                fs::remove_file(abspath)?;
            }
            Ok(())
        }

        fn copy_node(&mut self, src_abspath: &str, dst_abspath: &str, metadata_only: bool) -> Result<(), Error> {
            if !metadata_only {
                fs::copy(src_abspath, dst_abspath)?;
            }
            Ok(())
        }

        fn add_repos_file(
            &mut self,
            abspath: &str,
            contents: &[u8],
            props: &[(String, Vec<u8>)],
            _copyfrom_url: &str,
            _copyfrom_rev: Rev,
        ) -> Result<(), Error> {
            fs::write(abspath, contents)?;
            self.props.insert(abspath.to_string(), props.to_vec());
            self.disk_kind.insert(abspath.to_string(), NodeKind::File);
            Ok(())
        }

        /// A 3-way text merge too simple to run a real diff3, but faithful to
        /// its outcomes: a clean fast-forward when `mine` hasn't diverged
        /// from `base`, and a conflict marker when both `mine` and `theirs`
        /// diverged from `base` in incompatible ways. `propdiffs` are
        /// applied to `mine`'s tracked properties unconditionally — the
        /// engine always passes the side that should win as the diff's new
        /// value.
        fn merge_files(
            &mut self,
            base: &str,
            theirs: &str,
            mine: &str,
            propdiffs: &[(String, Option<Vec<u8>>, Option<Vec<u8>>)],
        ) -> Result<(), Error> {
            let base_content = fs::read(base).unwrap_or_default();
            let mine_content = fs::read(mine).unwrap_or_default();
            let theirs_content = fs::read(theirs)?;

            if mine_content == base_content {
                fs::write(mine, &theirs_content)?;
            } else if theirs_content != base_content {
                let mut merged = Vec::new();
                merged.extend_from_slice(b"<<<<<<< mine\n");
                merged.extend_from_slice(&mine_content);
                merged.extend_from_slice(b"=======\n");
                merged.extend_from_slice(&theirs_content);
                merged.extend_from_slice(b">>>>>>> theirs\n");
                fs::write(mine, merged)?;
            }

            let mut props = self.props.get(mine).cloned().unwrap_or_default();
            for (name, _old, new) in propdiffs {
                match new {
                    Some(value) => match props.iter_mut().find(|(n, _)| n == name) {
                        Some(existing) => existing.1 = value.clone(),
                        None => props.push((name.clone(), value.clone())),
                    },
                    None => props.retain(|(n, _)| n != name),
                }
            }
            self.props.insert(mine.to_string(), props);

            Ok(())
        }

        fn clear_tree_conflict(&mut self, abspath: &str) -> Result<(), Error> {
            self.cleared_tree_conflict.insert(abspath.to_string(), true);
            Ok(())
        }

        fn break_moved_away(&mut self, _abspath: &str) -> Result<(), Error> {
            Ok(())
        }

        fn raise_moved_away(&mut self, _abspath: &str) -> Result<(), Error> {
            Ok(())
        }

        fn update_moved_away_node(&mut self, _abspath: &str) -> Result<(), Error> {
            Ok(())
        }

        fn node_origin(&mut self, abspath: &str) -> Result<(bool, Rev, Option<String>), Error> {
            Ok(self.node_origin.get(abspath).cloned().unwrap_or((false, Rev::INVALID, None)))
        }

        fn node_moved_away(&mut self, _abspath: &str) -> Result<Option<String>, Error> {
            Ok(None)
        }

        fn node_moved_here(&mut self, _abspath: &str) -> Result<Option<String>, Error> {
            Ok(None)
        }

        fn wcroot(&mut self, _abspath: &str) -> Result<String, Error> {
            Ok(self.root.path().to_string_lossy().into_owned())
        }

        fn tmpdir(&mut self, _abspath: &str) -> Result<String, Error> {
            let dir = self.root.path().join(".svn-tmp");
            fs::create_dir_all(&dir)?;
            Ok(dir.to_string_lossy().into_owned())
        }

        fn prop_list(&mut self, abspath: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
            Ok(self.props.get(abspath).cloned().unwrap_or_default())
        }

        fn read_conflict_descriptors(&mut self, abspath: &str) -> Result<Vec<ConflictDescriptor>, Error> {
            Ok(self.descriptors.get(abspath).cloned().unwrap_or_default())
        }

        fn resolve_text_conflict(&mut self, _abspath: &str, _choice: ConflictChoice) -> Result<(), Error> {
            Ok(())
        }

        fn resolve_prop_conflict(&mut self, _abspath: &str, _propname: Option<&str>, _choice: ConflictChoice) -> Result<(), Error> {
            Ok(())
        }

        fn disk_node_kind(&mut self, abspath: &str) -> Result<NodeKind, Error> {
            Ok(self.disk_kind.get(abspath).copied().unwrap_or(NodeKind::Unknown))
        }

        fn base_revision(&mut self, _abspath: &str) -> Result<Rev, Error> {
            Ok(Rev::new(1))
        }
    }

    fn conflict_version(url: &str, uuid: &str, path_in_repos: &str, peg_rev: i64, node_kind: NodeKind) -> ConflictVersion {
        ConflictVersion {
            repos_url: url::Url::parse(url).expect("valid fixture URL"),
            repos_uuid: uuid.to_string(),
            path_in_repos: path_in_repos.to_string(),
            peg_rev: Rev::new(peg_rev),
            node_kind,
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            timestamp_sleep: Duration::from_millis(1),
            max_chain_depth: 10_000,
        }
    }

    fn fs_read(abspath: &str) -> Vec<u8> {
        fs::read(abspath).expect("fake working file should exist")
    }

    /// Local obstruction's property value in the S1-S4 seed scenarios
    /// (spec'd as `P_B`, for "branch").
    const P_B: &[u8] = b"P_B";
    /// Incoming added file's property value (spec'd as `P_T`, for "trunk").
    const P_T: &[u8] = b"P_T";
    const PROP_NAME: &str = "custom:marker";

    fn merge_add_obstructed_file_conflict(wc: &mut FakeWorkingCopy, abspath: &str) {
        wc.set_tree_conflict(
            abspath,
            Operation::Merge,
            ConflictAction::Add,
            ConflictReason::Obstructed,
            NodeKind::File,
            None,
            Some(conflict_version(
                "https://svn.example/repo",
                "uuid-1",
                "trunk/new.txt",
                10,
                NodeKind::File,
            )),
        );
    }

    fn incoming_add_session() -> FakeRepoSession {
        FakeRepoBuilder::new()
            .segment(Some("trunk/new.txt"), 10, 20)
            .latest(10)
            .author("alice")
            .file("trunk/new.txt", 10, b"incoming contents\n", vec![(PROP_NAME, P_T)])
            .build()
    }

    fn prop_value(wc: &mut FakeWorkingCopy, abspath: &str) -> Option<Vec<u8>> {
        wc.prop_list(abspath)
            .unwrap()
            .into_iter()
            .find(|(name, _)| name == PROP_NAME)
            .map(|(_, value)| value)
    }

    // S1: merge-incoming-add-ignore leaves the obstruction (and its
    // property) in place and just clears the tree conflict.
    #[test]
    fn s1_merge_incoming_add_ignore() {
        let mut wc = FakeWorkingCopy::new();
        let abspath = wc.abspath("new.txt");
        wc.write_file(&abspath, b"local obstruction\n");
        wc.set_props(&abspath, vec![(PROP_NAME, P_B)]);
        merge_add_obstructed_file_conflict(&mut wc, &abspath);

        let mut conflict = Conflict::open(&mut wc, &abspath).unwrap();
        let mut session = incoming_add_session();

        let options = conflict.tree_get_resolution_options();
        assert!(options.iter().any(|o| o.id == OptionId::MergeIncomingAddIgnore));
        assert!(options.iter().any(|o| o.id == OptionId::MergeIncomingAddedFileTextMerge));

        conflict
            .tree_resolve(&mut session, &mut wc, OptionId::MergeIncomingAddIgnore, &fast_config())
            .unwrap();

        assert!(wc.is_tree_conflict_cleared(&abspath));
        assert_eq!(conflict.tree_get_resolution(), OptionId::MergeIncomingAddIgnore);
        assert_eq!(fs_read(&abspath), b"local obstruction\n");
        assert_eq!(prop_value(&mut wc, &abspath).as_deref(), Some(P_B));
    }

    // S2: merge-incoming-added-file-text-merge runs the (fake) merge driver
    // over the incoming content; since the obstruction is unrelated content
    // rather than a clean ancestor of the incoming file, the 3-way merge
    // conflicts on text, but the property is adopted from the incoming side.
    #[test]
    fn s2_merge_incoming_added_file_text_merge() {
        let mut wc = FakeWorkingCopy::new();
        let abspath = wc.abspath("new.txt");
        wc.write_file(&abspath, b"local obstruction\n");
        wc.set_props(&abspath, vec![(PROP_NAME, P_B)]);
        merge_add_obstructed_file_conflict(&mut wc, &abspath);

        let mut conflict = Conflict::open(&mut wc, &abspath).unwrap();
        let mut session = incoming_add_session();

        conflict
            .tree_resolve(&mut session, &mut wc, OptionId::MergeIncomingAddedFileTextMerge, &fast_config())
            .unwrap();

        assert!(wc.is_tree_conflict_cleared(&abspath));
        let merged = fs_read(&abspath);
        assert!(merged.windows(7).any(|w| w == b"<<<<<<<"), "expected a text-conflict marker, got {merged:?}");
        assert_eq!(prop_value(&mut wc, &abspath).as_deref(), Some(P_T));
    }

    // S3: merge-incoming-added-file-replace discards the obstruction,
    // installs the incoming file, and adopts its property.
    #[test]
    fn s3_merge_incoming_added_file_replace() {
        let mut wc = FakeWorkingCopy::new();
        let abspath = wc.abspath("new.txt");
        wc.write_file(&abspath, b"local obstruction\n");
        wc.set_props(&abspath, vec![(PROP_NAME, P_B)]);
        merge_add_obstructed_file_conflict(&mut wc, &abspath);

        let mut conflict = Conflict::open(&mut wc, &abspath).unwrap();
        let mut session = incoming_add_session();

        conflict
            .tree_resolve(&mut session, &mut wc, OptionId::MergeIncomingAddedFileReplace, &fast_config())
            .unwrap();

        assert!(wc.is_tree_conflict_cleared(&abspath));
        assert_eq!(conflict.tree_get_resolution(), OptionId::MergeIncomingAddedFileReplace);
        assert_eq!(fs_read(&abspath), b"incoming contents\n");
        assert_eq!(prop_value(&mut wc, &abspath).as_deref(), Some(P_T));
    }

    // S4: merge-incoming-added-file-replace-and-merge replaces, then folds
    // the obstructed content back in — which conflicts for the same reason
    // as S2 — while the property stays at the incoming value.
    #[test]
    fn s4_merge_incoming_added_file_replace_and_merge() {
        let mut wc = FakeWorkingCopy::new();
        let abspath = wc.abspath("new.txt");
        wc.write_file(&abspath, b"local obstruction\n");
        wc.set_props(&abspath, vec![(PROP_NAME, P_B)]);
        merge_add_obstructed_file_conflict(&mut wc, &abspath);

        let mut conflict = Conflict::open(&mut wc, &abspath).unwrap();
        let mut session = incoming_add_session();

        conflict
            .tree_resolve(
                &mut session,
                &mut wc,
                OptionId::MergeIncomingAddedFileReplaceAndMerge,
                &fast_config(),
            )
            .unwrap();

        assert!(wc.is_tree_conflict_cleared(&abspath));
        assert_eq!(conflict.tree_get_resolution(), OptionId::MergeIncomingAddedFileReplaceAndMerge);
        let merged = fs_read(&abspath);
        assert!(merged.windows(7).any(|w| w == b"<<<<<<<"), "expected a text-conflict marker, got {merged:?}");
        assert_eq!(prop_value(&mut wc, &abspath).as_deref(), Some(P_T));
    }

    // S5: a directory-add-vs-obstruction conflict under merge only ever
    // offers (and resolves through) the single-node ignore path; the
    // "merge"/"replace" variants exist but are documented as single-node-only
    // simplifications.
    #[test]
    fn s5_merge_incoming_add_ignore_directory() {
        let mut wc = FakeWorkingCopy::new();
        let abspath = wc.abspath("newdir");
        wc.set_tree_conflict(
            &abspath,
            Operation::Merge,
            ConflictAction::Add,
            ConflictReason::Obstructed,
            NodeKind::Dir,
            None,
            Some(conflict_version(
                "https://svn.example/repo",
                "uuid-1",
                "trunk/newdir",
                10,
                NodeKind::Dir,
            )),
        );

        let mut conflict = Conflict::open(&mut wc, &abspath).unwrap();
        let options = conflict.tree_get_resolution_options();
        assert!(options.iter().any(|o| o.id == OptionId::MergeIncomingAddIgnore));
        assert!(options.iter().any(|o| o.id == OptionId::MergeIncomingAddedDirMerge));

        let mut session = FakeRepoBuilder::new().build();
        conflict
            .tree_resolve(&mut session, &mut wc, OptionId::MergeIncomingAddIgnore, &fast_config())
            .unwrap();

        assert!(wc.is_tree_conflict_cleared(&abspath));
    }

    fn incoming_delete_conflict(wc: &mut FakeWorkingCopy, abspath: &str) {
        wc.set_tree_conflict(
            abspath,
            Operation::Update,
            ConflictAction::Delete,
            ConflictReason::Edited,
            NodeKind::File,
            Some(conflict_version(
                "https://svn.example/repo",
                "uuid-1",
                "trunk/gone.txt",
                5,
                NodeKind::File,
            )),
            Some(conflict_version(
                "https://svn.example/repo",
                "uuid-1",
                "trunk/gone.txt",
                8,
                NodeKind::File,
            )),
        );
        wc.set_node_origin(abspath, true, Rev::new(3), Some("trunk/gone.txt"));
    }

    fn incoming_delete_session() -> FakeRepoSession {
        FakeRepoBuilder::new()
            .log_entry(LogEntry {
                rev: Rev::new(7),
                author: Some("bob".to_string()),
                changed_paths: vec![ChangedPath {
                    relpath: RelPath::new("trunk/gone.txt"),
                    action: ChangeAction::Deleted,
                    node_kind: NodeKind::File,
                    copyfrom: None,
                }],
            })
            .build()
    }

    // Incoming-delete-accept deletes the local node and clears the tree
    // conflict.
    #[test]
    fn incoming_delete_accept_deletes_node() {
        let mut wc = FakeWorkingCopy::new();
        let abspath = wc.abspath("gone.txt");
        wc.write_file(&abspath, b"still here locally\n");
        incoming_delete_conflict(&mut wc, &abspath);

        let mut conflict = Conflict::open(&mut wc, &abspath).unwrap();
        let mut session = incoming_delete_session();

        let options = conflict.tree_get_resolution_options();
        assert!(options.iter().any(|o| o.id == OptionId::IncomingDeleteAccept));
        assert!(options.iter().any(|o| o.id == OptionId::IncomingDeleteIgnore));

        conflict
            .tree_resolve(&mut session, &mut wc, OptionId::IncomingDeleteAccept, &fast_config())
            .unwrap();

        assert!(wc.is_tree_conflict_cleared(&abspath));
        assert_eq!(conflict.tree_get_resolution(), OptionId::IncomingDeleteAccept);
        assert!(!std::path::Path::new(&abspath).exists());
    }

    // Incoming-delete-ignore keeps the local node and just clears the tree
    // conflict.
    #[test]
    fn incoming_delete_ignore_keeps_node() {
        let mut wc = FakeWorkingCopy::new();
        let abspath = wc.abspath("gone.txt");
        wc.write_file(&abspath, b"still here locally\n");
        incoming_delete_conflict(&mut wc, &abspath);

        let mut conflict = Conflict::open(&mut wc, &abspath).unwrap();
        let mut session = incoming_delete_session();

        conflict
            .tree_resolve(&mut session, &mut wc, OptionId::IncomingDeleteIgnore, &fast_config())
            .unwrap();

        assert!(wc.is_tree_conflict_cleared(&abspath));
        assert_eq!(conflict.tree_get_resolution(), OptionId::IncomingDeleteIgnore);
        assert!(std::path::Path::new(&abspath).exists());
        assert_eq!(fs_read(&abspath), b"still here locally\n");
    }

    // An inapplicable option is rejected before any working-copy mutation
    // happens.
    #[test]
    fn inapplicable_option_is_rejected() {
        let mut wc = FakeWorkingCopy::new();
        let abspath = wc.abspath("gone.txt");
        wc.write_file(&abspath, b"still here locally\n");
        incoming_delete_conflict(&mut wc, &abspath);

        let mut conflict = Conflict::open(&mut wc, &abspath).unwrap();
        let mut session = incoming_delete_session();

        let err = conflict
            .tree_resolve(&mut session, &mut wc, OptionId::UpdateMoveDestination, &fast_config())
            .unwrap_err();
        assert!(matches!(err, Error::OptionNotApplicable { .. }));
        assert!(!wc.is_tree_conflict_cleared(&abspath));
    }
}
