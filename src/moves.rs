//! Server-side move discovery.
//!
//! [`MoveScanner`] consumes a log stream newest-first and infers moves from
//! copy+delete pairs within a single revision, ancestrally verified against
//! the repository. Discovered moves are stored in an arena
//! ([`MovesTable`]) keyed by a stable index, with `prev`/`next` forming a
//! doubly-linked chain across revisions without any cyclic `Rc`/`RefCell`
//! ownership (spec §9's "pointer graph of moves" design note).

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument, warn};

use crate::error::Error;
use crate::repo_session::{ChangeAction, ChangedPath, LogEntry, RepoSession};
use crate::types::{RelPath, Rev};

/// A stable index into a [`MovesTable`]'s arena. Cheap to copy, valid only
/// for the table it was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveIndex(usize);

/// A discovered server-side move: a copy+delete pair within one revision,
/// ancestrally verified.
#[derive(Debug, Clone)]
pub struct RepoMove {
    pub moved_from_repos_relpath: RelPath,
    pub moved_to_repos_relpath: RelPath,
    pub rev: Rev,
    pub rev_author: Option<String>,
    pub copyfrom_rev: Rev,
    pub prev: Option<MoveIndex>,
    pub next: Option<MoveIndex>,
}

/// Revision-indexed table of discovered moves, plus the transient scan
/// state `MoveScanner` needs while walking. All `RepoMove`s returned to a
/// conflict's details are owned by this arena; `ConflictEnvelope` keeps the
/// table alive as long as it needs the chain.
#[derive(Debug, Default)]
pub struct MovesTable {
    arena: Vec<RepoMove>,
    by_rev: BTreeMap<i64, Vec<MoveIndex>>,
    /// `from-relpath -> head RepoMove`, populated during a walk and
    /// meaningless once the walk that produced it ends (the same transient
    /// relationship spec §3 documents).
    moved_paths: HashMap<RelPath, MoveIndex>,
}

impl MovesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, idx: MoveIndex) -> &RepoMove {
        &self.arena[idx.0]
    }

    pub fn moves_in_rev(&self, rev: Rev) -> &[MoveIndex] {
        self.by_rev.get(&rev.get()).map_or(&[], Vec::as_slice)
    }

    /// Find the move (if any) discovered in `rev` whose source relpath is
    /// exactly `from`.
    pub fn find_move_from(&self, rev: Rev, from: &RelPath) -> Option<MoveIndex> {
        self.moves_in_rev(rev)
            .iter()
            .copied()
            .find(|&idx| &self.get(idx).moved_from_repos_relpath == from)
    }

    /// Walk `start.next.next...` up to `max_depth` hops, returning the
    /// chain (not including `start` itself).
    pub fn next_chain(&self, start: MoveIndex, max_depth: usize) -> Vec<MoveIndex> {
        let mut out = Vec::new();
        let mut cur = self.get(start).next;
        let mut depth = 0;
        while let Some(idx) = cur {
            out.push(idx);
            cur = self.get(idx).next;
            depth += 1;
            if depth >= max_depth {
                warn!(max_depth, "move chain exceeded max_chain_depth, truncating");
                break;
            }
        }
        out
    }

    fn push(&mut self, mv: RepoMove) -> MoveIndex {
        let rev = mv.rev;
        let idx = MoveIndex(self.arena.len());
        self.arena.push(mv);
        self.by_rev.entry(rev.get()).or_default().push(idx);
        idx
    }
}

/// Per-revision partition of `changed_paths` used by step 1 of the
/// algorithm in spec §4.2.
struct Partition {
    /// `copyfrom_relpath -> [(to, from_rev)]`
    copies: HashMap<RelPath, Vec<(RelPath, Rev)>>,
    deleted_relpaths: Vec<RelPath>,
}

fn partition(changed_paths: &[ChangedPath]) -> Partition {
    let mut copies: HashMap<RelPath, Vec<(RelPath, Rev)>> = HashMap::new();
    let mut deleted_relpaths = Vec::new();

    for cp in changed_paths {
        match cp.action {
            ChangeAction::Added => {
                if let Some(from) = &cp.copyfrom {
                    copies
                        .entry(from.relpath.clone())
                        .or_default()
                        .push((cp.relpath.clone(), from.rev));
                }
            }
            ChangeAction::Deleted | ChangeAction::Replaced => {
                deleted_relpaths.push(cp.relpath.clone());
            }
            ChangeAction::Modified => {}
        }
    }

    Partition {
        copies,
        deleted_relpaths,
    }
}

/// Scans a repository log stream for server-side moves, filling in a
/// [`MovesTable`] as it goes. Walk history newest-to-oldest (as `get_log`
/// naturally delivers when `start > end`) so that `next` links are only
/// ever set once the later move has already been observed, per the
/// ordering guarantee in spec §5.
pub struct MoveScanner<'a, S: RepoSession + ?Sized> {
    session: &'a mut S,
    table: MovesTable,
}

impl<'a, S: RepoSession + ?Sized> MoveScanner<'a, S> {
    pub fn new(session: &'a mut S) -> Self {
        MoveScanner {
            session,
            table: MovesTable::new(),
        }
    }

    pub fn into_table(self) -> MovesTable {
        self.table
    }

    pub fn table(&self) -> &MovesTable {
        &self.table
    }

    /// Borrow the underlying session for a one-off call that needs to
    /// interleave with scanning (e.g. an ancestry check a caller performs
    /// between `scan_entry` calls).
    pub fn session_mut(&mut self) -> &mut S {
        self.session
    }

    /// Process one log entry. Safe to call repeatedly from a `get_log`
    /// receiver walking revisions newest-first.
    #[instrument(skip(self, entry), fields(rev = entry.rev.get()))]
    pub fn scan_entry(&mut self, entry: &LogEntry) -> Result<(), Error> {
        let Partition {
            copies,
            deleted_relpaths,
        } = partition(&entry.changed_paths);

        for deleted in &deleted_relpaths {
            let Some(candidates) = copies.get(deleted) else {
                // Deletions inside copies (cp A B; mv B/foo C/foo) are not
                // matched here: the copyfrom path no longer points to the
                // deleted node's pre-copy location. Documented limitation,
                // spec §9.
                continue;
            };

            for (to, copyfrom_rev) in candidates {
                if self.verify_ancestry(deleted, entry.rev, *copyfrom_rev, deleted)? {
                    let mut mv = RepoMove {
                        moved_from_repos_relpath: deleted.clone(),
                        moved_to_repos_relpath: to.clone(),
                        rev: entry.rev,
                        rev_author: entry.author.clone(),
                        copyfrom_rev: *copyfrom_rev,
                        prev: None,
                        next: None,
                    };

                    // Chain linkage: a later move of `to` may already have
                    // been discovered (we walk newest-first).
                    if let Some(next_idx) = self.table.moved_paths.get(to).copied() {
                        let next_move = self.table.get(next_idx).clone();
                        debug_assert!(entry.rev < next_move.rev);
                        if self.verify_ancestry(
                            &next_move.moved_from_repos_relpath,
                            next_move.rev,
                            mv.copyfrom_rev,
                            to,
                        )? {
                            mv.next = Some(next_idx);
                        }
                    }

                    let idx = self.table.push(mv);
                    if let Some(next_idx) = self.table.get(idx).next {
                        self.table.arena[next_idx.0].prev = Some(idx);
                    }
                    self.table
                        .moved_paths
                        .insert(deleted.clone(), idx);
                    debug!(from = %deleted, to = %to, rev = entry.rev.get(), "discovered server-side move");
                }
            }
        }

        Ok(())
    }

    /// Verify that the node at `(checked_relpath, rev - 1)` traces back to
    /// `(expected_relpath, copyfrom_rev)` via `get_locations`.
    fn verify_ancestry(
        &mut self,
        checked_relpath: &RelPath,
        rev: Rev,
        copyfrom_rev: Rev,
        expected_relpath: &RelPath,
    ) -> Result<bool, Error> {
        let prior = Rev::new(rev.get() - 1);
        let locations =
            self.session
                .get_locations(checked_relpath, prior, &[copyfrom_rev])?;
        Ok(locations
            .iter()
            .any(|loc| loc.rev == copyfrom_rev && &loc.relpath == expected_relpath))
    }
}
