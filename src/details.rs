//! Per-conflict detail records populated by the Locators and cached on a
//! [`crate::conflict::ConflictEnvelope`].

use crate::moves::MoveIndex;
use crate::types::{NodeKind, RelPath, Rev, Tristate};

/// Populated for tree conflicts whose local side is "missing" during a
/// merge.
#[derive(Debug, Clone)]
pub struct LocalMissingDetails {
    pub deleted_rev: Rev,
    pub deleted_rev_author: Option<String>,
    pub mv: Option<MoveIndex>,
}

/// Details for an incoming delete. Exactly one of `deleted_rev`/`added_rev`
/// is valid: `added_rev` is populated instead of `deleted_rev` when the
/// operation applies an addition in reverse (a reverse-merge, or a
/// backwards update/switch/merge).
#[derive(Debug, Clone)]
pub struct IncomingDeleteDetails {
    pub deleted_rev: Rev,
    pub added_rev: Rev,
    pub repos_relpath: RelPath,
    pub rev_author: Option<String>,
    pub replacing_node_kind: NodeKind,
    pub mv: Option<MoveIndex>,
}

impl IncomingDeleteDetails {
    pub fn is_reverse_of_addition(&self) -> bool {
        self.added_rev.is_valid()
    }
}

/// Details for an incoming add. For update/switch both `added_rev` and
/// `deleted_rev` may be valid at once (the node was added, then later
/// deleted upstream).
#[derive(Debug, Clone)]
pub struct IncomingAddDetails {
    pub added_rev: Rev,
    pub deleted_rev: Rev,
    pub repos_relpath: RelPath,
    pub added_rev_author: Option<String>,
    pub deleted_rev_author: Option<String>,
    pub mv: Option<MoveIndex>,
}

/// One modifying revision of a node, part of an [`IncomingEditDetails`]
/// list.
#[derive(Debug, Clone)]
pub struct IncomingEditRecord {
    pub rev: Rev,
    pub author: Option<String>,
    pub text_modified: Tristate,
    pub props_modified: Tristate,
    pub children_modified: Tristate,
    pub repos_relpath: RelPath,
}

/// Ordered (ascending revision) list of modifying revisions for a node in a
/// given range.
#[derive(Debug, Clone, Default)]
pub struct IncomingEditDetails {
    pub edits: Vec<IncomingEditRecord>,
}
