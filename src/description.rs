//! Human-readable descriptions of a conflict's incoming/local change,
//! assembled from whatever detail the Locators managed to recover. Pure
//! string formatting — no repository or working-copy access.

use crate::conflict::{Conflict, ConflictAction, ConflictReason, IncomingDetails, LocalDetails};
use crate::moves::MovesTable;
use crate::types::EngineConfig;

/// Cascading description assembly for one conflict. Each `describe_*`
/// function tries progressively less specific information, the way the
/// original engine's `svn_client_conflict_tree_get_description` falls
/// through from a move chain, to a bare detail record, to the generic
/// action/reason pairing.
pub struct DescriptionCatalog;

impl DescriptionCatalog {
    /// Describe the incoming (repository-side) change.
    ///
    /// 1. If a detail record was located and it is itself the head of a
    ///    server-side move chain, describe the full chain.
    /// 2. Else if a detail record was located, describe that record alone.
    /// 3. Else fall back to the generic action/kind sentence.
    pub fn describe_incoming(
        conflict: &Conflict,
        details: Option<&IncomingDetails>,
        moves: Option<&MovesTable>,
        config: &EngineConfig,
    ) -> String {
        match details {
            Some(IncomingDetails::Delete(d)) => {
                let mut text = if d.is_reverse_of_addition() {
                    format!(
                        "reverses the addition of '{}' in r{}",
                        d.repos_relpath, d.added_rev
                    )
                } else {
                    format!("deletes '{}' in r{}", d.repos_relpath, d.deleted_rev)
                };
                if let (Some(mv_idx), Some(table)) = (d.mv, moves) {
                    text = Self::append_moved_to_chain(text, mv_idx, table, config);
                }
                text
            }
            Some(IncomingDetails::Add(d)) => {
                let mut text = format!("adds '{}' in r{}", d.repos_relpath, d.added_rev);
                if d.deleted_rev.is_valid() {
                    text.push_str(&format!(", later deleted in r{}", d.deleted_rev));
                }
                if let (Some(mv_idx), Some(table)) = (d.mv, moves) {
                    text = Self::append_moved_to_chain(text, mv_idx, table, config);
                }
                text
            }
            Some(IncomingDetails::Edit(d)) => Self::describe_edits(&d.edits, config),
            None => Self::describe_generic(conflict.get_incoming_change(), conflict.get_local_change()),
        }
    }

    pub fn describe_local(
        conflict: &Conflict,
        details: Option<&LocalDetails>,
        moves: Option<&MovesTable>,
        config: &EngineConfig,
    ) -> String {
        match details {
            Some(LocalDetails::Missing(d)) => {
                let mut text = format!("was deleted locally in r{}", d.deleted_rev);
                if let (Some(mv_idx), Some(table)) = (d.mv, moves) {
                    text = Self::append_moved_to_chain(text, mv_idx, table, config);
                }
                text
            }
            None => match conflict.get_local_change() {
                Some(ConflictReason::Edited) => "has local modifications".to_string(),
                Some(ConflictReason::Obstructed) => "is obstructed by an unversioned item".to_string(),
                Some(ConflictReason::Deleted) => "was deleted locally".to_string(),
                Some(ConflictReason::Missing) => "is missing locally".to_string(),
                Some(ConflictReason::Unversioned) => "is unversioned locally".to_string(),
                Some(ConflictReason::Added) => "was added locally".to_string(),
                Some(ConflictReason::Replaced) => "was replaced locally".to_string(),
                Some(ConflictReason::MovedAway) => "was moved away locally".to_string(),
                Some(ConflictReason::MovedHere) => "was moved here locally".to_string(),
                None => "is in an unknown local state".to_string(),
            },
        }
    }

    fn describe_generic(
        action: Option<ConflictAction>,
        reason: Option<ConflictReason>,
    ) -> String {
        match (action, reason) {
            (Some(ConflictAction::Edit), _) => "edits this item".to_string(),
            (Some(ConflictAction::Add), _) => "adds this item".to_string(),
            (Some(ConflictAction::Delete), _) => "deletes this item".to_string(),
            (Some(ConflictAction::Replace), _) => "replaces this item".to_string(),
            (None, _) => "changes this item".to_string(),
        }
    }

    /// Append a description of the move chain starting at `mv_idx` to
    /// `base`, bounded by `config.max_chain_depth` (the same bound
    /// `MovesTable::next_chain` applies, so the two never disagree about
    /// how far is too far).
    pub fn append_moved_to_chain(
        base: String,
        mv_idx: crate::moves::MoveIndex,
        table: &MovesTable,
        config: &EngineConfig,
    ) -> String {
        let head = table.get(mv_idx);
        let mut text = format!("{base}, moved to '{}'", head.moved_to_repos_relpath);
        let chain = table.next_chain(mv_idx, config.max_chain_depth);
        for idx in chain {
            let mv = table.get(idx);
            text.push_str(&format!(", then to '{}' in r{}", mv.moved_to_repos_relpath, mv.rev));
        }
        text
    }

    /// Render a modifying-revisions list, eliding the middle of a long
    /// history per spec §8 Testable Property 9: first 4 entries, an
    /// omission marker naming how many were skipped, then the last 4.
    fn describe_edits(edits: &[crate::details::IncomingEditRecord], _config: &EngineConfig) -> String {
        if edits.is_empty() {
            return "was edited upstream".to_string();
        }

        let revs: Vec<String> = if edits.len() <= 8 {
            edits.iter().map(|e| format!("r{}", e.rev)).collect()
        } else {
            let mut out: Vec<String> = edits[..4].iter().map(|e| format!("r{}", e.rev)).collect();
            out.push(format!("[{} revisions omitted for brevity]", edits.len() - 8));
            out.extend(edits[edits.len() - 4..].iter().map(|e| format!("r{}", e.rev)));
            out
        };

        format!("was edited upstream in {}", revs.join(", "))
    }
}
