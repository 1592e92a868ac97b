//! Resolution options: the stable [`OptionId`] vocabulary and the
//! [`OptionRegistry`] that enumerates which ids apply to a given conflict.

use crate::conflict::{Conflict, ConflictAction, ConflictKind, ConflictReason, Operation};
use crate::types::NodeKind;

/// Stable identifier for a resolution choice. Discriminants are part of the
/// public contract — an embedder may persist one (e.g. in a non-interactive
/// batch-resolve script) and expect it to mean the same thing across
/// versions of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OptionId {
    Undefined = 0,
    Unspecified = 1,
    Postpone = 2,

    // Text/property options.
    BaseText = 3,
    IncomingText = 4,
    WorkingText = 5,
    IncomingTextWhereConflicted = 6,
    WorkingTextWhereConflicted = 7,
    MergedText = 8,

    // Tree options.
    AcceptCurrentWcState = 9,
    UpdateMoveDestination = 10,
    UpdateAnyMovedAwayChildren = 11,
    IncomingDeleteIgnore = 12,
    IncomingDeleteAccept = 13,
    MergeIncomingAddIgnore = 14,
    MergeIncomingAddedFileTextMerge = 15,
    MergeIncomingAddedFileReplace = 16,
    MergeIncomingAddedFileReplaceAndMerge = 17,
    MergeIncomingAddedDirMerge = 18,
    MergeIncomingAddedDirReplace = 19,
    MergeIncomingAddedDirReplaceAndMerge = 20,
}

// Two ids were renamed after this vocabulary's first release:
// `working_text_where_conflicted`, used against a *tree* conflict, maps to
// `update_move_destination` (if local=moved_away) or
// `update_any_moved_away_children` (if local ∈ {deleted,replaced} ∧
// incoming=edit ∧ victim=dir); `merged_text` maps to `accept_current_wc_state`.
// Applied in `resolvers::resolve_tree_by_id`, which has the conflict in hand,
// rather than as a free function here.

/// A resolution choice offered for one conflict, as returned by
/// `{text,prop,tree}_get_resolution_options`.
#[derive(Debug, Clone)]
pub struct Option {
    pub id: OptionId,
    pub description: String,
}

impl Option {
    fn new(id: OptionId, description: &str) -> Self {
        Option {
            id,
            description: description.to_string(),
        }
    }
}

/// Pure functions enumerating the options applicable to a conflict, keyed
/// off its recorded operation/action/reason/kind — no repository or
/// working-copy access needed, matching the corresponding lookup table in
/// the original engine's `svn_client_conflict_text_get_resolution_options`
/// family.
pub struct OptionRegistry;

impl OptionRegistry {
    pub fn text_options(conflict: &Conflict) -> Vec<Option> {
        let mut opts = vec![Option::new(OptionId::Postpone, "postpone - resolve the conflict later")];

        opts.push(Option::new(OptionId::BaseText, "base-text - accept the common ancestor"));
        opts.push(Option::new(OptionId::IncomingText, "incoming-text - discard local changes"));
        opts.push(Option::new(OptionId::WorkingText, "working-text - discard incoming changes"));

        if !conflict.is_binary() {
            opts.push(Option::new(
                OptionId::IncomingTextWhereConflicted,
                "incoming-text-where-conflicted - prefer incoming text in conflicting sections",
            ));
            opts.push(Option::new(
                OptionId::WorkingTextWhereConflicted,
                "working-text-where-conflicted - prefer working text in conflicting sections",
            ));
        }

        opts.push(Option::new(OptionId::MergedText, "merged-text - accept the already-merged working file"));
        opts
    }

    pub fn prop_options(_conflict: &Conflict, _name: &str) -> Vec<Option> {
        vec![
            Option::new(OptionId::Postpone, "postpone - resolve the conflict later"),
            Option::new(OptionId::BaseText, "base-text - accept the common ancestor value"),
            Option::new(OptionId::IncomingText, "incoming-text - accept the incoming value"),
            Option::new(OptionId::WorkingText, "working-text - keep the working value"),
            Option::new(
                OptionId::IncomingTextWhereConflicted,
                "incoming-text-where-conflicted - prefer incoming value",
            ),
            Option::new(
                OptionId::WorkingTextWhereConflicted,
                "working-text-where-conflicted - prefer working value",
            ),
            Option::new(OptionId::MergedText, "merged-text - accept the already-merged value"),
        ]
    }

    /// The (operation, incoming_action, local_reason, victim_kind,
    /// incoming_kind) dispatch table from spec §4.7. `postpone` and
    /// `accept_current_wc_state` are unconditional; everything else is
    /// added per matching row.
    pub fn tree_options(conflict: &Conflict) -> Vec<Option> {
        let Some(desc) = conflict.tree_desc() else {
            return vec![];
        };
        let op = desc.operation;
        let victim_kind = desc.victim_node_kind;
        let incoming_kind = desc.src_right_version.as_ref().map_or(NodeKind::Unknown, |v| v.node_kind);

        let mut opts = vec![
            Option::new(OptionId::Postpone, "postpone - resolve the conflict later"),
            Option::new(OptionId::AcceptCurrentWcState, "accept-current-wc-state - mark resolved as-is"),
        ];

        let is_update_or_switch = matches!(op, Operation::Update | Operation::Switch);

        if is_update_or_switch && desc.action == ConflictAction::Edit && desc.reason == ConflictReason::MovedAway {
            opts.push(Option::new(
                OptionId::UpdateMoveDestination,
                "update-move-destination - carry the incoming edit to the move destination",
            ));
        }

        if is_update_or_switch
            && desc.action == ConflictAction::Edit
            && matches!(desc.reason, ConflictReason::Deleted | ConflictReason::Replaced)
            && victim_kind == NodeKind::Dir
        {
            opts.push(Option::new(
                OptionId::UpdateAnyMovedAwayChildren,
                "update-any-moved-away-children - update any children moved away under this node",
            ));
        }

        if op == Operation::Merge && desc.action == ConflictAction::Add && desc.reason == ConflictReason::Obstructed {
            opts.push(Option::new(
                OptionId::MergeIncomingAddIgnore,
                "merge-incoming-add-ignore - ignore the incoming addition",
            ));

            if victim_kind == NodeKind::File && incoming_kind == NodeKind::File {
                opts.push(Option::new(
                    OptionId::MergeIncomingAddedFileTextMerge,
                    "merge-incoming-added-file-text-merge - merge the incoming file into the local one",
                ));
                opts.push(Option::new(
                    OptionId::MergeIncomingAddedFileReplace,
                    "merge-incoming-added-file-replace - replace the local node with the incoming file",
                ));
                opts.push(Option::new(
                    OptionId::MergeIncomingAddedFileReplaceAndMerge,
                    "merge-incoming-added-file-replace-and-merge - replace, then merge local content back in",
                ));
            }

            if victim_kind == NodeKind::Dir && incoming_kind == NodeKind::Dir {
                opts.push(Option::new(
                    OptionId::MergeIncomingAddedDirMerge,
                    "merge-incoming-added-dir-merge - merge the incoming directory into the local one",
                ));
                opts.push(Option::new(
                    OptionId::MergeIncomingAddedDirReplace,
                    "merge-incoming-added-dir-replace - replace the local node with the incoming directory",
                ));
                opts.push(Option::new(
                    OptionId::MergeIncomingAddedDirReplaceAndMerge,
                    "merge-incoming-added-dir-replace-and-merge - replace, then merge local content back in",
                ));
            }
        }

        if desc.action == ConflictAction::Delete {
            opts.push(Option::new(
                OptionId::IncomingDeleteIgnore,
                "incoming-delete-ignore - ignore the incoming deletion, keep local state",
            ));
            opts.push(Option::new(
                OptionId::IncomingDeleteAccept,
                "incoming-delete-accept - accept the incoming deletion",
            ));
        }

        opts
    }

    pub fn is_applicable(conflict: &Conflict, kind: ConflictKind, id: OptionId, prop_name: std::option::Option<&str>) -> bool {
        match kind {
            ConflictKind::Text => Self::text_options(conflict).iter().any(|o| o.id == id),
            ConflictKind::Property => prop_name
                .map(|n| Self::prop_options(conflict, n).iter().any(|o| o.id == id))
                .unwrap_or(false),
            ConflictKind::Tree => Self::tree_options(conflict).iter().any(|o| o.id == id),
        }
    }
}
