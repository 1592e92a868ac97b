//! [`EditLocator`] — collect the list of modifying revisions for a node
//! within a revision range, following the node backwards through a copy if
//! its history includes one.

use tracing::instrument;

use crate::details::{IncomingEditDetails, IncomingEditRecord};
use crate::error::Error;
use crate::repo_session::{ChangeAction, RepoSession};
use crate::types::{NodeKind, RelPath, Rev, Tristate};

pub struct EditLocator;

impl EditLocator {
    #[instrument(skip(session), fields(relpath = %relpath))]
    pub fn locate<S: RepoSession + ?Sized>(
        session: &mut S,
        relpath: &RelPath,
        node_kind: NodeKind,
        rev_a: Rev,
        rev_b: Rev,
    ) -> Result<IncomingEditDetails, Error> {
        let (start, end) = if rev_a.get() <= rev_b.get() {
            (rev_b, rev_a)
        } else {
            (rev_a, rev_b)
        };

        let mut walked = Vec::new();
        session.get_log(
            std::slice::from_ref(relpath),
            start,
            end,
            &["svn:author"],
            &mut |entry| {
                walked.push(entry.clone());
                Ok(())
            },
        )?;

        let mut active = relpath.clone();
        let mut records = Vec::new();

        for entry in &walked {
            let direct = entry.changed_paths.iter().find(|cp| cp.relpath == active);
            let direct_modifies =
                direct.is_some_and(|cp| matches!(cp.action, ChangeAction::Modified | ChangeAction::Added));
            // A directory's own path is rarely touched by a commit under it —
            // committing inside a subdirectory doesn't mark the parent 'M' —
            // so a descendant changing is itself enough to produce a record
            // for this revision, not just a direct hit on `active`.
            let has_descendant_change = node_kind == NodeKind::Dir
                && entry.changed_paths.iter().any(|cp| cp.relpath.is_descendant_of(&active));

            if direct_modifies || has_descendant_change {
                records.push(IncomingEditRecord {
                    rev: entry.rev,
                    author: entry.author.clone(),
                    text_modified: if direct_modifies { Tristate::Unknown } else { Tristate::False },
                    props_modified: Tristate::Unknown,
                    children_modified: if node_kind == NodeKind::Dir {
                        if has_descendant_change { Tristate::True } else { Tristate::False }
                    } else {
                        Tristate::Unknown
                    },
                    repos_relpath: active.clone(),
                });
            }

            if let Some(cp) = direct {
                if let Some(copyfrom) = &cp.copyfrom {
                    // The active path shifts backwards across a copy so
                    // earlier iterations (older revisions) keep tracing the
                    // node's real history.
                    active = copyfrom.relpath.clone();
                }
            }
        }

        records.reverse(); // ascending revision order, per spec §3.
        Ok(IncomingEditDetails { edits: records })
    }
}
