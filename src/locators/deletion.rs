//! [`DeletionLocator`] — find the revision a node was deleted or replaced,
//! cross-linked to a matching server-side move if one was discovered along
//! the way.

use tracing::instrument;

use crate::error::Error;
use crate::moves::{MoveIndex, MoveScanner, MovesTable};
use crate::repo_session::{ChangeAction, RepoSession};
use crate::types::{NodeKind, RelPath, Rev};

/// The result of a successful [`DeletionLocator::locate`] call.
#[derive(Debug, Clone)]
pub struct DeletionLocation {
    pub deleted_rev: Rev,
    pub deleted_rev_author: Option<String>,
    pub replacing_node_kind: NodeKind,
    pub mv: Option<MoveIndex>,
}

pub struct DeletionLocator;

impl DeletionLocator {
    /// Locate the revision in which `parent_relpath/deleted_basename` was
    /// deleted or replaced within `start_rev..=end_rev` (`start_rev` is the
    /// newer endpoint — the walk proceeds newest-to-oldest).
    ///
    /// When `related` is supplied, a candidate deletion is only accepted if
    /// `related.0@related.1` shares a youngest common ancestor with the
    /// deleted node as it stood immediately before the deletion.
    ///
    /// `MoveScanner` runs over every revision walked so that, once a
    /// deletion revision is confirmed, any server-side move discovered in
    /// that revision whose source matches the deleted node is returned
    /// alongside it (with its `next` chain intact).
    #[instrument(skip(session), fields(parent = %parent_relpath, basename = %deleted_basename))]
    pub fn locate<S: RepoSession + ?Sized>(
        session: &mut S,
        deleted_basename: &str,
        parent_relpath: &RelPath,
        start_rev: Rev,
        end_rev: Rev,
        related: Option<(&RelPath, Rev)>,
    ) -> Result<Option<(DeletionLocation, MovesTable)>, Error> {
        let deleted_relpath = parent_relpath.join(deleted_basename);

        // First pass: buffer the log entries. Receivers can't safely
        // re-borrow `session` mutably from inside the closure `get_log`
        // invokes (it already holds `&mut self`), so move verification and
        // ancestry checks happen in a second pass below.
        let mut walked = Vec::new();
        session.get_log(
            std::slice::from_ref(parent_relpath),
            start_rev,
            end_rev,
            &["svn:author"],
            &mut |entry| {
                walked.push(entry.clone());
                Ok(())
            },
        )?;

        let mut scanner = MoveScanner::new(session);
        let mut found: Option<DeletionLocation> = None;

        for entry in &walked {
            scanner.scan_entry(entry)?;

            if found.is_some() {
                continue;
            }

            let Some(deleted_entry) = entry.changed_paths.iter().find(|cp| {
                cp.relpath == deleted_relpath
                    && matches!(cp.action, ChangeAction::Deleted | ChangeAction::Replaced)
            }) else {
                continue;
            };

            if let Some((related_relpath, related_peg)) = related {
                let prior = Rev::new(entry.rev.get() - 1);
                let session = scanner_session(&mut scanner);
                let yca = session.get_youngest_common_ancestor(
                    (related_relpath, related_peg),
                    (&deleted_relpath, prior),
                )?;
                if yca.is_none() {
                    continue;
                }
            }

            let replacing_node_kind = if deleted_entry.action == ChangeAction::Replaced {
                deleted_entry.node_kind
            } else {
                NodeKind::None
            };

            found = Some(DeletionLocation {
                deleted_rev: entry.rev,
                deleted_rev_author: entry.author.clone(),
                replacing_node_kind,
                mv: None,
            });
        }

        let table = scanner.into_table();

        let Some(mut location) = found else {
            return Ok(None);
        };

        location.mv = table.find_move_from(location.deleted_rev, &deleted_relpath);

        Ok(Some((location, table)))
    }
}

/// `MoveScanner` doesn't expose its borrowed session directly (it owns the
/// borrow for the scanner's lifetime); this helper narrows the borrow just
/// long enough to make the one extra repository call
/// `locate` needs mid-walk.
fn scanner_session<'a, 'b, S: RepoSession + ?Sized>(
    scanner: &'b mut MoveScanner<'a, S>,
) -> &'b mut S {
    scanner.session_mut()
}
