//! The engine's error type.
//!
//! [`Error`] is the single error type returned by every `RepoSession` and
//! `WorkingCopy` trait method and by every public entry point in this
//! crate. Unlike the original C engine's `svn_error_t` chain, this is a
//! closed `enum` — callers can match on the kind of failure instead of
//! inspecting an APR status code.

use crate::options::OptionId;
use thiserror::Error;

/// Errors produced by the tree-conflict engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A resolver's preconditions were not met, or the chosen option does
    /// not apply to this conflict. `expectation` names the concrete
    /// condition that was violated.
    #[error("conflict resolver failed for '{path}': {expectation}")]
    ResolverFailure { path: String, expectation: String },

    /// `resolve_by_id` was called with an id that `get_resolution_options`
    /// did not return for this conflict.
    #[error("option {id:?} is not applicable to this conflict")]
    OptionNotApplicable { id: OptionId },

    /// A `RepoSession` implementation reported a failure (RA layer, network,
    /// malformed server response).
    #[error("repository error: {0}")]
    Repo(String),

    /// A `WorkingCopy` implementation reported a failure (disk I/O, lock
    /// contention, corrupt metadata).
    #[error("working copy error: {0}")]
    WorkingCopy(String),

    /// Plain I/O failure surfaced while staging or fetching file content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Two errors occurred on the same call: the primary failure plus a
    /// failure composing cleanup (most commonly, a working-copy lock that
    /// would not release). Neither is discarded.
    #[error("{primary}\n(while handling the above, releasing the working copy lock also failed: {secondary})")]
    Composed {
        primary: Box<Error>,
        secondary: Box<Error>,
    },

}

/// Internal cancellation sentinel for log-walk receivers that want to stop
/// a walk early once they've found what they were looking for. Not a
/// variant of [`Error`] — carried inside `Error::Io` via
/// [`std::io::Error::new`] so a `RepoSession` implementation need only
/// treat it like any other receiver error (stop walking, propagate it), and
/// it never has to appear in an exhaustive match on the public enum. Every
/// locator that issues a walk for this purpose catches it with
/// [`Error::is_cancelled`] and turns it back into `Ok` before returning to
/// its own caller; it never reaches a public entry point of this crate.
#[derive(Debug)]
struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "log walk cancelled")
    }
}

impl std::error::Error for Cancelled {}

impl Error {
    /// Compose a primary error with a secondary one encountered while
    /// unwinding (typically a lock-release failure). If there was no
    /// primary error, the secondary becomes the result.
    pub fn compose(primary: Option<Error>, secondary: Option<Error>) -> Option<Error> {
        match (primary, secondary) {
            (Some(p), Some(s)) => Some(Error::Composed {
                primary: Box::new(p),
                secondary: Box::new(s),
            }),
            (Some(p), None) => Some(p),
            (None, Some(s)) => Some(s),
            (None, None) => None,
        }
    }

    pub fn resolver_failure(path: impl Into<String>, expectation: impl Into<String>) -> Error {
        Error::ResolverFailure {
            path: path.into(),
            expectation: expectation.into(),
        }
    }

    /// Build the cancellation sentinel as an [`Error`] value, for a
    /// receiver closure that must return `Result<(), Error>`.
    pub(crate) fn cancelled() -> Error {
        Error::Io(std::io::Error::new(std::io::ErrorKind::Other, Cancelled))
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        match self {
            Error::Io(e) => e.get_ref().is_some_and(|inner| inner.is::<Cancelled>()),
            _ => false,
        }
    }
}
