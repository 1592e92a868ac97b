//! A tree-conflict analysis and resolution engine for a centralized
//! version-control working copy.
//!
//! The engine owns no network or filesystem code itself: repository access
//! is reached through [`RepoSession`](repo_session::RepoSession) and
//! working-copy access through [`WorkingCopy`](working_copy::WorkingCopy),
//! both supplied by the embedder. Given those two, this crate classifies a
//! recorded conflict, locates the repository history responsible for it,
//! describes it in prose, enumerates the resolutions that apply, and
//! carries out whichever one is chosen.

pub mod conflict;
pub mod description;
pub mod details;
pub mod error;
pub mod locators;
pub mod moves;
pub mod options;
pub mod repo_session;
pub mod resolvers;
pub mod types;
pub mod working_copy;

pub use conflict::{Conflict, ConflictAction, ConflictKind, ConflictReason, IncomingDetails, LocalDetails, Operation};
pub use error::Error;
pub use options::{Option as ResolutionOption, OptionId, OptionRegistry};
pub use repo_session::RepoSession;
pub use types::{EngineConfig, NodeKind, RelPath, Rev, Tristate};
pub use working_copy::WorkingCopy;
