//! The three Locators: components that turn a repository log/location
//! history into a detail record by driving [`crate::repo_session::RepoSession`].

mod addition;
mod deletion;
mod edit;

pub use addition::AdditionLocator;
pub use deletion::DeletionLocator;
pub use edit::EditLocator;
