//! Resolvers — executors for each [`crate::options::OptionId`].
//!
//! Every resolver funnels its working-copy mutation through
//! [`with_resolve_lock`], which owns the acquire/release/compose-errors/
//! sleep discipline described in spec §5 so individual resolvers only need
//! to express the mutation itself.

pub mod text;
pub mod tree;

use std::thread;

use tracing::instrument;

use crate::error::Error;
use crate::types::EngineConfig;
use crate::working_copy::WorkingCopy;

pub use text::{resolve_prop_by_id, resolve_text_by_id};
pub use tree::resolve_tree_by_id;

/// Acquire the write lock for `target_abspath`, run `body`, then release —
/// unconditionally, on every exit path of `body`. A release failure is
/// composed with whatever `body` returned rather than discarded. On overall
/// success, sleeps `config.timestamp_sleep` before returning so a
/// subsequent status check does not read a stale mtime.
#[instrument(skip(wc, body, config), fields(target = target_abspath))]
pub(crate) fn with_resolve_lock<W, F>(
    wc: &mut W,
    target_abspath: &str,
    config: &EngineConfig,
    body: F,
) -> Result<(), Error>
where
    W: WorkingCopy + ?Sized,
    F: FnOnce(&mut W) -> Result<(), Error>,
{
    let lock = wc.acquire_for_resolve(target_abspath)?;
    let result = body(wc);
    let release_result = wc.release(lock);

    match Error::compose(result.err(), release_result.err()) {
        Some(e) => Err(e),
        None => {
            thread::sleep(config.timestamp_sleep);
            Ok(())
        }
    }
}
