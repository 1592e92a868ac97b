//! Text and property resolution: translate the chosen [`OptionId`] to the
//! legacy [`ConflictChoice`] and call the matching `WorkingCopy` primitive.

use tracing::{info, instrument};

use crate::conflict::Conflict;
use crate::error::Error;
use crate::options::OptionId;
use crate::types::EngineConfig;
use crate::working_copy::{ConflictChoice, WorkingCopy};

fn choice_for(id: OptionId) -> Result<ConflictChoice, Error> {
    match id {
        OptionId::BaseText => Ok(ConflictChoice::Base),
        OptionId::IncomingText | OptionId::IncomingTextWhereConflicted => Ok(ConflictChoice::TheirsFull),
        OptionId::WorkingText => Ok(ConflictChoice::MineFull),
        OptionId::WorkingTextWhereConflicted => Ok(ConflictChoice::MineConflict),
        OptionId::MergedText => Ok(ConflictChoice::Merged),
        other => Err(Error::OptionNotApplicable { id: other }),
    }
}

#[instrument(skip(conflict, wc, config))]
pub fn resolve_text_by_id<W: WorkingCopy + ?Sized>(
    conflict: &mut Conflict,
    wc: &mut W,
    id: OptionId,
    config: &EngineConfig,
) -> Result<(), Error> {
    if id == OptionId::Postpone {
        return Ok(());
    }
    if conflict.text_desc().is_none() {
        return Err(Error::resolver_failure(
            conflict.local_abspath(),
            "no text conflict is recorded at this path",
        ));
    }

    let choice = choice_for(id)?;
    let path = conflict.local_abspath().to_string();

    super::with_resolve_lock(wc, &path, config, |wc| wc.resolve_text_conflict(&path, choice))?;

    conflict.set_resolution_text(id);
    info!(target: "resolved_text", path = %path);
    Ok(())
}

/// Resolve the property conflict named `propname` to `id`; `propname ==
/// None` resolves every still-conflicted property to the same choice,
/// per spec §4.8's "all properties" bullet.
#[instrument(skip(conflict, wc, config))]
pub fn resolve_prop_by_id<W: WorkingCopy + ?Sized>(
    conflict: &mut Conflict,
    wc: &mut W,
    propname: Option<&str>,
    id: OptionId,
    config: &EngineConfig,
) -> Result<(), Error> {
    if id == OptionId::Postpone {
        return Ok(());
    }

    let choice = choice_for(id)?;
    let path = conflict.local_abspath().to_string();

    if let Some(name) = propname {
        if conflict.prop_desc(name).is_none() {
            return Err(Error::resolver_failure(
                &path,
                format!("no property conflict recorded for '{name}'"),
            ));
        }
        super::with_resolve_lock(wc, &path, config, |wc| wc.resolve_prop_conflict(&path, Some(name), choice))?;
        conflict.set_resolved_prop(name, id);
    } else {
        if conflict.prop_descs().is_empty() {
            return Err(Error::resolver_failure(&path, "no property conflicts are recorded at this path"));
        }
        super::with_resolve_lock(wc, &path, config, |wc| wc.resolve_prop_conflict(&path, None, choice))?;
        conflict.resolve_all_props(id);
    }

    info!(target: "resolved_prop", path = %path, ?propname);
    Ok(())
}
