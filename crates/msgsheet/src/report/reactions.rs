use super::layout::ThreadLayout;
use super::{Diagnostics, ReportWarning};
use crate::models::Message;
use crate::sheet::RowId;

/// Fold the message's reactions onto its last row. Without a row every
/// reaction is dropped with a warning; reactions never move to another message.
pub fn apply_reactions(
    layout: &mut ThreadLayout,
    diagnostics: &mut Diagnostics,
    ordinal: u32,
    message: &Message,
    last_row: Option<RowId>,
) {
    let Some(row) = last_row else {
        for reaction in &message.reactions {
            diagnostics.stats.reactions_dropped += 1;
            diagnostics.warn(ReportWarning::OrphanReaction {
                ordinal,
                index: message.index,
                actor: reaction.actor.clone(),
                reaction: reaction.reaction.clone(),
            });
        }
        return;
    };

    for reaction in &message.reactions {
        if layout.append_reaction(row, &reaction.actor, &reaction.reaction) {
            diagnostics.warn(ReportWarning::UnlistedReactionActor {
                ordinal,
                index: message.index,
                actor: reaction.actor.clone(),
            });
        }
        diagnostics.stats.reactions_applied += 1;
    }
}
