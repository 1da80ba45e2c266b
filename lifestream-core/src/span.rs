use tracing::trace;

use crate::error::TimelineError;
use crate::ledger::TimelineLedger;
use crate::model::{Activity, ActivityId, EntryId, Span};

/// Smallest span covering every activity in `members`, or `None` if there are none.
pub fn span_of<'a>(members: impl IntoIterator<Item = &'a Activity>) -> Option<Span> {
    members.into_iter().fold(None, |acc: Option<Span>, activity| {
        let at = activity.published;
        Some(match acc {
            None => Span::point(at),
            Some(span) => Span {
                start: span.start.min(at),
                end: span.end.max(at),
            },
        })
    })
}

/// Span the entry would have if `excluded` were not one of its members.
pub fn span_without(
    ledger: &TimelineLedger,
    entry: EntryId,
    excluded: ActivityId,
) -> Option<Span> {
    span_of(ledger.members(entry).filter(|a| a.id != excluded))
}

/// Recompute `span_start`/`span_end` of `entry` from its current members.
///
/// Fails with [`TimelineError::EmptyEntry`] when the entry has no members;
/// empty entries are deleted by the batch assigner, never re-spanned.
pub fn update_span(ledger: &mut TimelineLedger, entry: EntryId) -> Result<Span, TimelineError> {
    let span = span_of(ledger.members(entry)).ok_or(TimelineError::EmptyEntry(entry))?;
    let record = ledger.entry_mut(entry)?;
    record.span_start = span.start;
    record.span_end = span.end;
    trace!(entry = %entry, start = %span.start, end = %span.end, "span updated");
    Ok(span)
}
