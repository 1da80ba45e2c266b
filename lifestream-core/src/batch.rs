use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::TimelineError;
use crate::ledger::TimelineLedger;
use crate::model::{ActivityId, BatchPolicy, EntryId};
use crate::span::{span_without, update_span};

/// Result of running one activity through the batch assigner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// A new entry was created for the activity.
    Created(EntryId),
    /// The activity joined an existing entry.
    Joined(EntryId),
    /// The activity was already on the entry it belongs to.
    Unchanged(EntryId),
    /// More than one entry matched. Nothing was changed and the activity
    /// keeps whatever assignment it had before, possibly none.
    Ambiguous(Vec<EntryId>),
}

impl Assignment {
    pub fn entry(&self) -> Option<EntryId> {
        match self {
            Assignment::Created(id) | Assignment::Joined(id) | Assignment::Unchanged(id) => {
                Some(*id)
            }
            Assignment::Ambiguous(_) => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Assignment::Ambiguous(_))
    }
}

enum Target {
    New,
    Existing(EntryId),
}

/// Attach `activity` to the timeline entry it belongs to under `policy`.
///
/// With batching off every activity gets an entry of its own. With batching
/// on, a candidate entry must share the activity's account and content kind
/// and its whole span must lie inside `[published - window, published + window]`.
/// When the activity is already attached somewhere, its current entry is
/// judged by the span it would have without the activity, and an entry it
/// leaves behind empty is deleted.
pub fn assign(
    ledger: &mut TimelineLedger,
    policy: &BatchPolicy,
    activity: ActivityId,
) -> Result<Assignment, TimelineError> {
    let record = ledger.activity(activity)?;
    let account_id = record.account_id.clone();
    let kind = record.kind();
    let published = record.published;
    let current = record.entry;

    let target = if !policy.batching {
        match current {
            Some(entry) if ledger.member_count(entry) == 1 => {
                return Ok(Assignment::Unchanged(entry));
            }
            _ => Target::New,
        }
    } else {
        let lo = published
            .checked_sub_signed(policy.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let hi = published
            .checked_add_signed(policy.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let view: &TimelineLedger = ledger;
        let candidates: Vec<EntryId> = view
            .entries_for(&account_id, kind)
            .filter_map(|entry| {
                let span = if Some(entry.id) == current {
                    span_without(view, entry.id, activity)?
                } else {
                    entry.span()
                };
                span.within(lo, hi).then_some(entry.id)
            })
            .collect();

        match candidates.as_slice() {
            // Alone in its entry with nothing else in reach: stay put.
            [] => match current {
                Some(entry) if ledger.member_count(entry) == 1 => Target::Existing(entry),
                _ => Target::New,
            },
            [only] => Target::Existing(*only),
            _ => {
                warn!(
                    activity = %activity,
                    account = %account_id,
                    candidates = ?candidates,
                    "ambiguous batch match, leaving activity unassigned"
                );
                return Ok(Assignment::Ambiguous(candidates));
            }
        }
    };

    match target {
        Target::Existing(entry) if Some(entry) == current => {
            update_span(ledger, entry)?;
            Ok(Assignment::Unchanged(entry))
        }
        Target::Existing(entry) => {
            move_to(ledger, activity, entry)?;
            debug!(activity = %activity, entry = %entry, "joined existing batch");
            Ok(Assignment::Joined(entry))
        }
        Target::New => {
            let entry = ledger.create_entry(&account_id, kind, published);
            move_to(ledger, activity, entry)?;
            debug!(activity = %activity, entry = %entry, "started new batch");
            Ok(Assignment::Created(entry))
        }
    }
}

fn move_to(
    ledger: &mut TimelineLedger,
    activity: ActivityId,
    target: EntryId,
) -> Result<(), TimelineError> {
    let previous = ledger.attach(activity, target)?;
    update_span(ledger, target)?;

    if let Some(old) = previous.filter(|old| *old != target) {
        if ledger.member_count(old) == 0 {
            ledger.remove_entry(old)?;
            debug!(entry = %old, "removed emptied batch");
        } else {
            update_span(ledger, old)?;
        }
    }
    Ok(())
}
