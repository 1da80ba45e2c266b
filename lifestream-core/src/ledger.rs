use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::DedupKey;
use crate::error::TimelineError;
use crate::model::{
    AccountId, Activity, ActivityId, ContentKind, EntryId, HighWaterMark, NormalizedActivity,
    TimelineEntry,
};

/// All activities and timeline entries, plus the indexes derived from them.
///
/// The `Activity::entry` edge is the single source of truth for membership;
/// the member and dedup indexes are rebuilt from it after deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineLedger {
    next_activity_id: u64,
    next_entry_id: u64,
    activities: BTreeMap<ActivityId, Activity>,
    entries: BTreeMap<EntryId, TimelineEntry>,
    #[serde(skip)]
    seen: HashSet<DedupKey>,
    #[serde(skip)]
    members: HashMap<EntryId, BTreeSet<ActivityId>>,
}

impl TimelineLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the derived indexes. Must run after loading from disk.
    pub fn reindex(&mut self) {
        self.seen = self.activities.values().map(DedupKey::of).collect();
        self.members.clear();
        for activity in self.activities.values() {
            if let Some(entry) = activity.entry {
                self.members.entry(entry).or_default().insert(activity.id);
            }
        }
        let max_activity = self.activities.keys().next_back().map_or(0, |id| id.0 + 1);
        let max_entry = self.entries.keys().next_back().map_or(0, |id| id.0 + 1);
        self.next_activity_id = self.next_activity_id.max(max_activity);
        self.next_entry_id = self.next_entry_id.max(max_entry);
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    pub fn activity(&self, id: ActivityId) -> Result<&Activity, TimelineError> {
        self.activities
            .get(&id)
            .ok_or(TimelineError::UnknownActivity(id))
    }

    pub fn entry(&self, id: EntryId) -> Result<&TimelineEntry, TimelineError> {
        self.entries.get(&id).ok_or(TimelineError::UnknownEntry(id))
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> Result<&mut TimelineEntry, TimelineError> {
        self.entries
            .get_mut(&id)
            .ok_or(TimelineError::UnknownEntry(id))
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.values()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Store a freshly fetched record as an unassigned activity.
    pub fn insert_activity(
        &mut self,
        account_id: &AccountId,
        record: NormalizedActivity,
    ) -> ActivityId {
        let id = ActivityId(self.next_activity_id);
        self.next_activity_id += 1;
        let activity = Activity {
            id,
            account_id: account_id.clone(),
            natural_key: record.natural_key,
            published: record.published,
            title: record.title,
            link: record.link,
            content: record.content,
            entry: None,
        };
        self.seen.insert(DedupKey::of(&activity));
        self.activities.insert(id, activity);
        id
    }

    /// Create an empty entry with a point span at `at`. The caller attaches
    /// a member immediately after; an entry is never left without one.
    pub fn create_entry(
        &mut self,
        account_id: &AccountId,
        content_kind: ContentKind,
        at: DateTime<Utc>,
    ) -> EntryId {
        let id = EntryId(self.next_entry_id);
        self.next_entry_id += 1;
        self.entries.insert(
            id,
            TimelineEntry {
                id,
                account_id: account_id.clone(),
                content_kind,
                span_start: at,
                span_end: at,
            },
        );
        id
    }

    pub fn remove_entry(&mut self, id: EntryId) -> Result<TimelineEntry, TimelineError> {
        if self.member_count(id) > 0 {
            return Err(TimelineError::EntryInUse(id));
        }
        self.members.remove(&id);
        self.entries
            .remove(&id)
            .ok_or(TimelineError::UnknownEntry(id))
    }

    /// Point `activity` at `entry`, returning the entry it was attached to before.
    pub fn attach(
        &mut self,
        activity: ActivityId,
        entry: EntryId,
    ) -> Result<Option<EntryId>, TimelineError> {
        if !self.entries.contains_key(&entry) {
            return Err(TimelineError::UnknownEntry(entry));
        }
        let record = self
            .activities
            .get_mut(&activity)
            .ok_or(TimelineError::UnknownActivity(activity))?;
        let previous = record.entry.replace(entry);
        if let Some(old) = previous {
            if let Some(set) = self.members.get_mut(&old) {
                set.remove(&activity);
            }
        }
        self.members.entry(entry).or_default().insert(activity);
        Ok(previous)
    }

    pub fn member_ids(&self, entry: EntryId) -> impl Iterator<Item = ActivityId> + '_ {
        self.members
            .get(&entry)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn members(&self, entry: EntryId) -> impl Iterator<Item = &Activity> + '_ {
        self.member_ids(entry)
            .filter_map(move |id| self.activities.get(&id))
    }

    pub fn member_count(&self, entry: EntryId) -> usize {
        self.members.get(&entry).map_or(0, BTreeSet::len)
    }

    /// Entries that a new activity of this account and kind could join.
    pub fn entries_for<'a>(
        &'a self,
        account_id: &'a AccountId,
        kind: ContentKind,
    ) -> impl Iterator<Item = &'a TimelineEntry> + 'a {
        self.entries
            .values()
            .filter(move |e| &e.account_id == account_id && e.content_kind == kind)
    }

    /// Activities of the account that are not attached to any entry, oldest first.
    pub fn orphans(&self, account_id: &AccountId) -> Vec<ActivityId> {
        let mut orphans: Vec<&Activity> = self
            .activities
            .values()
            .filter(|a| &a.account_id == account_id && a.entry.is_none())
            .collect();
        orphans.sort_by(|a, b| a.published.cmp(&b.published).then(a.id.cmp(&b.id)));
        orphans.into_iter().map(|a| a.id).collect()
    }

    pub fn high_water_mark(&self, account_id: &AccountId) -> Option<HighWaterMark> {
        self.activities
            .values()
            .filter(|a| &a.account_id == account_id)
            .max_by(|a, b| a.published.cmp(&b.published).then(a.id.cmp(&b.id)))
            .map(|a| HighWaterMark {
                published: a.published,
                natural_key: a.natural_key.clone(),
            })
    }
}
