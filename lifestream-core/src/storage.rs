use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::batch::{assign, Assignment};
use crate::dedup::{is_new, DedupKey};
use crate::error::StoreError;
use crate::ledger::TimelineLedger;
use crate::model::{Account, AccountId, ActivityId, HighWaterMark, NormalizedActivity};
use crate::projection::{project, EntryView, TimelineQuery};

pub const STORE_FILE_NAME: &str = "timeline_store.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Same account, natural key and timestamp already stored; nothing changed.
    Existing,
    Created {
        activity: ActivityId,
        assignment: Assignment,
    },
}

/// Activities and timeline entries shared by all fetch tasks of a run.
///
/// Every mutation and the rewrite of the backing file that follows it happen
/// under one write lock, so concurrent runs for different accounts can neither
/// interleave a dedup check with another account's insert nor race on the
/// temp file.
#[derive(Debug, Clone)]
pub struct TimelineStore {
    inner: Arc<RwLock<TimelineLedger>>,
    path: Option<PathBuf>,
}

impl TimelineStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TimelineLedger::new())),
            path: None,
        }
    }

    /// Load the store from `path`, falling back to the temp file left by an
    /// interrupted write when the main file is missing or corrupt.
    pub async fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut ledger = match read_ledger(&path).await {
            Some(ledger) => ledger,
            None => {
                let tmp = tmp_path(&path);
                match read_ledger(&tmp).await {
                    Some(ledger) => {
                        warn!(path = %path.display(), "timeline store unreadable, recovered from temp file");
                        ledger
                    }
                    None => TimelineLedger::new(),
                }
            }
        };
        ledger.reindex();
        debug!(
            path = %path.display(),
            activities = ledger.activity_count(),
            entries = ledger.entry_count(),
            "timeline store loaded"
        );
        Self {
            inner: Arc::new(RwLock::new(ledger)),
            path: Some(path),
        }
    }

    pub async fn is_new(
        &self,
        account_id: &AccountId,
        natural_key: &str,
        published: DateTime<Utc>,
    ) -> bool {
        let inner = self.inner.read().await;
        is_new(&inner, account_id, natural_key, published)
    }

    /// Dedup, store and batch one fetched record.
    pub async fn ingest(
        &self,
        account: &Account,
        record: NormalizedActivity,
    ) -> Result<IngestOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let key = DedupKey::new(&account.id, &record.natural_key, record.published);
        if inner.contains(&key) {
            debug!(account = %account.id, key = %key.natural_key, "activity already stored");
            return Ok(IngestOutcome::Existing);
        }

        let activity = inner.insert_activity(&account.id, record);
        let assigned = assign(&mut inner, &account.policy(), activity);

        // The activity is kept even if assignment failed; the next run heals it.
        self.persist(&inner).await?;
        Ok(IngestOutcome::Created {
            activity,
            assignment: assigned?,
        })
    }

    /// Run one stored activity through the batch assigner again.
    pub async fn reassign(
        &self,
        account: &Account,
        activity: ActivityId,
    ) -> Result<Assignment, StoreError> {
        let mut inner = self.inner.write().await;
        let assignment = assign(&mut inner, &account.policy(), activity)?;
        self.persist(&inner).await?;
        Ok(assignment)
    }

    /// Retry assignment for activities a previous run left without an entry.
    /// Returns how many of them now have one.
    pub async fn heal_orphans(&self, account: &Account) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let orphans = inner.orphans(&account.id);
        if orphans.is_empty() {
            return Ok(0);
        }

        let policy = account.policy();
        let mut healed = 0;
        for activity in &orphans {
            match assign(&mut inner, &policy, *activity) {
                Ok(assignment) if assignment.entry().is_some() => healed += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(account = %account.id, activity = %activity, error = %e, "failed to reassign activity");
                }
            }
        }

        info!(account = %account.id, orphans = orphans.len(), healed, "retried unassigned activities");
        self.persist(&inner).await?;
        Ok(healed)
    }

    pub async fn high_water_mark(&self, account_id: &AccountId) -> Option<HighWaterMark> {
        self.inner.read().await.high_water_mark(account_id)
    }

    pub async fn timeline(&self, query: &TimelineQuery) -> Vec<EntryView> {
        let inner = self.inner.read().await;
        project(&inner, query)
    }

    /// Copy of the current state, for inspection.
    pub async fn snapshot(&self) -> TimelineLedger {
        self.inner.read().await.clone()
    }

    /// Write `ledger` to disk. Callers hold the write guard across this call,
    /// so only one write and rename of the temp file is in flight at a time.
    async fn persist(&self, ledger: &TimelineLedger) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            debug!("timeline store is in-memory only; skipping persist");
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(ledger)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

async fn read_ledger(path: &Path) -> Option<TimelineLedger> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice::<TimelineLedger>(&bytes) {
        Ok(ledger) => Some(ledger),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to parse timeline store");
            None
        }
    }
}
