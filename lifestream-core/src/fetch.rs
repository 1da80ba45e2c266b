use std::fmt;
use std::time::Duration;

use futures_util::future::join_all;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::FetchSettings;
use crate::error::FetchError;
use crate::model::{Account, AccountId, HighWaterMark, ServiceKind};
use crate::service::{AdapterRegistry, FetchedBatch};
use crate::storage::{IngestOutcome, TimelineStore};

#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    pub request_timeout: Duration,
    pub max_retries: u8,
    pub retry_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&FetchSettings::default())
    }
}

impl From<&FetchSettings> for FetchConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            request_timeout: settings.request_timeout(),
            max_retries: settings.retry_attempts,
            retry_backoff_ms: settings.retry_backoff_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Synced,
    SkippedInactive,
    SkippedMissingCredential(&'static str),
    AdapterFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub account: AccountId,
    pub service: ServiceKind,
    pub status: AccountStatus,
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
}

impl AccountSummary {
    fn new(account: &Account, status: AccountStatus) -> Self {
        Self {
            account: account.id.clone(),
            service: account.service,
            status,
            created: 0,
            existing: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub accounts: Vec<AccountSummary>,
}

impl RunSummary {
    pub fn created(&self) -> usize {
        self.accounts.iter().map(|a| a.created).sum()
    }

    pub fn existing(&self) -> usize {
        self.accounts.iter().map(|a| a.existing).sum()
    }

    pub fn failed(&self) -> usize {
        self.accounts.iter().map(|a| a.failed).sum()
    }

    pub fn failed_accounts(&self) -> usize {
        self.accounts
            .iter()
            .filter(|a| matches!(a.status, AccountStatus::AdapterFailed(_)))
            .count()
    }

    pub fn skipped_accounts(&self) -> usize {
        self.accounts
            .iter()
            .filter(|a| {
                matches!(
                    a.status,
                    AccountStatus::SkippedInactive | AccountStatus::SkippedMissingCredential(_)
                )
            })
            .count()
    }

    pub fn get(&self, account: &AccountId) -> Option<&AccountSummary> {
        self.accounts.iter().find(|a| &a.account == account)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} accounts ({} failed, {} skipped): {} new, {} existing, {} failed items",
            self.accounts.len(),
            self.failed_accounts(),
            self.skipped_accounts(),
            self.created(),
            self.existing(),
            self.failed()
        )
    }
}

/// Fetch every account once. Accounts run concurrently; a failing account
/// never stops the others.
///
/// Callers must not run two fetches for the same account at the same time.
pub async fn run_fetch(
    accounts: &[Account],
    registry: &AdapterRegistry,
    client: &Client,
    config: &FetchConfig,
    store: &TimelineStore,
) -> RunSummary {
    info!(accounts = accounts.len(), "commencing fetch");
    let tasks = accounts
        .iter()
        .map(|account| fetch_account(account, registry, client, config, store));
    let summary = RunSummary {
        accounts: join_all(tasks).await,
    };
    info!(%summary, "fetch complete");
    summary
}

pub async fn fetch_account(
    account: &Account,
    registry: &AdapterRegistry,
    client: &Client,
    config: &FetchConfig,
    store: &TimelineStore,
) -> AccountSummary {
    if !account.active {
        info!(account = %account.id, service = %account.service, "skipping inactive account");
        return AccountSummary::new(account, AccountStatus::SkippedInactive);
    }
    if let Some(missing) = account.missing_credential() {
        info!(account = %account.id, missing, "skipping account without credentials");
        return AccountSummary::new(account, AccountStatus::SkippedMissingCredential(missing));
    }

    info!(account = %account.id, service = %account.service, "fetching activity");
    let mut summary = AccountSummary::new(account, AccountStatus::Synced);

    if let Err(err) = store.heal_orphans(account).await {
        warn!(account = %account.id, error = %err, "failed to retry unassigned activities");
    }

    let since = store.high_water_mark(&account.id).await;
    let batch = match fetch_with_retry(registry, client, account, since.as_ref(), config).await {
        Ok(batch) => batch,
        Err(err) => {
            warn!(account = %account.id, error = %err, "failed to fetch account");
            summary.status = AccountStatus::AdapterFailed(err.to_string());
            return summary;
        }
    };

    summary.failed += batch.rejected;
    let mut records = batch.records;
    // Batching decisions depend on earlier items, so go oldest first.
    records.sort_by(|a, b| a.published.cmp(&b.published));

    for record in records {
        let key = record.natural_key.clone();
        match store.ingest(account, record).await {
            Ok(IngestOutcome::Existing) => summary.existing += 1,
            Ok(IngestOutcome::Created { assignment, .. }) if assignment.is_ambiguous() => {
                summary.failed += 1;
            }
            Ok(IngestOutcome::Created { activity, assignment }) => {
                debug!(account = %account.id, %activity, ?assignment, "stored activity");
                summary.created += 1;
            }
            Err(err) => {
                warn!(account = %account.id, %key, error = %err, "failed to store activity");
                summary.failed += 1;
            }
        }
    }

    info!(
        account = %account.id,
        service = %account.service,
        created = summary.created,
        existing = summary.existing,
        failed = summary.failed,
        "account synced"
    );
    summary
}

async fn fetch_with_retry(
    registry: &AdapterRegistry,
    client: &Client,
    account: &Account,
    since: Option<&HighWaterMark>,
    config: &FetchConfig,
) -> Result<FetchedBatch, FetchError> {
    let attempts = config.max_retries.max(1);
    let mut attempt: u8 = 1;
    loop {
        let result = match tokio::time::timeout(
            config.request_timeout,
            registry.fetch(client, account, since),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(config.request_timeout)),
        };

        match result {
            Ok(batch) => return Ok(batch),
            // A malformed response will not get better on retry.
            Err(err @ (FetchError::Parse(_) | FetchError::Url(_))) => return Err(err),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                let backoff = config.retry_backoff_ms.saturating_mul(u64::from(attempt));
                debug!(account = %account.id, attempt, backoff_ms = backoff, error = %err, "retrying fetch");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
        }
    }
}
