use chrono::{DateTime, Utc};

use crate::ledger::TimelineLedger;
use crate::model::{AccountId, Activity};

/// Natural identity of an activity: account, service key and publication time.
///
/// Services reuse ids across accounts, so the account is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub account_id: AccountId,
    pub natural_key: String,
    pub published: DateTime<Utc>,
}

impl DedupKey {
    pub fn new(account_id: &AccountId, natural_key: &str, published: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.clone(),
            natural_key: natural_key.to_owned(),
            published,
        }
    }

    pub fn of(activity: &Activity) -> Self {
        Self::new(&activity.account_id, &activity.natural_key, activity.published)
    }
}

/// True when no activity with this account, natural key and timestamp exists yet.
pub fn is_new(
    ledger: &TimelineLedger,
    account_id: &AccountId,
    natural_key: &str,
    published: DateTime<Utc>,
) -> bool {
    !ledger.contains(&DedupKey::new(account_id, natural_key, published))
}
