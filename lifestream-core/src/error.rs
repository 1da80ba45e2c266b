use thiserror::Error;

use crate::model::{ActivityId, EntryId};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("response parsing error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("service returned an error: {0}")]
    Api(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("unknown activity {0}")]
    UnknownActivity(ActivityId),
    #[error("unknown timeline entry {0}")]
    UnknownEntry(EntryId),
    #[error("timeline entry {0} has no members")]
    EmptyEntry(EntryId),
    #[error("timeline entry {0} still has members")]
    EntryInUse(EntryId),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown service kind \"{0}\"")]
    UnknownService(String),
    #[error("account \"{0}\" is configured more than once")]
    DuplicateAccount(String),
    #[error("batch window of {0} minutes is out of range")]
    InvalidBatchWindow(i64),
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}
