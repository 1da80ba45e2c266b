use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_BATCH_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Twitter,
    Delicious,
    Flickr,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Twitter => "twitter",
            ServiceKind::Delicious => "delicious",
            ServiceKind::Flickr => "flickr",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "twitter" => Ok(ServiceKind::Twitter),
            "delicious" => Ok(ServiceKind::Delicious),
            "flickr" => Ok(ServiceKind::Flickr),
            _ => Err(ConfigError::UnknownService(value.to_owned())),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub u64);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Credentials are opaque to the timeline; only adapters read them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Service-side user id (Flickr NSID). Looked up from the username when absent.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub persona: String,
    pub service: ServiceKind,
    pub username: String,
    pub credentials: Credentials,
    pub active: bool,
    pub batching: bool,
    pub batch_window: Duration,
}

impl Account {
    pub fn new(service: ServiceKind, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: AccountId(format!("{}:{}", service, username)),
            persona: String::new(),
            service,
            username,
            credentials: Credentials::default(),
            active: true,
            batching: false,
            batch_window: Duration::minutes(DEFAULT_BATCH_WINDOW_MINUTES),
        }
    }

    pub fn with_batching(mut self, window: Duration) -> Self {
        self.batching = true;
        self.batch_window = window;
        self
    }

    pub fn policy(&self) -> BatchPolicy {
        BatchPolicy {
            batching: self.batching,
            window: self.batch_window,
        }
    }

    /// Name of the first credential this account needs but lacks, if any.
    pub fn missing_credential(&self) -> Option<&'static str> {
        if self.username.trim().is_empty() {
            return Some("username");
        }
        let blank = |value: &Option<String>| value.as_deref().map_or(true, |v| v.trim().is_empty());
        match self.service {
            ServiceKind::Flickr if blank(&self.credentials.api_key) => Some("api_key"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub batching: bool,
    pub window: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batching: false,
            window: Duration::minutes(DEFAULT_BATCH_WINDOW_MINUTES),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    TwitterStatus,
    DeliciousLink,
    FlickrPhoto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityContent {
    TwitterStatus {
        status_id: u64,
    },
    DeliciousLink {
        #[serde(default)]
        description: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    FlickrPhoto {
        photo_id: String,
        square_thumb_link: Option<String>,
        image_500px_link: Option<String>,
        taken_on: Option<DateTime<Utc>>,
    },
}

impl ActivityContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            ActivityContent::TwitterStatus { .. } => ContentKind::TwitterStatus,
            ActivityContent::DeliciousLink { .. } => ContentKind::DeliciousLink,
            ActivityContent::FlickrPhoto { .. } => ContentKind::FlickrPhoto,
        }
    }
}

/// What an adapter hands to the pipeline for each fetched item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedActivity {
    pub natural_key: String,
    pub published: DateTime<Utc>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: ActivityContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub account_id: AccountId,
    pub natural_key: String,
    pub published: DateTime<Utc>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: ActivityContent,
    /// The timeline entry this activity is batched into; `None` while orphaned.
    pub entry: Option<EntryId>,
}

impl Activity {
    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub content_kind: ContentKind,
    pub span_start: DateTime<Utc>,
    pub span_end: DateTime<Utc>,
}

impl TimelineEntry {
    pub fn span(&self) -> Span {
        Span {
            start: self.span_start,
            end: self.span_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Span {
    pub fn point(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// True when the whole span lies inside `[lo, hi]`.
    pub fn within(&self, lo: DateTime<Utc>, hi: DateTime<Utc>) -> bool {
        self.start >= lo && self.end <= hi
    }
}

/// Latest stored activity of an account; adapters use it to ask only for newer items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighWaterMark {
    pub published: DateTime<Utc>,
    pub natural_key: String,
}
