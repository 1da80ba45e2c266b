use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{get_bytes, FetchedBatch};
use crate::error::FetchError;
use crate::model::{Account, ActivityContent, HighWaterMark, NormalizedActivity, ServiceKind};

const PAGE_SIZE: &str = "200";
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Deserialize)]
struct Status {
    id: u64,
    #[serde(default)]
    text: String,
    created_at: String,
}

impl Status {
    fn normalize(&self, username: &str) -> Result<NormalizedActivity, String> {
        let published = DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT)
            .map_err(|e| format!("status {}: bad created_at {:?}: {}", self.id, self.created_at, e))?
            .with_timezone(&Utc);
        Ok(NormalizedActivity {
            natural_key: self.id.to_string(),
            published,
            title: Some(self.text.clone()),
            link: Some(format!("https://twitter.com/{}/status/{}", username, self.id)),
            content: ActivityContent::TwitterStatus { status_id: self.id },
        })
    }
}

#[derive(Debug, Clone)]
pub struct TwitterAdapter {
    base: Url,
}

impl TwitterAdapter {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// User timeline, restricted to statuses after the newest stored one.
    pub async fn fetch(
        &self,
        client: &Client,
        account: &Account,
        since: Option<&HighWaterMark>,
    ) -> Result<FetchedBatch, FetchError> {
        let url = self.base.join("1.1/statuses/user_timeline.json")?;
        let mut request = client
            .get(url)
            .query(&[("screen_name", account.username.as_str()), ("count", PAGE_SIZE)]);
        if let Some(mark) = since {
            request = request.query(&[("since_id", mark.natural_key.as_str())]);
        }
        if let Some(token) = account.credentials.api_key.as_deref() {
            request = request.bearer_auth(token);
        }

        let bytes = get_bytes(request).await?;
        let statuses: Vec<Status> = serde_json::from_slice(&bytes)?;

        let mut batch = FetchedBatch::default();
        for status in &statuses {
            batch.push(ServiceKind::Twitter, status.normalize(&account.username));
        }
        Ok(batch)
    }
}
