use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{get_bytes, FetchedBatch};
use crate::error::FetchError;
use crate::model::{Account, ActivityContent, HighWaterMark, NormalizedActivity, ServiceKind};

const PAGE_SIZE: &str = "100";

/// One bookmark of the public JSON feed.
#[derive(Debug, Deserialize)]
struct Post {
    #[serde(rename = "u")]
    url: String,
    #[serde(rename = "d", default)]
    title: String,
    #[serde(rename = "n", default)]
    notes: String,
    #[serde(rename = "dt")]
    saved_at: String,
    #[serde(rename = "t", default)]
    tags: Vec<String>,
}

impl Post {
    fn normalize(&self) -> Result<NormalizedActivity, String> {
        let published = DateTime::parse_from_rfc3339(&self.saved_at)
            .map_err(|e| format!("bookmark {}: bad dt {:?}: {}", self.url, self.saved_at, e))?
            .with_timezone(&Utc);
        Ok(NormalizedActivity {
            // The feed has no ids; the bookmarked url is the natural key.
            natural_key: self.url.clone(),
            published,
            title: Some(self.title.clone()),
            link: Some(self.url.clone()),
            content: ActivityContent::DeliciousLink {
                description: self.notes.clone(),
                tags: self.tags.clone(),
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeliciousAdapter {
    base: Url,
}

impl DeliciousAdapter {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Most recent bookmarks. The feed has no "since" filter; older items are
    /// weeded out by deduplication.
    pub async fn fetch(
        &self,
        client: &Client,
        account: &Account,
        _since: Option<&HighWaterMark>,
    ) -> Result<FetchedBatch, FetchError> {
        let url = self.base.join(&format!("v2/json/{}", account.username))?;
        let request = client.get(url).query(&[("count", PAGE_SIZE)]);

        let bytes = get_bytes(request).await?;
        let posts: Vec<Post> = serde_json::from_slice(&bytes)?;

        let mut batch = FetchedBatch::default();
        for post in &posts {
            batch.push(ServiceKind::Delicious, post.normalize());
        }
        Ok(batch)
    }
}
