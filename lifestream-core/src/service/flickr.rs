use std::fmt;

use chrono::{NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{get_bytes, FetchedBatch};
use crate::error::FetchError;
use crate::model::{Account, ActivityContent, HighWaterMark, NormalizedActivity, ServiceKind};

const PER_PAGE: &str = "500";
const EXTRAS: &str = "date_upload,date_taken";
const TAKEN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Flickr sends some numeric fields as strings and others as numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Number(i64),
}

impl fmt::Display for Loose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loose::Text(s) => f.write_str(s),
            Loose::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserLookup {
    user: User,
}

#[derive(Debug, Deserialize)]
struct User {
    nsid: String,
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    photos: Photos,
}

#[derive(Debug, Deserialize)]
struct Photos {
    #[serde(default)]
    photo: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: String,
    #[serde(default)]
    title: String,
    farm: Loose,
    server: String,
    secret: String,
    dateupload: Loose,
    #[serde(default)]
    datetaken: Option<String>,
}

impl Photo {
    fn normalize(&self, nsid: &str) -> Result<NormalizedActivity, String> {
        let seconds: i64 = self
            .dateupload
            .to_string()
            .parse()
            .map_err(|e| format!("photo {}: bad dateupload {}: {}", self.id, self.dateupload, e))?;
        let published = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| format!("photo {}: dateupload {} out of range", self.id, seconds))?;
        // A missing or odd "taken" date is cosmetic; keep the photo.
        let taken_on = self
            .datetaken
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, TAKEN_FORMAT).ok())
            .map(|naive| Utc.from_utc_datetime(&naive));

        let base = format!(
            "https://farm{}.static.flickr.com/{}/{}_{}",
            self.farm, self.server, self.id, self.secret
        );
        Ok(NormalizedActivity {
            natural_key: self.id.clone(),
            published,
            title: Some(self.title.clone()),
            link: Some(format!("https://www.flickr.com/photos/{}/{}", nsid, self.id)),
            content: ActivityContent::FlickrPhoto {
                photo_id: self.id.clone(),
                square_thumb_link: Some(format!("{}_s.jpg", base)),
                image_500px_link: Some(format!("{}.jpg", base)),
                taken_on,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct FlickrAdapter {
    base: Url,
}

impl FlickrAdapter {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Public photos of the account. With a high-water mark, only photos
    /// uploaded at or after it are requested.
    pub async fn fetch(
        &self,
        client: &Client,
        account: &Account,
        since: Option<&HighWaterMark>,
    ) -> Result<FetchedBatch, FetchError> {
        let api_key = account.credentials.api_key.as_deref().unwrap_or_default();
        let nsid = match account.credentials.user_id.as_deref() {
            Some(nsid) if !nsid.is_empty() => nsid.to_owned(),
            _ => self.find_nsid(client, api_key, &account.username).await?,
        };

        let page: PhotoPage = match since {
            Some(mark) => {
                let min_upload = mark.published.timestamp().to_string();
                self.call(
                    client,
                    "flickr.photos.search",
                    api_key,
                    &[
                        ("user_id", nsid.as_str()),
                        ("min_upload_date", min_upload.as_str()),
                        ("per_page", PER_PAGE),
                        ("extras", EXTRAS),
                    ],
                )
                .await?
            }
            None => {
                self.call(
                    client,
                    "flickr.people.getPublicPhotos",
                    api_key,
                    &[("user_id", nsid.as_str()), ("per_page", PER_PAGE), ("extras", EXTRAS)],
                )
                .await?
            }
        };

        let mut batch = FetchedBatch::default();
        for photo in &page.photos.photo {
            batch.push(ServiceKind::Flickr, photo.normalize(&nsid));
        }
        Ok(batch)
    }

    async fn find_nsid(
        &self,
        client: &Client,
        api_key: &str,
        username: &str,
    ) -> Result<String, FetchError> {
        let lookup: UserLookup = self
            .call(client, "flickr.people.findByUsername", api_key, &[("username", username)])
            .await?;
        debug!(username, nsid = %lookup.user.nsid, "resolved flickr user id");
        Ok(lookup.user.nsid)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        client: &Client,
        method: &str,
        api_key: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let request = client
            .get(self.base.clone())
            .query(&[
                ("method", method),
                ("api_key", api_key),
                ("format", "json"),
                ("nojsoncallback", "1"),
            ])
            .query(params);

        let bytes = get_bytes(request).await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        if body.get("stat").and_then(Value::as_str) != Some("ok") {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown failure");
            return Err(FetchError::Api(format!("{}: {}", method, message)));
        }
        Ok(serde_json::from_value(body)?)
    }
}
