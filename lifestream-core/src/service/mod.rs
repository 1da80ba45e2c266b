//! Service adapters: one thin HTTP client per supported service, each turning
//! a page of API results into [`NormalizedActivity`] records.

mod delicious;
mod flickr;
mod twitter;

use reqwest::Client;
use tracing::warn;

pub use delicious::DeliciousAdapter;
pub use flickr::FlickrAdapter;
pub use twitter::TwitterAdapter;

use crate::config::Endpoints;
use crate::error::FetchError;
use crate::model::{Account, HighWaterMark, NormalizedActivity, ServiceKind};

/// One page of fetched items. Items the adapter could not normalize are
/// dropped and counted in `rejected`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedBatch {
    pub records: Vec<NormalizedActivity>,
    pub rejected: usize,
}

impl FetchedBatch {
    fn push(&mut self, service: ServiceKind, item: Result<NormalizedActivity, String>) {
        match item {
            Ok(record) => self.records.push(record),
            Err(reason) => {
                warn!(service = %service, %reason, "skipping unparseable item");
                self.rejected += 1;
            }
        }
    }
}

/// Static mapping from each [`ServiceKind`] to its adapter, built once at startup.
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    twitter: TwitterAdapter,
    delicious: DeliciousAdapter,
    flickr: FlickrAdapter,
}

impl AdapterRegistry {
    pub fn new(endpoints: &Endpoints) -> Self {
        Self {
            twitter: TwitterAdapter::new(endpoints.twitter.clone()),
            delicious: DeliciousAdapter::new(endpoints.delicious.clone()),
            flickr: FlickrAdapter::new(endpoints.flickr.clone()),
        }
    }

    /// Fetch items of `account` newer than `since`, using the adapter for its service.
    pub async fn fetch(
        &self,
        client: &Client,
        account: &Account,
        since: Option<&HighWaterMark>,
    ) -> Result<FetchedBatch, FetchError> {
        match account.service {
            ServiceKind::Twitter => self.twitter.fetch(client, account, since).await,
            ServiceKind::Delicious => self.delicious.fetch(client, account, since).await,
            ServiceKind::Flickr => self.flickr.fetch(client, account, since).await,
        }
    }
}

async fn get_bytes(request: reqwest::RequestBuilder) -> Result<Vec<u8>, FetchError> {
    let response = request.send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}
