use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct RssFeed {
    pub title: String,
    pub description: Option<String>,
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RssItem {
    pub title: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<RssFeed> {
        info!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await?;
        let feed = Self::parse(&bytes)?;
        debug!("Parsed {} items from {}", feed.items.len(), url);
        Ok(feed)
    }

    /// Parse an RSS or Atom document.
    pub fn parse(xml: &[u8]) -> Result<RssFeed> {
        let parsed = parser::parse(xml)?;

        let items = parsed
            .entries
            .into_iter()
            .map(|entry| RssItem {
                title: entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "Untitled".to_string()),
                link: entry.links.first().map(|l| l.href.clone()),
                published: entry.published.or(entry.updated),
            })
            .collect();

        Ok(RssFeed {
            title: parsed
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string()),
            description: parsed.description.map(|d| d.content),
            items,
        })
    }
}
