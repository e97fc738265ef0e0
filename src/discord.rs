//! HTTP access to the remote chat service: guild message search, message
//! deletion and plain attachment downloads.
//!
//! The orchestrator only sees the [`SearchApi`], [`DeleteApi`] and
//! [`AttachmentFetcher`] traits, so runs can be driven by canned data.

use crate::config::Config;
use crate::error::{ArchiveError, Result};
use crate::model::SearchPage;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, REFERER, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Results per search request. Must match the remote page size: the offset
/// advances by exactly this much per call.
pub const PAGE_SIZE: u32 = 25;

/// Back-off used when a 429 carries no usable retry hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Fetches one page of the author's messages. No retries happen here.
    async fn search_page(&self, offset: u32) -> Result<SearchPage>;
}

/// Raw result of a delete call; interpreting the status is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResponse {
    pub status: StatusCode,
    pub retry_after: Option<Duration>,
}

#[async_trait]
pub trait DeleteApi: Send + Sync {
    async fn delete_message(&self, channel_id: &str, message_id: &str)
        -> anyhow::Result<DeleteResponse>;
}

#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Streams `url` into `file`, returning the bytes written. The caller owns
    /// the file's creation and its cleanup on failure.
    async fn fetch_into(&self, url: &str, file: &mut File) -> anyhow::Result<u64>;
}

pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    guild_id: String,
    user_id: String,
    channel_filter: Option<String>,
    auth_headers: HeaderMap,
}

impl DiscordClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ArchiveError::HttpClient)?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            guild_id: config.guild_id.clone(),
            user_id: config.user_id.clone(),
            channel_filter: config.search_channel().map(str::to_string),
            auth_headers: auth_headers(config)?,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/guilds/{}/messages/search", self.api_base, self.guild_id)
    }

    fn delete_url(&self, channel_id: &str, message_id: &str) -> String {
        format!(
            "{}/channels/{}/messages/{}",
            self.api_base, channel_id, message_id
        )
    }
}

/// Authorization token, session cookie and referer, sent on every search
/// and delete call.
fn auth_headers(config: &Config) -> Result<HeaderMap> {
    let value = |name: &str, raw: &str| {
        HeaderValue::from_str(raw)
            .map_err(|_| ArchiveError::Config(format!("{name} contains invalid header characters")))
    };

    let mut headers = HeaderMap::new();
    let mut token = value("user_token", &config.user_token)?;
    token.set_sensitive(true);
    headers.insert(AUTHORIZATION, token);
    if !config.user_cookie.is_empty() {
        let mut cookie = value("user_cookie", &config.user_cookie)?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);
    }
    headers.insert(REFERER, value("referer", &config.referer())?);
    Ok(headers)
}

/// Reads the retry hint from the `Retry-After` header, falling back to the
/// `retry_after` field of a JSON body. Both are in (possibly fractional) seconds.
pub fn parse_retry_after(headers: &HeaderMap, body: &[u8]) -> Option<Duration> {
    let from_header = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok());

    let secs = from_header.or_else(|| {
        serde_json::from_slice::<serde_json::Value>(body)
            .ok()?
            .get("retry_after")?
            .as_f64()
    })?;

    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[async_trait]
impl SearchApi for DiscordClient {
    async fn search_page(&self, offset: u32) -> Result<SearchPage> {
        let mut query = vec![("author_id", self.user_id.clone())];
        if let Some(channel_id) = &self.channel_filter {
            query.push(("channel_id", channel_id.clone()));
        }
        query.push(("offset", offset.to_string()));

        debug!("Search: requesting offset {}", offset);
        let response = self
            .http
            .get(self.search_url())
            .headers(self.auth_headers.clone())
            .query(&query)
            .send()
            .await
            .map_err(|source| ArchiveError::SearchTransport { offset, source })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|source| ArchiveError::SearchTransport { offset, source })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(&headers, &body).unwrap_or(DEFAULT_RETRY_AFTER);
            return Err(ArchiveError::RateLimited {
                offset,
                retry_after,
            });
        }
        if !status.is_success() {
            return Err(ArchiveError::SearchStatus { offset, status });
        }

        serde_json::from_slice(&body)
            .map_err(|source| ArchiveError::SearchDecode { offset, source })
    }
}

#[async_trait]
impl DeleteApi for DiscordClient {
    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> anyhow::Result<DeleteResponse> {
        let response = self
            .http
            .delete(self.delete_url(channel_id, message_id))
            .headers(self.auth_headers.clone())
            .send()
            .await?;

        let status = response.status();
        let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
            let headers = response.headers().clone();
            let body = response.bytes().await.unwrap_or_default();
            Some(parse_retry_after(&headers, &body).unwrap_or(DEFAULT_RETRY_AFTER))
        } else {
            None
        };

        Ok(DeleteResponse {
            status,
            retry_after,
        })
    }
}

#[async_trait]
impl AttachmentFetcher for DiscordClient {
    async fn fetch_into(&self, url: &str, file: &mut File) -> anyhow::Result<u64> {
        let mut response = self.http.get(url).send().await?.error_for_status()?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}
