//! Shared fixtures for unit tests: configs, message builders and in-memory
//! stand-ins for the remote service.

use crate::config::Config;
use crate::discord::{AttachmentFetcher, DeleteApi, DeleteResponse, SearchApi};
use crate::error::Result;
use crate::model::{Attachment, Author, Message, SearchPage};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

/// Config pointing at `api_base` with zero delays.
pub(crate) fn test_config(api_base: &str) -> Config {
    let mut config = Config::parse(
        r#"
        server = "111"
        channel = "222"
        user_id = "333"
        user_token = "secret_token"
        user_cookie = "secret_cookie"
        "#,
    )
    .unwrap();
    config.api_base = api_base.to_string();
    config.search_delay = Duration::ZERO;
    config.delete_delay = Duration::ZERO;
    config
}

/// Message `id` by `author_id`, created `secs` seconds after 2020-01-01.
pub(crate) fn msg(id: &str, author_id: &str, secs: i64) -> Message {
    let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    Message {
        id: id.to_string(),
        channel_id: "222".to_string(),
        author: Author {
            id: author_id.to_string(),
            username: format!("user-{}", author_id),
            ..Default::default()
        },
        content: format!("message {}", id),
        timestamp: base + chrono::Duration::seconds(secs),
        edited_timestamp: None,
        attachments: Vec::new(),
        embeds: Vec::new(),
        tts: false,
        pinned: false,
        mention_everyone: false,
        mentions: Vec::new(),
        mention_roles: Vec::new(),
        kind: 0,
        hit: Some(true),
    }
}

pub(crate) fn attachment(id: &str, url: &str, filename: &str) -> Attachment {
    Attachment {
        id: id.to_string(),
        url: url.to_string(),
        proxy_url: None,
        filename: filename.to_string(),
        size: 3,
        width: None,
        height: None,
    }
}

/// A page holding a single group.
pub(crate) fn group(messages: Vec<Message>) -> SearchPage {
    SearchPage {
        total_results: messages.len() as u64,
        analytics_id: None,
        messages: vec![messages],
    }
}

/// Replays scripted search results in order, then answers with empty pages.
pub(crate) struct ScriptedSearch {
    script: Mutex<VecDeque<Result<SearchPage>>>,
    offsets: Mutex<Vec<u32>>,
    latency: Duration,
    calls: Mutex<Vec<(Instant, Instant)>>,
}

impl ScriptedSearch {
    pub(crate) fn new(script: Vec<Result<SearchPage>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            offsets: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every search call takes `latency` to answer.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn offsets(&self) -> Vec<u32> {
        self.offsets.lock().unwrap().clone()
    }

    /// (start, end) of every search call.
    pub(crate) fn calls(&self) -> Vec<(Instant, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchApi for ScriptedSearch {
    async fn search_page(&self, offset: u32) -> Result<SearchPage> {
        let started = Instant::now();
        self.offsets.lock().unwrap().push(offset);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls.lock().unwrap().push((started, Instant::now()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::default()))
    }
}

/// In-memory remote: scripted search, recorded deletes with queued
/// per-message statuses, and attachment bodies keyed by URL.
pub(crate) struct FakeDiscord {
    pub(crate) search: ScriptedSearch,
    delete_status: Mutex<HashMap<String, VecDeque<StatusCode>>>,
    failing_deletes: Vec<String>,
    bodies: HashMap<String, Vec<u8>>,
    latency: Duration,
    deleted: Mutex<Vec<(String, String)>>,
    delete_calls: Mutex<Vec<(Instant, Instant)>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeDiscord {
    pub(crate) fn new(pages: Vec<SearchPage>) -> Self {
        Self {
            search: ScriptedSearch::new(pages.into_iter().map(Ok).collect()),
            delete_status: Mutex::new(HashMap::new()),
            failing_deletes: Vec::new(),
            bodies: HashMap::new(),
            latency: Duration::ZERO,
            deleted: Mutex::new(Vec::new()),
            delete_calls: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_script(script: Vec<Result<SearchPage>>) -> Self {
        let mut fake = Self::new(Vec::new());
        fake.search = ScriptedSearch::new(script);
        fake
    }

    /// Queues `status` as the answer to the next unanswered delete of
    /// `message_id`. Once the queue is drained deletes succeed with 204.
    pub(crate) fn with_delete_status(self, message_id: &str, status: StatusCode) -> Self {
        self.delete_status
            .lock()
            .unwrap()
            .entry(message_id.to_string())
            .or_default()
            .push_back(status);
        self
    }

    pub(crate) fn with_failing_delete(mut self, message_id: &str) -> Self {
        self.failing_deletes.push(message_id.to_string());
        self
    }

    pub(crate) fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }

    /// Every delete call takes `latency` to answer.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// (channel_id, message_id) of every delete call, in call order.
    pub(crate) fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    /// (start, end) of every delete call.
    pub(crate) fn delete_calls(&self) -> Vec<(Instant, Instant)> {
        self.delete_calls.lock().unwrap().clone()
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchApi for FakeDiscord {
    async fn search_page(&self, offset: u32) -> Result<SearchPage> {
        self.search.search_page(offset).await
    }
}

#[async_trait]
impl DeleteApi for FakeDiscord {
    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> anyhow::Result<DeleteResponse> {
        let started = Instant::now();
        self.deleted
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message_id.to_string()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.delete_calls.lock().unwrap().push((started, Instant::now()));

        if self.failing_deletes.iter().any(|id| id == message_id) {
            anyhow::bail!("connection reset");
        }
        let status = self
            .delete_status
            .lock()
            .unwrap()
            .get_mut(message_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(StatusCode::NO_CONTENT);
        let retry_after =
            (status == StatusCode::TOO_MANY_REQUESTS).then_some(Duration::from_secs(2));
        Ok(DeleteResponse {
            status,
            retry_after,
        })
    }
}

#[async_trait]
impl AttachmentFetcher for FakeDiscord {
    async fn fetch_into(&self, url: &str, file: &mut File) -> anyhow::Result<u64> {
        self.fetched.lock().unwrap().push(url.to_string());
        let body = self.bodies.get(url).ok_or_else(|| {
            anyhow::anyhow!("HTTP status client error (404 Not Found) for url ({})", url)
        })?;
        file.write_all(body).await?;
        file.flush().await?;
        Ok(body.len() as u64)
    }
}
