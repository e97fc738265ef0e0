//! Drives a whole archive run: search to exhaustion, dedupe and sort, write
//! the archive, then save attachments and delete message by message.

use crate::archive::{write_archive, RunDirectory};
use crate::attachments::{AttachmentReport, AttachmentSaver};
use crate::config::Config;
use crate::dedupe::Deduplicator;
use crate::delete::{estimate_duration, DeleteExecutor, DeleteReport};
use crate::discord::{AttachmentFetcher, DeleteApi, SearchApi};
use crate::error::Result;
use crate::model::Message;
use crate::search::SearchPages;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub archive_path: PathBuf,
    pub archived: usize,
    pub attachments: AttachmentReport,
    pub deletes: DeleteReport,
}

impl RunSummary {
    pub fn log(&self) {
        info!("Deleted {} messages ({} confirmed)", self.deletes.attempted, self.deletes.confirmed);
        info!("Saved {} attachments", self.attachments.saved);
        if !self.attachments.failures.is_empty() {
            warn!("{} attachments could not be saved", self.attachments.failures.len());
        }
        if !self.deletes.failures.is_empty() {
            warn!("{} deletes were not confirmed", self.deletes.failures.len());
        }
    }
}

/// Pages through the search endpoint until it runs dry and reduces the
/// results to the target user's unique messages, oldest first.
pub async fn collect_messages<S>(api: &S, config: &Config) -> Result<Vec<Message>>
where
    S: SearchApi + ?Sized,
{
    let mut pages = SearchPages::from_config(api, config);
    let mut dedup = Deduplicator::new(config.user_id.as_str());

    while let Some(page) = pages.next_page().await? {
        let added = dedup.push_page(page);
        debug!("Search: {} new messages, {} total", added, dedup.len());
    }

    info!(
        "Found {} messages in {} search requests",
        dedup.len(),
        pages.requests()
    );
    Ok(dedup.finish())
}

pub async fn run<C>(config: &Config, client: &C, started_at: DateTime<Utc>) -> Result<RunSummary>
where
    C: SearchApi + DeleteApi + AttachmentFetcher + ?Sized,
{
    info!("Searching for messages. This may take several minutes.");
    let messages = collect_messages(client, config).await?;

    let run_dir = RunDirectory::create(&config.output_dir, started_at, config.save_attachments)?;
    // Nothing is deleted unless the archive made it to disk.
    let archive_path = write_archive(&run_dir, &messages)?;

    let mut saver = run_dir
        .attachments_dir()
        .map(|dir| AttachmentSaver::new(client, dir, config.attachment_failures));
    let mut deleter = config
        .delete_messages
        .then(|| DeleteExecutor::new(client, config.delete_delay));

    if deleter.is_some() {
        let (low, high) = estimate_duration(messages.len(), config.delete_delay);
        info!(
            "Deleting messages. This will take approximately {} to {}.",
            humantime::format_duration(low),
            humantime::format_duration(high)
        );
    }

    for message in &messages {
        if let Some(saver) = saver.as_mut() {
            saver.save_message(message).await?;
        }
        if let Some(deleter) = deleter.as_mut() {
            deleter.delete(message).await;
        }
    }

    Ok(RunSummary {
        run_dir: run_dir.path().to_path_buf(),
        archive_path,
        archived: messages.len(),
        attachments: saver.map(AttachmentSaver::into_report).unwrap_or_default(),
        deletes: deleter.map(DeleteExecutor::into_report).unwrap_or_default(),
    })
}
