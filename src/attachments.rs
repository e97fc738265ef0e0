use crate::discord::AttachmentFetcher;
use crate::error::{ArchiveError, Result};
use crate::model::{Attachment, Message};
use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tracing::{debug, warn};

/// Numbered names tried once both the plain and the id-suffixed name are taken.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// What a failed attachment download does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentPolicy {
    /// The first failure aborts the run.
    Abort,
    /// Failures are logged and collected in the report.
    #[default]
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    Saved { path: PathBuf, bytes: u64 },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFailure {
    pub message_id: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentReport {
    pub saved: usize,
    pub bytes: u64,
    pub failures: Vec<AttachmentFailure>,
}

/// `{unix_seconds}_{filename}`. Path separators in the declared filename are
/// replaced so the result always stays inside the attachments directory.
pub fn attachment_filename(message: &Message, attachment: &Attachment) -> String {
    let name: String = attachment
        .filename
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    let name = if name.is_empty() {
        attachment.id.clone()
    } else {
        name
    };
    format!("{}_{}", message.timestamp.timestamp(), name)
}

/// Inserts `_{suffix}` before the extension, or appends it when there is none.
fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", name, suffix),
    }
}

/// Creates a new file for `attachment` in `dir` without touching existing
/// files. Two attachments named alike in the same second fall back to an
/// `_{attachment_id}` suffix, then to numbered variants of it.
async fn create_destination(
    dir: &Path,
    message: &Message,
    attachment: &Attachment,
) -> io::Result<(PathBuf, File)> {
    let primary = attachment_filename(message, attachment);
    let by_id = with_suffix(&primary, &attachment.id);
    let numbered = (1..=MAX_NAME_ATTEMPTS).map(|n| with_suffix(&by_id, &n.to_string()));

    for name in [primary.clone(), by_id.clone()].into_iter().chain(numbered) {
        let path = dir.join(&name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Attachment name {} already taken", name);
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name for {}", primary),
    ))
}

/// Downloads one attachment into a file of its own. A failed download removes
/// the file this call created and nothing else.
pub async fn save_attachment<F>(
    fetcher: &F,
    dir: &Path,
    message: &Message,
    attachment: &Attachment,
) -> AttachmentOutcome
where
    F: AttachmentFetcher + ?Sized,
{
    let (path, mut file) = match create_destination(dir, message, attachment).await {
        Ok(created) => created,
        Err(e) => {
            return AttachmentOutcome::Failed {
                reason: format!("cannot create file in {}: {}", dir.display(), e),
            }
        }
    };

    match fetcher.fetch_into(&attachment.url, &mut file).await {
        Ok(bytes) => AttachmentOutcome::Saved { path, bytes },
        Err(e) => {
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove partial file {}: {}", path.display(), remove_err);
            }
            AttachmentOutcome::Failed {
                reason: format!("{:#}", e),
            }
        }
    }
}

/// Saves every attachment of each message it is handed and keeps the tally.
pub struct AttachmentSaver<'a, F: AttachmentFetcher + ?Sized> {
    fetcher: &'a F,
    dir: &'a Path,
    policy: AttachmentPolicy,
    report: AttachmentReport,
}

impl<'a, F: AttachmentFetcher + ?Sized> AttachmentSaver<'a, F> {
    pub fn new(fetcher: &'a F, dir: &'a Path, policy: AttachmentPolicy) -> Self {
        Self {
            fetcher,
            dir,
            policy,
            report: AttachmentReport::default(),
        }
    }

    /// Errors only under [`AttachmentPolicy::Abort`].
    pub async fn save_message(&mut self, message: &Message) -> Result<()> {
        for attachment in &message.attachments {
            match save_attachment(self.fetcher, self.dir, message, attachment).await {
                AttachmentOutcome::Saved { path, bytes } => {
                    debug!("Saved attachment {} ({} bytes)", path.display(), bytes);
                    self.report.saved += 1;
                    self.report.bytes += bytes;
                }
                AttachmentOutcome::Failed { reason } => {
                    warn!(
                        "Failed to save attachment {} of message {}: {}",
                        attachment.url, message.id, reason
                    );
                    if self.policy == AttachmentPolicy::Abort {
                        return Err(ArchiveError::Attachment {
                            message_id: message.id.clone(),
                            url: attachment.url.clone(),
                            reason,
                        });
                    }
                    self.report.failures.push(AttachmentFailure {
                        message_id: message.id.clone(),
                        url: attachment.url.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn report(&self) -> &AttachmentReport {
        &self.report
    }

    pub fn into_report(self) -> AttachmentReport {
        self.report
    }
}
