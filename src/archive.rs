use crate::error::{ArchiveError, Result};
use crate::model::Message;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ARCHIVE_FILE: &str = "logs.json";
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Suffixes tried when `log_{epoch}` is already taken.
const MAX_SUFFIX: u32 = 1000;

/// Output location of one run: `log_{unix_epoch}` under the configured root,
/// with an `attachments/` subdirectory when attachments are saved.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    root: PathBuf,
    attachments: Option<PathBuf>,
}

impl RunDirectory {
    /// Creates a fresh directory for this run. An existing directory is never
    /// reused; a numeric suffix is appended instead.
    pub fn create(
        output_dir: &Path,
        started_at: DateTime<Utc>,
        with_attachments: bool,
    ) -> Result<Self> {
        fs::create_dir_all(output_dir).map_err(|source| ArchiveError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let base = format!("log_{}", started_at.timestamp());
        let mut root = output_dir.join(&base);
        let mut suffix = 0;
        loop {
            match fs::create_dir(&root) {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && suffix < MAX_SUFFIX => {
                    suffix += 1;
                    root = output_dir.join(format!("{}_{}", base, suffix));
                }
                Err(source) => return Err(ArchiveError::OutputDir { path: root, source }),
            }
        }
        debug!("Created run directory {}", root.display());

        let attachments = if with_attachments {
            let dir = root.join(ATTACHMENTS_DIR);
            fs::create_dir(&dir).map_err(|source| ArchiveError::OutputDir {
                path: dir.clone(),
                source,
            })?;
            Some(dir)
        } else {
            None
        };

        Ok(Self { root, attachments })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE)
    }

    /// `None` unless the directory was created with attachments enabled.
    pub fn attachments_dir(&self) -> Option<&Path> {
        self.attachments.as_deref()
    }
}

/// Writes the ordered archive as indented JSON and returns its path.
///
/// This is the only durable record before deletion starts, so callers must
/// treat an error here as fatal.
pub fn write_archive(dir: &RunDirectory, messages: &[Message]) -> Result<PathBuf> {
    let data = serde_json::to_vec_pretty(messages).map_err(ArchiveError::ArchiveEncode)?;
    let path = dir.archive_path();
    fs::write(&path, data).map_err(|source| ArchiveError::ArchiveWrite {
        path: path.clone(),
        source,
    })?;
    info!("Saved {} messages to {}", messages.len(), path.display());
    Ok(path)
}
