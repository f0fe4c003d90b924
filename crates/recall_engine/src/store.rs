use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use recall_core::{normalize_recipients, parse_address_list, RecipientConfig, Snapshot};
use recall_logging::{recall_debug, recall_warn};
use serde::Deserialize;
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

const SNAPSHOT_DIR: &str = "snapshots";
const RECIPIENTS_FILE: &str = "recipients.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Write(#[from] PersistError),
}

/// Durable history of feed snapshots.
pub trait SnapshotStore: Send + Sync {
    /// The snapshot with the greatest `created_at`, if any exists.
    fn latest_snapshot(&self) -> Result<Option<Snapshot>, StoreError>;
    fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

/// Where the configured recipients come from.
pub trait RecipientSource: Send + Sync {
    fn recipient_configs(&self) -> Result<Vec<RecipientConfig>, StoreError>;
}

/// One JSON file per snapshot under `<data_dir>/snapshots/`.
///
/// File names start with the zero-padded creation time in milliseconds, so a
/// lexical sort is also a chronological one.
pub struct FileSnapshotStore {
    writer: AtomicFileWriter,
}

impl FileSnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            writer: AtomicFileWriter::new(data_dir.as_ref().join(SNAPSHOT_DIR)),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    /// Snapshot files, newest first.
    fn snapshot_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.writer.dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort_unstable_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(files)
    }
}

impl SnapshotStore for FileSnapshotStore {
    /// Parses only as many files as it takes to find a decodable one.
    fn latest_snapshot(&self) -> Result<Option<Snapshot>, StoreError> {
        for path in self.snapshot_files()? {
            match read_json::<Snapshot>(&path) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(err @ StoreError::Decode { .. }) => {
                    recall_warn!("Skipping unreadable snapshot: {}", err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let filename = format!(
            "{:013}-{}.json",
            snapshot.created_at.timestamp_millis().max(0),
            snapshot.id
        );
        let path = self.writer.write_json(&filename, snapshot)?;
        recall_debug!(
            "Stored snapshot id={} items={} path={}",
            snapshot.id,
            snapshot.items.len(),
            path.display()
        );
        Ok(())
    }
}

/// Recipients document on disk. Older installs stored a comma-separated
/// address string instead of a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecipientsDocument {
    List(Vec<RecipientConfig>),
    Legacy(String),
}

/// `<data_dir>/recipients.json`. A missing file means no recipients.
pub struct FileRecipientStore {
    path: PathBuf,
    writer: AtomicFileWriter,
}

impl FileRecipientStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref().to_path_buf();
        Self {
            path: dir.join(RECIPIENTS_FILE),
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalized recipients as stored.
    pub fn load(&self) -> Result<Vec<RecipientConfig>, StoreError> {
        if !self.path.exists() {
            recall_warn!("No recipients file at {}", self.path.display());
            return Ok(Vec::new());
        }
        let configs = match read_json::<RecipientsDocument>(&self.path)? {
            RecipientsDocument::List(configs) => configs,
            RecipientsDocument::Legacy(raw) => parse_address_list(&raw),
        };
        Ok(normalize_recipients(configs))
    }

    /// Normalize and replace the stored list. Returns what was written.
    pub fn save(&self, configs: Vec<RecipientConfig>) -> Result<Vec<RecipientConfig>, StoreError> {
        let configs = normalize_recipients(configs);
        self.writer.write_json(RECIPIENTS_FILE, &configs)?;
        Ok(configs)
    }
}

impl RecipientSource for FileRecipientStore {
    fn recipient_configs(&self) -> Result<Vec<RecipientConfig>, StoreError> {
        self.load()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
