//! Filesystem chat store, one JSON file per save.

use super::{DurableStore, StoreError, seal_draft};
use async_trait::async_trait;
use banter_rs_protocol::{ChatDraft, ChatSummary, DurableChatRecord, SaveReceipt};
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "chat_";
const FILE_SUFFIX: &str = ".json";

/// Chat store backed by a directory of `chat_{timestamp}_{id}.json` files.
///
/// The id lives in the filename suffix, so a chat saved at different times
/// can leave several files behind; every read path resolves such duplicates
/// by the latest `saved_at` and [`FsDurableStore::cleanup_duplicates`] prunes
/// the losers.
pub struct FsDurableStore {
    dir: PathBuf,
}

impl FsDurableStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The directory records are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn matches_id(filename: &str, id: &str) -> bool {
        filename.starts_with(FILE_PREFIX)
            && filename.ends_with(FILE_SUFFIX)
            && filename[..filename.len() - FILE_SUFFIX.len()].ends_with(&format!("_{id}"))
    }

    /// Every `chat_*.json` filename under the store directory.
    fn record_files(&self) -> Result<Vec<String>, StoreError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
                files.push(name.to_string());
            }
        }
        Ok(files)
    }

    fn read_record(&self, filename: &str) -> Result<DurableChatRecord, StoreError> {
        let raw = std::fs::read_to_string(self.dir.join(filename))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// One `(filename, record)` per chat id, resolved to the latest
    /// `saved_at`. Unreadable files are skipped with a warning so a single
    /// corrupt record cannot hide the rest.
    fn latest_records(&self) -> Result<HashMap<String, (String, DurableChatRecord)>, StoreError> {
        let mut latest: HashMap<String, (String, DurableChatRecord)> = HashMap::new();
        for filename in self.record_files()? {
            let record = match self.read_record(&filename) {
                Ok(record) => record,
                Err(error) => {
                    warn!("skipping unreadable chat file (file={}, error={})", filename, error);
                    continue;
                }
            };
            match latest.get(&record.id) {
                Some((_, kept)) if kept.saved_at >= record.saved_at => {}
                _ => {
                    latest.insert(record.id.clone(), (filename, record));
                }
            }
        }
        Ok(latest)
    }

    /// Delete every file for ids that have more than one, keeping the latest
    /// `saved_at`. Returns the number of files removed.
    pub fn cleanup_duplicates(&self) -> Result<usize, StoreError> {
        let keep: HashMap<String, String> = self
            .latest_records()?
            .into_iter()
            .map(|(id, (filename, _))| (id, filename))
            .collect();
        let mut removed = 0;
        for filename in self.record_files()? {
            // Unreadable files are left alone here, same as in listings.
            let kept = match self.read_record(&filename) {
                Ok(record) => keep.get(&record.id).map(String::as_str) == Some(filename.as_str()),
                Err(_) => true,
            };
            if !kept {
                std::fs::remove_file(self.dir.join(&filename))?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("pruned duplicate chat files (removed={})", removed);
        }
        Ok(removed)
    }
}

#[async_trait]
impl DurableStore for FsDurableStore {
    async fn save(&self, draft: &ChatDraft) -> Result<SaveReceipt, StoreError> {
        let record = seal_draft(draft);
        let existing: Vec<String> = self
            .record_files()?
            .into_iter()
            .filter(|name| Self::matches_id(name, &record.id))
            .collect();
        let updated = !existing.is_empty();
        // Reuse the existing filename on update so saves do not accumulate
        // one file per write.
        let filename = existing.into_iter().min().unwrap_or_else(|| {
            format!(
                "{FILE_PREFIX}{}_{}{FILE_SUFFIX}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                record.id
            )
        });
        let encoded = serde_json::to_string_pretty(&record)?;
        std::fs::write(self.dir.join(&filename), encoded)?;
        debug!(
            "saved chat record (chat_id={}, file={}, messages={}, updated={})",
            record.id, filename, record.message_count, updated
        );
        Ok(SaveReceipt {
            success: true,
            filename,
            chat_id: record.id,
            updated,
        })
    }

    async fn list(&self) -> Result<Vec<ChatSummary>, StoreError> {
        let mut summaries: Vec<ChatSummary> = self
            .latest_records()?
            .into_values()
            .map(|(filename, record)| {
                let mut summary = ChatSummary::from(&record);
                summary.filename = Some(filename);
                summary
            })
            .collect();
        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }

    async fn load(&self, id: &str) -> Result<Option<DurableChatRecord>, StoreError> {
        Ok(self.latest_records()?.remove(id).map(|(_, record)| record))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut removed = 0;
        for filename in self.record_files()? {
            if Self::matches_id(&filename, id) {
                std::fs::remove_file(self.dir.join(&filename))?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("deleted chat records (chat_id={}, files={})", id, removed);
        }
        Ok(removed > 0)
    }
}
