//! Append-only chat logs.
//!
//! Each identity gets a `<identity_id>.jsonl` file under the chat-log
//! directory; every exchanged message is one JSON line. Reads go through
//! an in-memory write-through cache, and the async wrappers move file I/O
//! onto the blocking pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use cg_domain::chat::ChatLogEntry;
use cg_domain::error::{Error, Result};
use cg_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait ChatLogStore: Send + Sync {
    /// Append entries for one identity. Entries of a single call stay
    /// adjacent and in the given order.
    async fn append(&self, identity_id: &str, entries: &[ChatLogEntry]) -> Result<()>;

    /// All entries of an identity, ordered by creation time.
    async fn history(&self, identity_id: &str) -> Result<Vec<ChatLogEntry>>;

    /// Drop every entry of an identity.
    async fn purge(&self, identity_id: &str) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSONL implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct JsonlChatLog {
    base_dir: PathBuf,
    cache: RwLock<HashMap<String, Vec<ChatLogEntry>>>,
    /// Serializes disk writes with cold cache loads so a load never races
    /// an append into a duplicated or stale cache entry.
    io_lock: tokio::sync::Mutex<()>,
}

impl JsonlChatLog {
    pub fn open(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
            io_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn path_for(&self, identity_id: &str) -> Result<PathBuf> {
        let valid = !identity_id.is_empty()
            && identity_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::Other(format!("invalid identity id for chat log: {identity_id:?}")));
        }
        Ok(self.base_dir.join(format!("{identity_id}.jsonl")))
    }
}

#[async_trait::async_trait]
impl ChatLogStore for JsonlChatLog {
    async fn append(&self, identity_id: &str, entries: &[ChatLogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let buf = serialize_entries(entries)?;
        let path = self.path_for(identity_id)?;
        let _io = self.io_lock.lock().await;

        // One write_all on an O_APPEND handle keeps the batch contiguous.
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(Error::Io)?;
            file.write_all(buf.as_bytes()).map_err(Error::Io)?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        // Only extend an already-loaded cache; otherwise the next read
        // loads the full file including these lines.
        {
            let mut cache = self.cache.write();
            if let Some(cached) = cache.get_mut(identity_id) {
                cached.extend(entries.iter().cloned());
            }
        }

        TraceEvent::ChatLogAppend {
            identity_id: identity_id.to_owned(),
            lines: entries.len(),
        }
        .emit();

        Ok(())
    }

    async fn history(&self, identity_id: &str) -> Result<Vec<ChatLogEntry>> {
        let cached = self.cache.read().get(identity_id).cloned();
        let mut entries = match cached {
            Some(entries) => entries,
            None => {
                let path = self.path_for(identity_id)?;
                let _io = self.io_lock.lock().await;
                let sid = identity_id.to_owned();
                let loaded = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &sid))
                    .await
                    .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
                self.cache
                    .write()
                    .entry(identity_id.to_owned())
                    .or_insert_with(|| loaded.clone());
                loaded
            }
        };
        // Stable: entries with equal timestamps keep file order.
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn purge(&self, identity_id: &str) -> Result<()> {
        let path = self.path_for(identity_id)?;
        let _io = self.io_lock.lock().await;
        self.cache.write().remove(identity_id);
        tokio::task::spawn_blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
        tracing::info!(identity_id, "chat log purged");
        Ok(())
    }
}

/// Serialize entries to a JSONL string.
fn serialize_entries(entries: &[ChatLogEntry]) -> Result<String> {
    let mut buf = String::new();
    for entry in entries {
        let json = serde_json::to_string(entry)
            .map_err(|e| Error::Other(format!("serializing chat log entry: {e}")))?;
        buf.push_str(&json);
        buf.push('\n');
    }
    Ok(buf)
}

/// Read and parse a JSONL chat-log file. Malformed lines are skipped.
fn read_jsonl_file(path: &Path, identity_id: &str) -> Result<Vec<ChatLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    let mut entries = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChatLogEntry>(line) {
            Ok(e) => entries.push(e),
            Err(e) => {
                tracing::warn!(
                    identity_id = identity_id,
                    error = %e,
                    "skipping malformed chat log line"
                );
            }
        }
    }
    Ok(entries)
}
