use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::core::types::ChatId;

/// Entries older than this are invisible to readers. They are never deleted.
const RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only per-chat conversation history, one JSON record per line in
/// `<dir>/<chat_id>.jsonl`. Only the chat's single drain owner ever appends,
/// so no cross-task locking is needed here.
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create memory directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self, chat: ChatId) -> PathBuf {
        self.dir.join(format!("{}.jsonl", chat))
    }

    pub fn append(&self, chat: ChatId, role: Role, text: &str) -> Result<()> {
        let entry = MemoryEntry {
            role,
            text: text.trim().to_string(),
            timestamp: Utc::now(),
        };
        let path = self.path(chat);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        Ok(())
    }

    /// Entries from the last 24 hours, oldest first. A missing file or any
    /// malformed record yields an empty history rather than an error.
    pub fn load(&self, chat: ChatId) -> Vec<MemoryEntry> {
        let raw = match fs::read_to_string(self.path(chat)) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };

        let cutoff = Utc::now() - Duration::hours(RETENTION_HOURS);
        let mut entries = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) if entry.timestamp > cutoff => entries.push(entry),
                Ok(_) => {}
                Err(err) => {
                    log::warn!("discarding unreadable memory for chat {}: {err}", chat);
                    return Vec::new();
                }
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let chat = ChatId(7);

        store.append(chat, Role::User, "  is eth safe?  ").unwrap();
        store.append(chat, Role::Assistant, "probably").unwrap();

        let entries = store.load(chat);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].text, "is eth safe?");
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].text, "probably");
    }

    #[test]
    fn entries_past_retention_are_filtered_out() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let chat = ChatId(1);

        let stale = MemoryEntry {
            role: Role::User,
            text: "old question".to_string(),
            timestamp: Utc::now() - Duration::hours(RETENTION_HOURS + 1),
        };
        std::fs::write(
            dir.path().join("1.jsonl"),
            format!("{}\n", serde_json::to_string(&stale).unwrap()),
        )
        .unwrap();
        store.append(chat, Role::User, "fresh question").unwrap();

        let entries = store.load(chat);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "fresh question");
    }

    #[test]
    fn malformed_record_yields_empty_history() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let chat = ChatId(2);

        store.append(chat, Role::User, "fine").unwrap();
        let path = dir.path().join("2.jsonl");
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("{not json\n");
        std::fs::write(&path, raw).unwrap();

        assert!(store.load(chat).is_empty());
    }

    #[test]
    fn missing_file_yields_empty_history() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        assert!(store.load(ChatId(99)).is_empty());
    }
}
