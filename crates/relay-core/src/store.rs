use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{config::Config, domain::Message, Result};

/// Durable, age-bounded message log of one channel.
///
/// The whole log is one JSON array on disk, rewritten on every save. Every
/// read-modify-write cycle runs under an internal lock, so concurrent
/// submissions in this process cannot clobber each other. Retention is enforced
/// lazily: each `load` and each append evicts expired messages.
#[derive(Debug)]
pub struct MessageStore {
    path: PathBuf,
    retention: chrono::Duration,
    lock: Mutex<()>,
}

impl MessageStore {
    pub fn new(path: impl Into<PathBuf>, retention: chrono::Duration) -> Self {
        Self {
            path: path.into(),
            retention,
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.message_file.clone(), cfg.retention())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current log after eviction. Never fails: a missing or corrupt file reads as empty.
    ///
    /// If eviction dropped anything the pruned log is written back.
    pub async fn load(&self) -> Vec<Message> {
        let _guard = self.lock.lock().await;

        let log = self.read_log().await;
        let before = log.len();
        let log = evict(log, Utc::now(), self.retention);

        if log.len() != before {
            debug!(evicted = before - log.len(), "evicted expired messages");
            if let Err(e) = self.write_log(&log).await {
                warn!(path = %self.path.display(), "failed to persist pruned log: {e}");
            }
        }
        log
    }

    pub async fn append(&self, message: Message) -> Result<()> {
        self.append_all(vec![message]).await
    }

    /// Append in order, evict, persist. A write failure is returned.
    pub async fn append_all(&self, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;

        let mut log = self.read_log().await;
        log.extend(messages);
        let log = evict(log, Utc::now(), self.retention);
        self.write_log(&log).await
    }

    /// Put `message` at the front of the log unless a pinned message already exists.
    ///
    /// Returns whether the log changed.
    pub async fn ensure_pinned(&self, message: Message) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let mut log = self.read_log().await;
        if log.iter().any(Message::is_pinned) {
            return Ok(false);
        }
        log.insert(0, message);
        let log = evict(log, Utc::now(), self.retention);
        self.write_log(&log).await?;
        Ok(true)
    }

    async fn read_log(&self) -> Vec<Message> {
        let txt = match tokio::fs::read_to_string(&self.path).await {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "message log unreadable, treating as empty: {e}"
                );
                return Vec::new();
            }
        };
        if txt.trim().is_empty() {
            return Vec::new();
        }

        let entries: Vec<Value> = match serde_json::from_str(&txt) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "message log corrupt, treating as empty: {e}"
                );
                return Vec::new();
            }
        };

        let total = entries.len();
        let log: Vec<Message> = entries
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if log.len() != total {
            warn!(skipped = total - log.len(), "skipped malformed log entries");
        }
        log
    }

    async fn write_log(&self, log: &[Message]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let txt = serde_json::to_string(log)?;

        // Readers never observe a half-written log.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, txt).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Drop every unpinned message sent before `now - retention`.
///
/// A message whose timestamp cannot be parsed counts as expired. A window
/// reaching past the earliest representable instant expires nothing else.
pub fn evict(log: Vec<Message>, now: DateTime<Utc>, retention: chrono::Duration) -> Vec<Message> {
    let cutoff = now.checked_sub_signed(retention);
    log.into_iter()
        .filter(|m| {
            m.is_pinned()
                || m
                    .sent_at()
                    .is_some_and(|at| cutoff.map_or(true, |cutoff| at >= cutoff))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PINNED_TAG;
    use chrono::Duration;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.json"))
    }

    fn msg(content: &str, at: DateTime<Utc>, extra: Option<&str>) -> Message {
        Message {
            content: content.to_string(),
            sender: "alice".to_string(),
            timestamp: at.to_rfc3339(),
            extra: extra.map(str::to_string),
        }
    }

    #[test]
    fn evict_drops_only_expired_unpinned_messages() {
        let now = Utc::now();
        let log = vec![
            msg("old", now - Duration::days(8), None),
            msg("pinned", now - Duration::days(400), Some(PINNED_TAG)),
            msg("edge", now - Duration::days(7), Some("")),
            msg("fresh", now - Duration::hours(1), None),
        ];
        let kept = evict(log, now, Duration::days(7));
        let contents: Vec<_> = kept.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["pinned", "edge", "fresh"]);
    }

    #[test]
    fn evict_treats_unparsable_timestamps_as_expired() {
        let now = Utc::now();
        let mut bad = msg("bad", now, None);
        bad.timestamp = "not a date".to_string();
        let mut bad_pinned = msg("bad pinned", now, Some(PINNED_TAG));
        bad_pinned.timestamp = "not a date".to_string();

        let kept = evict(vec![bad, bad_pinned], now, Duration::days(7));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "bad pinned");
    }

    #[test]
    fn evict_reads_zoneless_timestamps_as_utc() {
        let now = Utc::now();
        let mut m = msg("naive", now, None);
        m.timestamp = (now - Duration::hours(2))
            .naive_utc()
            .format("%Y-%m-%dT%H:%M:%S%.f")
            .to_string();
        assert_eq!(evict(vec![m], now, Duration::days(1)).len(), 1);
    }

    #[test]
    fn evict_with_unrepresentable_cutoff_keeps_dated_messages() {
        let now = Utc::now();
        let mut bad = msg("bad", now, None);
        bad.timestamp = "not a date".to_string();
        let log = vec![msg("old", now - Duration::days(3650), None), bad];

        let kept = evict(log, now, Duration::days(i64::from(u32::MAX)));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "old");
    }

    #[tokio::test]
    async fn huge_retention_from_config_does_not_break_load_or_append() {
        let mut cfg = Config::new("Test", "secret", tmp("relay-store-huge-retention"));
        cfg.max_message_age_days = 100_000_000;
        let store = MessageStore::from_config(&cfg);

        store.append(msg("hi", Utc::now(), None)).await.unwrap();
        assert_eq!(store.load().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_or_corrupt_file_loads_empty() {
        let path = tmp("relay-store-missing");
        let store = MessageStore::new(&path, Duration::days(7));
        assert!(store.load().await.is_empty());

        std::fs::write(&path, "{ not json").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips_in_order() {
        let path = tmp("relay-store-roundtrip");
        let store = MessageStore::new(&path, Duration::days(7));
        let now = Utc::now();
        let a = msg("first", now - Duration::minutes(2), None);
        let b = msg("second", now - Duration::minutes(1), Some("x"));

        store.append(a.clone()).await.unwrap();
        store.append(b.clone()).await.unwrap();

        assert_eq!(store.load().await, vec![a, b]);
    }

    #[tokio::test]
    async fn load_prunes_the_persisted_log() {
        let path = tmp("relay-store-prune");
        let now = Utc::now();
        let log = vec![
            msg("stale", now - Duration::days(30), None),
            msg("fresh", now, None),
        ];
        std::fs::write(&path, serde_json::to_string(&log).unwrap()).unwrap();

        let store = MessageStore::new(&path, Duration::days(7));
        assert_eq!(store.load().await.len(), 1);

        let on_disk: Vec<Message> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0].content, "fresh");
    }

    #[tokio::test]
    async fn malformed_entries_are_skipped() {
        let path = tmp("relay-store-malformed");
        let now = Utc::now().to_rfc3339();
        let raw = format!(
            r#"[{{"content":"ok","sender":"a","timestamp":"{now}"}},{{"sender":"b"}}]"#
        );
        std::fs::write(&path, raw).unwrap();

        let store = MessageStore::new(&path, Duration::days(7));
        let log = store.load().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].content, "ok");
    }

    #[tokio::test]
    async fn ensure_pinned_inserts_once_at_front() {
        let path = tmp("relay-store-pinned");
        let store = MessageStore::new(&path, Duration::days(7));
        store.append(msg("hello", Utc::now(), None)).await.unwrap();

        let welcome = msg("welcome", Utc::now(), Some(PINNED_TAG));
        assert!(store.ensure_pinned(welcome.clone()).await.unwrap());
        assert!(!store.ensure_pinned(welcome).await.unwrap());

        let log = store.load().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].content, "welcome");
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let path = tmp("relay-store-concurrent");
        let store = std::sync::Arc::new(MessageStore::new(&path, Duration::days(7)));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append(msg(&format!("m{i}"), Utc::now(), None))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.load().await.len(), 16);
    }
}
