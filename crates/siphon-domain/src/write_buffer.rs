use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::types::DataPoint;

/// 24 hours, the window within which a failed write is still worth retrying.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct BufferedEntry {
    point: DataPoint,
    expires_at: Instant,
}

/// Local holding area for time-series writes that failed against the store.
///
/// Keyed by `{category}:{uuid}` — the suffix is freshly generated per insert
/// and never reused, so colliding retries cannot overwrite each other.
/// Entries expire unconditionally after the TTL, an explicit bound on memory
/// at the cost of dropping writes the store never came back for.
///
/// Shared between the live-write path and the retry drainer; all operations
/// are safe under concurrent insert/remove/iterate.
pub struct WriteBuffer {
    entries: DashMap<String, BufferedEntry>,
    ttl: Duration,
}

impl WriteBuffer {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Buffer a point under a fresh `{category}:{uuid}` key and return the key.
    pub fn insert(&self, category: &str, point: DataPoint) -> String {
        let key = format!("{}:{}", category, Uuid::new_v4());
        self.entries.insert(
            key.clone(),
            BufferedEntry {
                point,
                expires_at: Instant::now() + self.ttl,
            },
        );
        key
    }

    /// Fetch one buffered point; an expired entry is evicted and reported absent.
    pub fn get(&self, key: &str) -> Option<DataPoint> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if Instant::now() < entry.expires_at {
                    return Some(entry.point.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// All currently-buffered points. Expired entries are swept during the
    /// snapshot and do not appear in the result.
    pub fn snapshot(&self) -> Vec<(String, DataPoint)> {
        let now = Instant::now();
        self.entries.retain(|_, entry| now < entry.expires_at);
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().point.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.retain(|_, entry| now < entry.expires_at);
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    use crate::types::FieldValue;

    fn sample_point() -> DataPoint {
        let mut tags = BTreeMap::new();
        tags.insert("sensor".to_string(), "garden-01".to_string());
        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), FieldValue::Float(21.3));
        DataPoint {
            measurement: "temperature".to_string(),
            tags,
            fields,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let buffer = WriteBuffer::new(Duration::from_secs(60));
        let key = buffer.insert("reading", sample_point());

        assert!(key.starts_with("reading:"));
        assert_eq!(buffer.get(&key), Some(sample_point()));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_keys_are_never_reused() {
        let buffer = WriteBuffer::new(Duration::from_secs(60));
        let first = buffer.insert("reading", sample_point());
        let second = buffer.insert("reading", sample_point());

        assert_ne!(first, second);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_remove_deletes_exact_key() {
        let buffer = WriteBuffer::new(Duration::from_secs(60));
        let keep = buffer.insert("reading", sample_point());
        let drop = buffer.insert("reading", sample_point());

        buffer.remove(&drop);

        assert!(buffer.get(&keep).is_some());
        assert!(buffer.get(&drop).is_none());
    }

    #[test]
    fn test_expired_entry_absent_on_access() {
        let buffer = WriteBuffer::new(Duration::ZERO);
        let key = buffer.insert("reading", sample_point());

        assert!(buffer.get(&key).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_snapshot_sweeps_expired_entries() {
        let buffer = WriteBuffer::new(Duration::ZERO);
        buffer.insert("reading", sample_point());
        buffer.insert("reading", sample_point());

        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_snapshot_returns_live_entries() {
        let buffer = WriteBuffer::new(Duration::from_secs(60));
        let key = buffer.insert("recovery", sample_point());

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, key);
        assert_eq!(snapshot[0].1, sample_point());
    }
}
