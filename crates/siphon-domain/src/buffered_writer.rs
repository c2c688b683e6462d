use std::sync::Arc;

use tracing::{debug, warn};

use crate::repository::ReadingStore;
use crate::types::DataPoint;
use crate::write_buffer::WriteBuffer;

/// Time-series write path that favors availability over immediate durability.
///
/// A failed store write parks the fully-built point in the local buffer and
/// the call still returns normally, so the broker consumer keeps draining
/// the feed while the store is unreachable. Only failures touch the buffer;
/// successful writes bypass it entirely.
pub struct BufferedReadingWriter {
    store: Arc<dyn ReadingStore>,
    buffer: Arc<WriteBuffer>,
}

impl BufferedReadingWriter {
    pub fn new(store: Arc<dyn ReadingStore>, buffer: Arc<WriteBuffer>) -> Self {
        Self { store, buffer }
    }

    /// Write a point, buffering it under `category` on failure. Never errors.
    pub async fn write(&self, category: &str, point: DataPoint) {
        match self.store.write_point(&point).await {
            Ok(()) => {
                debug!(
                    measurement = %point.measurement,
                    "wrote point to time-series store"
                );
            }
            Err(e) => {
                let key = self.buffer.insert(category, point);
                warn!(
                    error = %e,
                    key = %key,
                    "store write failed, point buffered for retry"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::time::Duration;

    use crate::repository::MockReadingStore;
    use crate::types::FieldValue;
    use crate::DomainError;

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

    #[tokio::test]
    async fn test_successful_write_bypasses_buffer() {
        let mut store = MockReadingStore::new();
        store.expect_write_point().times(1).returning(|_| Ok(()));

        let buffer = Arc::new(WriteBuffer::new(Duration::from_secs(60)));
        let writer = BufferedReadingWriter::new(Arc::new(store), buffer.clone());

        writer.write("reading", sample_point()).await;

        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_is_buffered_not_raised() {
        let mut store = MockReadingStore::new();
        store
            .expect_write_point()
            .times(1)
            .returning(|_| Err(DomainError::Repository(anyhow::anyhow!("store down"))));

        let buffer = Arc::new(WriteBuffer::new(Duration::from_secs(60)));
        let writer = BufferedReadingWriter::new(Arc::new(store), buffer.clone());

        // Must not panic or surface the store error.
        writer.write("reading", sample_point()).await;

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1, sample_point());
        assert!(snapshot[0].0.starts_with("reading:"));
    }

    #[tokio::test]
    async fn test_each_failure_buffers_its_own_entry() {
        let mut store = MockReadingStore::new();
        store
            .expect_write_point()
            .times(2)
            .returning(|_| Err(DomainError::Repository(anyhow::anyhow!("store down"))));

        let buffer = Arc::new(WriteBuffer::new(Duration::from_secs(60)));
        let writer = BufferedReadingWriter::new(Arc::new(store), buffer.clone());

        writer.write("reading", sample_point()).await;
        writer.write("reading", sample_point()).await;

        assert_eq!(buffer.len(), 2);
    }
}
