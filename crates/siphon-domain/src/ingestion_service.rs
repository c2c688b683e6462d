use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use siphon_payload::Reading;
use tracing::debug;

use crate::buffered_writer::BufferedReadingWriter;
use crate::error::DomainResult;
use crate::types::{DataPoint, FieldValue, TopicSetting};

/// Category tags for buffered writes, kept distinct so operators can tell a
/// parked live reading from a parked backfill entry.
const CATEGORY_READING: &str = "reading";
const CATEGORY_RECOVERY: &str = "recovery";

/// Inbound port for decoded broker messages.
/// The subscriber dispatches through this trait; `IngestionService`
/// implements it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReadingIngestor: Send + Sync {
    async fn handle_message(&self, setting: &TopicSetting, payload: &[u8]) -> DomainResult<()>;
}

/// Domain service between the codec and the write path.
///
/// Decodes one broker message, converts the primary reading and any recovery
/// entries into time-series points, and hands every point to the buffered
/// writer. Nothing here propagates a storage error back to the subscriber
/// loop; only decode failures surface, and the caller logs and drops those.
pub struct IngestionService {
    writer: Arc<BufferedReadingWriter>,
}

impl IngestionService {
    pub fn new(writer: Arc<BufferedReadingWriter>) -> Self {
        Self { writer }
    }

    fn build_point(
        setting: &TopicSetting,
        reading: &Reading,
        value: f64,
        received_at: DateTime<Utc>,
    ) -> DataPoint {
        let mut tags = BTreeMap::new();
        tags.insert("sensor".to_string(), setting.sensor_name.clone());
        tags.insert("location".to_string(), setting.location.clone());

        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), FieldValue::Float(value));
        if let Some(sequence) = reading.sequence {
            fields.insert("sequence".to_string(), FieldValue::Integer(sequence));
        }

        let timestamp = reading
            .timestamp
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(received_at);

        DataPoint {
            measurement: setting.sensor_type.clone(),
            tags,
            fields,
            timestamp,
        }
    }
}

#[async_trait]
impl ReadingIngestor for IngestionService {
    async fn handle_message(&self, setting: &TopicSetting, payload: &[u8]) -> DomainResult<()> {
        let decoded = siphon_payload::decode(payload)?;
        let received_at = Utc::now();

        let primary = &decoded.reading;
        match primary.value {
            Some(value) => {
                let point = Self::build_point(setting, primary, value, received_at);
                self.writer.write(CATEGORY_READING, point).await;
            }
            None => {
                // Placeholder primary reading; any data rides in the batch.
                debug!(
                    sensor = %setting.sensor_name,
                    "primary reading has no value, skipping"
                );
            }
        }

        if let Some(batch) = &decoded.recovery {
            let mut written = 0usize;
            let mut duplicates = 0usize;

            for entry in batch.readings() {
                // An entry carrying the just-received primary sequence is a
                // duplicate of the live reading, not a gap-fill.
                if entry.sequence.is_some() && entry.sequence == primary.sequence {
                    duplicates += 1;
                    continue;
                }
                let Some(value) = entry.value else {
                    continue;
                };
                let point = Self::build_point(setting, &entry, value, received_at);
                self.writer.write(CATEGORY_RECOVERY, point).await;
                written += 1;
            }

            debug!(
                sensor = %setting.sensor_name,
                entries = batch.len(),
                written,
                duplicates,
                "processed recovery batch"
            );
        }

        Ok(())
    }
}
