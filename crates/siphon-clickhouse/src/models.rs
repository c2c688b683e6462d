use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

/// Database row for one sensor reading.
///
/// Tags and fields are JSON objects stored as String columns.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ReadingRow {
    pub measurement: String,
    pub tags: String,
    pub fields: String,
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub ts: DateTime<Utc>,
}
