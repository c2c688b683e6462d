use chrono::{DateTime, Utc};
use siphon_domain::{CoordinateMapping, TopicSetting};

/// Database row for one configured sensor feed.
#[derive(Debug, Clone)]
pub struct TopicSettingRow {
    pub group_id: String,
    pub sensor_type: String,
    pub sensor_name: String,
    pub location: String,
    pub default_topic_path: String,
    pub has_recovery: bool,
}

impl From<TopicSettingRow> for TopicSetting {
    fn from(row: TopicSettingRow) -> Self {
        TopicSetting {
            group_id: row.group_id,
            sensor_type: row.sensor_type,
            sensor_name: row.sensor_name,
            location: row.location,
            default_topic_path: row.default_topic_path,
            has_recovery: row.has_recovery,
        }
    }
}

/// Database row for one geocoded postal code.
#[derive(Debug, Clone)]
pub struct CoordinateMappingRow {
    pub postal_code: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl From<CoordinateMappingRow> for CoordinateMapping {
    fn from(row: CoordinateMappingRow) -> Self {
        CoordinateMapping {
            postal_code: row.postal_code,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            last_used: row.last_used,
            locked_until: row.locked_until,
        }
    }
}
