use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One logical sensor feed, as configured in the relational store.
///
/// Read once at subscribe time; a settings change requires resubscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSetting {
    pub group_id: String,
    pub sensor_type: String,
    pub sensor_name: String,
    pub location: String,
    pub default_topic_path: String,
    /// The feed may emit backfill batches on its `/recovered` topic.
    pub has_recovery: bool,
}

/// One typed field value of a time-series write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

/// A fully-constructed time-series write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

/// One geocoded postal code row.
///
/// A row is available for lease iff `locked_until` is null or in the past.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMapping {
    pub postal_code: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Input for creating a coordinate mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCoordinateMapping {
    pub postal_code: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
}
