use async_trait::async_trait;
use tracing::debug;

use siphon_domain::repository::TopicSettingRepository;
use siphon_domain::{DomainError, DomainResult, TopicSetting};

use crate::client::PostgresClient;
use crate::models::TopicSettingRow;

/// PostgreSQL implementation of the TopicSettingRepository trait.
#[derive(Clone)]
pub struct PostgresTopicSettingRepository {
    client: PostgresClient,
}

impl PostgresTopicSettingRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TopicSettingRepository for PostgresTopicSettingRepository {
    async fn list_topic_settings(&self) -> DomainResult<Vec<TopicSetting>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::Repository)?;

        let rows = conn
            .query(
                "SELECT group_id, sensor_type, sensor_name, location,
                        default_topic_path, has_recovery
                 FROM topic_settings
                 ORDER BY group_id, sensor_name",
                &[],
            )
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        let settings = rows
            .iter()
            .map(|row| {
                let setting_row = TopicSettingRow {
                    group_id: row.get(0),
                    sensor_type: row.get(1),
                    sensor_name: row.get(2),
                    location: row.get(3),
                    default_topic_path: row.get(4),
                    has_recovery: row.get(5),
                };
                setting_row.into()
            })
            .collect::<Vec<TopicSetting>>();

        debug!("loaded {} topic settings", settings.len());

        Ok(settings)
    }
}
