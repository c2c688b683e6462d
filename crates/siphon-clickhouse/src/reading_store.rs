use async_trait::async_trait;
use tracing::debug;

use siphon_domain::repository::ReadingStore;
use siphon_domain::{DataPoint, DomainError, DomainResult};

use crate::client::ClickHouseClient;
use crate::models::ReadingRow;

/// ClickHouse implementation of the ReadingStore trait.
///
/// The store offers no transactional guarantee; durability under failure is
/// the buffered write path's responsibility, so errors here simply propagate
/// to the caller that buffers.
#[derive(Clone)]
pub struct ClickHouseReadingStore {
    client: ClickHouseClient,
    table: String,
}

impl ClickHouseReadingStore {
    pub fn new(client: ClickHouseClient, table: String) -> Self {
        Self { client, table }
    }

    fn to_row(point: &DataPoint) -> DomainResult<ReadingRow> {
        Ok(ReadingRow {
            measurement: point.measurement.clone(),
            tags: serde_json::to_string(&point.tags)
                .map_err(|e| DomainError::Repository(e.into()))?,
            fields: serde_json::to_string(&point.fields)
                .map_err(|e| DomainError::Repository(e.into()))?,
            ts: point.timestamp,
        })
    }
}

#[async_trait]
impl ReadingStore for ClickHouseReadingStore {
    async fn write_point(&self, point: &DataPoint) -> DomainResult<()> {
        let row = Self::to_row(point)?;

        let mut insert = self
            .client
            .get_client()
            .insert::<ReadingRow>(&self.table)
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        insert
            .write(&row)
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;
        insert
            .end()
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        debug!(
            measurement = %row.measurement,
            ts = %row.ts,
            "inserted reading row"
        );

        Ok(())
    }
}
