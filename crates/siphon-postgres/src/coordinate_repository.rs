use async_trait::async_trait;
use tracing::debug;

use siphon_domain::repository::CoordinateMappingRepository;
use siphon_domain::{CoordinateMapping, DomainError, DomainResult, NewCoordinateMapping};

use crate::client::PostgresClient;
use crate::models::CoordinateMappingRow;

/// Rows whose lease is absent or expired, never-used rows first. The
/// skip-locked read keeps concurrent claimers from blocking on, or
/// double-selecting, the same row.
const ACQUIRE_SQL: &str = "SELECT postal_code, location, latitude, longitude, last_used, locked_until
     FROM coordinate_mappings
     WHERE locked_until IS NULL OR locked_until < now()
     ORDER BY last_used ASC NULLS FIRST
     LIMIT 1
     FOR UPDATE SKIP LOCKED";

/// PostgreSQL implementation of the CoordinateMappingRepository trait.
///
/// Row-level locking is the sole synchronization boundary across process
/// instances; no process-local lock augments it, because other instances
/// would be invisible to one.
#[derive(Clone)]
pub struct PostgresCoordinateRepository {
    client: PostgresClient,
}

impl PostgresCoordinateRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CoordinateMappingRepository for PostgresCoordinateRepository {
    async fn find_mapping(&self, postal_code: &str) -> DomainResult<Option<CoordinateMapping>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::Repository)?;

        let row = conn
            .query_opt(
                "SELECT postal_code, location, latitude, longitude, last_used, locked_until
                 FROM coordinate_mappings
                 WHERE postal_code = $1",
                &[&postal_code],
            )
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        Ok(row.map(|row| {
            let mapping_row = CoordinateMappingRow {
                postal_code: row.get(0),
                location: row.get(1),
                latitude: row.get(2),
                longitude: row.get(3),
                last_used: row.get(4),
                locked_until: row.get(5),
            };
            mapping_row.into()
        }))
    }

    async fn insert_mapping_if_absent(
        &self,
        mapping: &NewCoordinateMapping,
    ) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::Repository)?;

        let inserted = conn
            .execute(
                "INSERT INTO coordinate_mappings (postal_code, location, latitude, longitude)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (postal_code) DO NOTHING",
                &[
                    &mapping.postal_code,
                    &mapping.location,
                    &mapping.latitude,
                    &mapping.longitude,
                ],
            )
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        debug!(
            postal_code = %mapping.postal_code,
            created = inserted == 1,
            "insert-if-absent coordinate mapping"
        );

        Ok(inserted == 1)
    }

    async fn acquire_lease(&self) -> DomainResult<Option<CoordinateMapping>> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::Repository)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        let row = tx
            .query_opt(ACQUIRE_SQL, &[])
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        let Some(row) = row else {
            // Every row is currently owned: the expected steady state, not
            // an error. Commit the no-op transaction.
            tx.commit()
                .await
                .map_err(|e| DomainError::Repository(e.into()))?;
            return Ok(None);
        };

        let postal_code: String = row.get(0);

        // Long enough for one geocoding call with margin, short enough that
        // a crashed worker strands the row for at most a minute.
        let stamped = tx
            .query_one(
                "UPDATE coordinate_mappings
                 SET last_used = now(), locked_until = now() + interval '1 minute'
                 WHERE postal_code = $1
                 RETURNING last_used, locked_until",
                &[&postal_code],
            )
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        let mapping_row = CoordinateMappingRow {
            postal_code,
            location: row.get(1),
            latitude: row.get(2),
            longitude: row.get(3),
            last_used: stamped.get(0),
            locked_until: stamped.get(1),
        };

        tx.commit()
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        debug!(postal_code = %mapping_row.postal_code, "acquired coordinate lease");

        Ok(Some(mapping_row.into()))
    }

    async fn update_coordinates(
        &self,
        postal_code: &str,
        location: &str,
        latitude: f64,
        longitude: f64,
    ) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::Repository)?;

        conn.execute(
            "UPDATE coordinate_mappings
             SET location = $2, latitude = $3, longitude = $4
             WHERE postal_code = $1",
            &[&postal_code, &location, &latitude, &longitude],
        )
        .await
        .map_err(|e| DomainError::Repository(e.into()))?;

        Ok(())
    }
}
