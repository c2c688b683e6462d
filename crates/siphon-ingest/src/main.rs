mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use siphon_clickhouse::{ClickHouseClient, ClickHouseReadingStore};
use siphon_domain::repository::ReadingStore;
use siphon_domain::{
    BufferedReadingWriter, EnrichmentService, EnrichmentWorker, IngestionService, ReadingIngestor,
    RetryDrainer, WriteBuffer,
};
use siphon_geocode::GeocodeClient;
use siphon_mqtt::{BrokerConnection, TopicSubscriber};
use siphon_postgres::{
    PostgresClient, PostgresCoordinateRepository, PostgresTopicSettingRepository,
};
use siphon_runner::Runner;

use config::ServiceConfig;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    telemetry::init_tracing(&config.log_level);
    info!("starting siphon-ingest");

    if let Err(e) = run(config).await {
        error!("service exited with error: {:#}", e);
        std::process::exit(1);
    }

    info!("service exited normally");
}

async fn run(config: ServiceConfig) -> Result<()> {
    // Relational store: settings and coordinate mappings. Unreachable
    // Postgres at startup is fatal, the subscriber cannot learn its topics.
    let postgres = PostgresClient::new(&config.postgres_config())?;
    postgres
        .ping()
        .await
        .context("postgres is unreachable at startup")?;

    // Time-series store. Deliberately not pinged: ingestion must start and
    // buffer even while the store is down.
    let clickhouse = ClickHouseClient::new(&config.clickhouse_config());
    let store: Arc<dyn ReadingStore> = Arc::new(ClickHouseReadingStore::new(
        clickhouse,
        config.clickhouse_table.clone(),
    ));

    let buffer = Arc::new(WriteBuffer::new(config.buffer_ttl()));
    let writer = Arc::new(BufferedReadingWriter::new(store.clone(), buffer.clone()));
    let ingestor: Arc<dyn ReadingIngestor> = Arc::new(IngestionService::new(writer));

    let settings = Arc::new(PostgresTopicSettingRepository::new(postgres.clone()));
    let (connection, eventloop) = BrokerConnection::connect(&config.broker_config());
    let connection = Arc::new(connection);

    let subscriber = TopicSubscriber::new(
        connection,
        settings,
        ingestor,
        config.subscription_group.clone(),
    );
    let index = subscriber.subscribe_to_topics().await?;

    let drainer = RetryDrainer::new(store, buffer, config.drain_interval());

    let mappings = Arc::new(PostgresCoordinateRepository::new(postgres.clone()));
    let geocoder = Arc::new(GeocodeClient::new(&config.geocode_api_url)?);
    let enrichment = Arc::new(EnrichmentService::new(mappings, geocoder));
    let worker = EnrichmentWorker::new(
        enrichment,
        config.enrichment_interval(),
        config.rate_limit_backoff(),
    );

    Runner::new()
        .with_process("mqtt-subscriber", move |ctx| async move {
            subscriber.run(eventloop, index, ctx).await
        })
        .with_process("retry-drainer", move |ctx| async move {
            drainer.run(ctx).await
        })
        .with_process("enrichment-worker", move |ctx| async move {
            worker.run(ctx).await
        })
        .run()
        .await
}
