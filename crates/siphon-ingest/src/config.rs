use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use siphon_clickhouse::ClickHouseConfig;
use siphon_mqtt::BrokerConfig;
use siphon_postgres::PostgresConfig;

/// Service configuration, read from `SIPHON_`-prefixed environment
/// variables.
///
/// Fields without a serde default are required; a missing broker credential
/// or geocoding URL fails `from_env` and the process never starts
/// half-configured.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // MQTT broker
    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,

    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    /// Broker username; required.
    pub mqtt_username: String,

    /// Broker password; required.
    pub mqtt_password: String,

    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    /// Shared-subscription group; instances in the same group split the feed.
    #[serde(default = "default_subscription_group")]
    pub subscription_group: String,

    // PostgreSQL
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default)]
    pub postgres_password: String,

    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,

    // ClickHouse
    #[serde(default = "default_clickhouse_url")]
    pub clickhouse_url: String,

    #[serde(default = "default_clickhouse_database")]
    pub clickhouse_database: String,

    #[serde(default = "default_clickhouse_username")]
    pub clickhouse_username: String,

    #[serde(default)]
    pub clickhouse_password: String,

    #[serde(default = "default_clickhouse_table")]
    pub clickhouse_table: String,

    /// Geocoding endpoint base URL, postal code appended verbatim; required.
    pub geocode_api_url: String,

    // Background task intervals
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,

    #[serde(default = "default_enrichment_interval_secs")]
    pub enrichment_interval_secs: u64,

    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,

    /// How long a failed write stays retryable in the local buffer.
    #[serde(default = "default_buffer_ttl_hours")]
    pub buffer_ttl_hours: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_client_id() -> String {
    "siphon-ingest".to_string()
}

fn default_mqtt_keep_alive_secs() -> u64 {
    30
}

fn default_subscription_group() -> String {
    "siphon-ingest".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "siphon".to_string()
}

fn default_postgres_username() -> String {
    "siphon".to_string()
}

fn default_postgres_pool_size() -> usize {
    8
}

fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_clickhouse_database() -> String {
    "siphon".to_string()
}

fn default_clickhouse_username() -> String {
    "default".to_string()
}

fn default_clickhouse_table() -> String {
    "sensor_readings".to_string()
}

fn default_drain_interval_secs() -> u64 {
    30
}

fn default_enrichment_interval_secs() -> u64 {
    60
}

fn default_rate_limit_backoff_secs() -> u64 {
    900
}

fn default_buffer_ttl_hours() -> u64 {
    24
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("SIPHON"))
            .build()?
            .try_deserialize()
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.mqtt_host.clone(),
            port: self.mqtt_port,
            client_id: self.mqtt_client_id.clone(),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            keep_alive_secs: self.mqtt_keep_alive_secs,
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_pool_size,
        }
    }

    pub fn clickhouse_config(&self) -> ClickHouseConfig {
        ClickHouseConfig {
            url: self.clickhouse_url.clone(),
            database: self.clickhouse_database.clone(),
            username: self.clickhouse_username.clone(),
            password: self.clickhouse_password.clone(),
            table: self.clickhouse_table.clone(),
        }
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn enrichment_interval(&self) -> Duration {
        Duration::from_secs(self.enrichment_interval_secs)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }

    pub fn buffer_ttl(&self) -> Duration {
        Duration::from_secs(self.buffer_ttl_hours * 60 * 60)
    }
}
