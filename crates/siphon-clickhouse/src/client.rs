use anyhow::Result;
use clickhouse::Client;

use crate::config::ClickHouseConfig;

#[derive(Clone)]
pub struct ClickHouseClient {
    client: Client,
}

impl ClickHouseClient {
    pub fn new(config: &ClickHouseConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.username)
            .with_password(&config.password)
            .with_compression(clickhouse::Compression::Lz4);

        Self { client }
    }

    pub async fn ping(&self) -> Result<()> {
        self.client.query("SELECT 1").fetch_one::<u8>().await?;
        Ok(())
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}
