use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rumqttc::v5::{AsyncClient, EventLoop, MqttOptions};
use serde::Deserialize;
use tracing::info;

/// Broker connection settings.
///
/// Credentials are required: the config layer refuses to start the process
/// without them, so an unauthenticated client never reaches the broker.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive_secs: u64,
}

/// Owns the MQTT client half of the connection.
///
/// The protocol is fixed at v5 — shared subscriptions (`$share/...`) are the
/// mechanism that lets multiple service instances split one logical feed.
/// Reconnects happen inside the event loop: after a drop, the next poll
/// redials with the options captured here; a failed redial is logged by the
/// subscriber and retried on the following poll, never escalated.
pub struct BrokerConnection {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl BrokerConnection {
    /// Build the client and event loop. The TCP/MQTT handshake itself runs
    /// on the first `EventLoop::poll`.
    pub fn connect(config: &BrokerConfig) -> (Self, EventLoop) {
        info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            "configuring MQTT connection"
        );

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_credentials(&config.username, &config.password);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_start(true);

        // Subscriptions are queued before the event loop first polls; the
        // request channel must hold them all without blocking.
        let (client, eventloop) = AsyncClient::new(options, 1024);

        (
            Self {
                client,
                connected: Arc::new(AtomicBool::new(false)),
            },
            eventloop,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub(crate) fn client(&self) -> &AsyncClient {
        &self.client
    }

    /// Send the MQTT Disconnect packet.
    pub async fn disconnect(&self) -> Result<()> {
        self.mark_disconnected();
        self.client
            .disconnect()
            .await
            .context("failed to disconnect from MQTT broker")?;
        info!("disconnected from MQTT broker");
        Ok(())
    }
}
