use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Event, EventLoop};
use siphon_domain::repository::TopicSettingRepository;
use siphon_domain::{DomainError, DomainResult, ReadingIngestor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::connection::BrokerConnection;
use crate::topic::{shared_subscription, TopicIndex};

/// Subscribes the configured feeds and pumps broker messages into the
/// ingestion service.
///
/// One message handler serves the whole client: every publish is resolved to
/// its owning setting via the topic index built at subscribe time. A failure
/// on one message is logged and the message dropped; the loop itself only
/// exits on cancellation or when the very first connection attempt is
/// refused (a configuration error, not a transient one).
pub struct TopicSubscriber {
    connection: Arc<BrokerConnection>,
    settings: Arc<dyn TopicSettingRepository>,
    ingestor: Arc<dyn ReadingIngestor>,
    subscription_group: String,
}

impl TopicSubscriber {
    pub fn new(
        connection: Arc<BrokerConnection>,
        settings: Arc<dyn TopicSettingRepository>,
        ingestor: Arc<dyn ReadingIngestor>,
        subscription_group: String,
    ) -> Self {
        Self {
            connection,
            settings,
            ingestor,
            subscription_group,
        }
    }

    /// Load all topic settings and subscribe their topics under the shared
    /// subscription group, so concurrent service instances each receive a
    /// disjoint share of one logical feed.
    ///
    /// Settings are read once here; changing them requires resubscription.
    pub async fn subscribe_to_topics(&self) -> DomainResult<TopicIndex> {
        let settings = self.settings.list_topic_settings().await?;
        info!(feeds = settings.len(), "loaded topic settings");

        let index = TopicIndex::from_settings(settings);
        self.issue_subscriptions(&index)
            .await
            .map_err(DomainError::Repository)?;

        info!(
            topics = index.len(),
            group = %self.subscription_group,
            "subscribed to sensor topics"
        );
        Ok(index)
    }

    async fn issue_subscriptions(&self, index: &TopicIndex) -> Result<()> {
        for topic in index.topics() {
            let filter = shared_subscription(&self.subscription_group, topic);
            self.connection
                .client()
                .subscribe(filter, QoS::AtLeastOnce)
                .await
                .with_context(|| format!("failed to subscribe to topic: {}", topic))?;
            debug!(topic, "subscription queued");
        }
        Ok(())
    }

    /// Drive the broker event loop until cancelled.
    pub async fn run(
        &self,
        mut eventloop: EventLoop,
        index: TopicIndex,
        ctx: CancellationToken,
    ) -> Result<()> {
        info!("starting MQTT subscriber loop");
        let mut ever_connected = false;

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("shutdown signal received, stopping subscriber");
                    if let Err(e) = self.connection.disconnect().await {
                        warn!(error = %e, "error while disconnecting from broker");
                    }
                    return Ok(());
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        self.connection.mark_connected();
                        if ever_connected {
                            // Clean-start session: the broker forgot our
                            // subscriptions across the reconnect.
                            info!("reconnected to MQTT broker, resubscribing");
                            if let Err(e) = self.issue_subscriptions(&index).await {
                                warn!(error = %e, "resubscription failed");
                            }
                        } else {
                            info!("connected to MQTT broker");
                        }
                        ever_connected = true;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match std::str::from_utf8(&publish.topic) {
                            Ok(topic) => {
                                dispatch_publish(
                                    self.ingestor.as_ref(),
                                    &index,
                                    topic,
                                    &publish.payload,
                                )
                                .await;
                            }
                            Err(_) => {
                                warn!("received publish with non-UTF-8 topic, dropping");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.connection.mark_disconnected();
                        if !ever_connected {
                            // The first dial never succeeded: bad address or
                            // bad credentials, either way not retryable.
                            return Err(anyhow!(e)
                                .context("initial MQTT connection failed, check broker address and credentials"));
                        }
                        warn!(error = %e, "MQTT connection error, reconnecting");
                        tokio::select! {
                            _ = ctx.cancelled() => return Ok(()),
                            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                        }
                    }
                }
            }
        }
    }
}

/// Resolve one publish to its owning setting and hand it to the ingestor.
///
/// Never returns an error: an unknown topic or a failed message is logged
/// and dropped so one poison message cannot take the subscription down.
pub(crate) async fn dispatch_publish(
    ingestor: &dyn ReadingIngestor,
    index: &TopicIndex,
    topic: &str,
    payload: &[u8],
) {
    let span = info_span!(
        "broker_message",
        topic = %topic,
        payload_size = payload.len(),
    );

    async {
        let Some(setting) = index.resolve(topic) else {
            warn!("no topic setting registered for topic, dropping message");
            return;
        };

        if let Err(e) = ingestor.handle_message(setting, payload).await {
            error!(
                error = %e,
                sensor = %setting.sensor_name,
                "failed to process message, dropping"
            );
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use siphon_domain::{MockReadingIngestor, TopicSetting};

    fn garden_setting() -> TopicSetting {
        TopicSetting {
            group_id: "grp-1".to_string(),
            sensor_type: "temperature".to_string(),
            sensor_name: "garden-01".to_string(),
            location: "backyard".to_string(),
            default_topic_path: "sensors".to_string(),
            has_recovery: true,
        }
    }

    #[tokio::test]
    async fn test_dispatch_known_topic_reaches_ingestor() {
        let mut ingestor = MockReadingIngestor::new();
        ingestor
            .expect_handle_message()
            .withf(|setting: &TopicSetting, payload: &[u8]| {
                setting.sensor_name == "garden-01" && payload == br#"{"value":21.3}"#
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let index = TopicIndex::from_settings(vec![garden_setting()]);

        dispatch_publish(
            &ingestor,
            &index,
            "sensors/grp-1/temperature/garden-01",
            br#"{"value":21.3}"#,
        )
        .await;
    }

    #[tokio::test]
    async fn test_dispatch_recovered_topic_reaches_same_setting() {
        let mut ingestor = MockReadingIngestor::new();
        ingestor
            .expect_handle_message()
            .withf(|setting: &TopicSetting, _: &[u8]| setting.sensor_name == "garden-01")
            .times(1)
            .returning(|_, _| Ok(()));

        let index = TopicIndex::from_settings(vec![garden_setting()]);

        dispatch_publish(
            &ingestor,
            &index,
            "sensors/grp-1/temperature/garden-01/recovered",
            br#"{"value":null,"meta":{"t":[1700000000],"v":[20.1],"s":[5]}}"#,
        )
        .await;
    }

    #[tokio::test]
    async fn test_dispatch_unknown_topic_is_dropped() {
        let mut ingestor = MockReadingIngestor::new();
        ingestor.expect_handle_message().times(0);

        let index = TopicIndex::from_settings(vec![garden_setting()]);

        dispatch_publish(&ingestor, &index, "sensors/unknown/topic/x", b"{}").await;
    }

    #[tokio::test]
    async fn test_dispatch_survives_ingestor_error() {
        let mut ingestor = MockReadingIngestor::new();
        ingestor
            .expect_handle_message()
            .times(1)
            .returning(|_, _| Err(DomainError::SettingNotFound("garden-01".to_string())));

        let index = TopicIndex::from_settings(vec![garden_setting()]);

        // Must not panic or propagate: poison-message isolation.
        dispatch_publish(
            &ingestor,
            &index,
            "sensors/grp-1/temperature/garden-01",
            b"not json",
        )
        .await;
    }
}
