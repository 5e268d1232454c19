// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport backed by `rumqttc`.
//!
//! The broker connection owns a background task polling the `rumqttc` event
//! loop. Connection transitions and inbound publishes are forwarded as
//! [`TransportEvent`]s through the channel returned by
//! [`MqttBrokerBuilder::build`]. When the connection drops, the task waits
//! for the reconnect delay and keeps polling, which makes `rumqttc`
//! reconnect.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ledsync_lib::protocol::{Gateway, MqttBroker};
//!
//! # async fn example() -> ledsync_lib::Result<()> {
//! let (broker, events) = MqttBroker::builder()
//!     .host("192.168.1.50")
//!     .port(1883)
//!     .credentials("user", "password")
//!     .build()
//!     .await?;
//!
//! let gateway = Arc::new(Gateway::new(Arc::new(broker), "ledsync"));
//! gateway.spawn(events);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, oneshot};

use crate::error::{ProtocolError, Result};

use super::transport::{Transport, TransportEvent};

/// Global counter for generating unique client IDs.
static BROKER_CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Configuration for an MQTT broker connection.
#[derive(Debug, Clone)]
pub struct MqttBrokerConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connection_timeout: Duration,
    reconnect_delay: Duration,
    client_id_prefix: String,
    event_capacity: usize,
}

impl Default for MqttBrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            client_id_prefix: "ledsync".to_string(),
            event_capacity: 256,
        }
    }
}

/// A connection to an MQTT broker.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct MqttBroker {
    inner: Arc<MqttBrokerInner>,
}

struct MqttBrokerInner {
    client: AsyncClient,
    config: MqttBrokerConfig,
    connected: AtomicBool,
}

impl MqttBroker {
    /// Creates a new builder for configuring an MQTT broker connection.
    #[must_use]
    pub fn builder() -> MqttBrokerBuilder {
        MqttBrokerBuilder::default()
    }

    /// Returns the host address of the broker.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Returns the port of the broker.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Returns whether authentication is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.inner.config.credentials.is_some()
    }

    /// Disconnects from the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<()> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );
        self.inner
            .client
            .disconnect()
            .await
            .map_err(ProtocolError::Mqtt)?;
        self.inner.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl Transport for MqttBroker {
    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.inner
            .client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(ProtocolError::Mqtt)?;
        tracing::debug!(topic = %topic, "Subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        self.inner
            .client
            .unsubscribe(topic)
            .await
            .map_err(ProtocolError::Mqtt)?;
        tracing::debug!(topic = %topic, "Unsubscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.inner
            .client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .await
            .map_err(ProtocolError::Mqtt)?;
        Ok(())
    }
}

impl std::fmt::Debug for MqttBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBroker")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for creating an MQTT broker connection.
///
/// # Examples
///
/// ```no_run
/// use ledsync_lib::protocol::MqttBroker;
/// use std::time::Duration;
///
/// # async fn example() -> ledsync_lib::Result<()> {
/// let (broker, events) = MqttBroker::builder()
///     .host("192.168.1.50")
///     .keep_alive(Duration::from_secs(60))
///     .reconnect_delay(Duration::from_secs(2))
///     .client_id_prefix("hub")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MqttBrokerBuilder {
    config: MqttBrokerConfig,
}

impl MqttBrokerBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the timeout for the first connection (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the pause before polling again after a connection error
    /// (default: 5 seconds).
    #[must_use]
    pub fn reconnect_delay(mut self, duration: Duration) -> Self {
        self.config.reconnect_delay = duration;
        self
    }

    /// Sets the prefix of the generated client id (default: `ledsync`).
    #[must_use]
    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.client_id_prefix = prefix.into();
        self
    }

    /// Sets the capacity of the transport event channel (default: 256).
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    /// Builds and connects to the MQTT broker.
    ///
    /// Returns the broker handle and the receiver of its transport events.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host is not set
    /// - Connection fails
    /// - Connection times out
    pub async fn build(self) -> Result<(MqttBroker, mpsc::Receiver<TransportEvent>)> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            )
            .into());
        }

        let counter = BROKER_CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!(
            "{}_{}_{}",
            self.config.client_id_prefix,
            std::process::id(),
            counter
        );

        let mut mqtt_options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);

        let broker = MqttBroker {
            inner: Arc::new(MqttBrokerInner {
                client,
                config: self.config.clone(),
                connected: AtomicBool::new(false),
            }),
        };

        let (events_tx, events_rx) = mpsc::channel(self.config.event_capacity);
        let (connack_tx, connack_rx) = oneshot::channel();

        tokio::spawn(handle_broker_events(
            event_loop,
            broker.clone(),
            events_tx,
            connack_tx,
        ));

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    client_id = %client_id,
                    "Connected to MQTT broker"
                );
                Ok((broker, events_rx))
            }
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(
                "MQTT event loop terminated unexpectedly".to_string(),
            )
            .into()),
            Err(_) => Err(ProtocolError::ConnectionFailed(format!(
                "MQTT connection timeout after {}s",
                timeout.as_secs()
            ))
            .into()),
        }
    }
}

/// Polls the `rumqttc` event loop until the event receiver is dropped.
async fn handle_broker_events(
    mut event_loop: EventLoop,
    broker: MqttBroker,
    events: mpsc::Sender<TransportEvent>,
    connack_tx: oneshot::Sender<()>,
) {
    let mut connack_tx = Some(connack_tx);
    let reconnect_delay = broker.inner.config.reconnect_delay;

    loop {
        if events.is_closed() {
            tracing::debug!("Transport event receiver dropped, stopping MQTT event loop");
            break;
        }

        let event = match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                broker.inner.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
                Some(TransportEvent::Connected)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::trace!(topic = %publish.topic, "MQTT message received");
                Some(TransportEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                })
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                mark_disconnected(&broker)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::error!(error = %e, "MQTT broker event loop error");
                let event = mark_disconnected(&broker);
                if let Some(event) = event
                    && events.send(event).await.is_err()
                {
                    break;
                }
                tokio::time::sleep(reconnect_delay).await;
                continue;
            }
        };

        if let Some(event) = event
            && events.send(event).await.is_err()
        {
            break;
        }
    }

    broker.inner.connected.store(false, Ordering::Release);
}

/// Clears the connected flag. Returns the event to emit if it was set.
fn mark_disconnected(broker: &MqttBroker) -> Option<TransportEvent> {
    broker
        .inner
        .connected
        .swap(false, Ordering::AcqRel)
        .then_some(TransportEvent::Disconnected)
}
