// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message bus gateway.
//!
//! The [`Gateway`] is the only component that talks to the [`Transport`].
//! Outbound it subscribes, unsubscribes and publishes; inbound it decodes
//! topics and payloads into [`GatewayEvent`]s for its listeners.
//!
//! # Architecture
//!
//! ```text
//! TransportEvent::Message { "ledsync/L1/state", {...} }
//!                     ↓
//!         Gateway::handle_transport_event()
//!                     ↓
//!      Topics::decode() + InboundMessage::decode()
//!                     ↓
//!   pending (L1, mutationId)?  ──yes──→ ResponseListener
//!                     │ no
//!                     ↓
//!     ListenerRegistry::dispatch(StateMessage)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, ProtocolError, Result};
use crate::event::DeviceId;

use super::listeners::{GatewayEvent, GatewayEventKind, ListenerId, ListenerRegistry};
use super::message::{
    CommandMessage, ConnectedMessage, DeviceInfo, EffectListMessage, InboundMessage, StateMessage,
};
use super::topic::{MessageKind, Topics};
use super::transport::{Transport, TransportEvent};

/// Payload of the broadcast discovery ping.
pub const DISCOVERY_PING: &[u8] = br#"{"discover":true}"#;

type ResponseKey = (DeviceId, u32);

/// Keyed one-shot listeners waiting for a correlated state report.
#[derive(Debug, Default)]
struct ResponseTable {
    next_token: AtomicU64,
    pending: Mutex<HashMap<ResponseKey, (u64, oneshot::Sender<StateMessage>)>>,
}

impl ResponseTable {
    fn take(&self, key: &ResponseKey) -> Option<oneshot::Sender<StateMessage>> {
        self.pending.lock().remove(key).map(|(_, sender)| sender)
    }
}

/// Registration of a one-shot listener for the state report answering one
/// command.
///
/// The listener is removed when the report is delivered or when this guard
/// is dropped, whichever happens first.
#[derive(Debug)]
pub struct ResponseListener {
    key: ResponseKey,
    token: u64,
    table: Arc<ResponseTable>,
    receiver: oneshot::Receiver<StateMessage>,
}

impl ResponseListener {
    /// Returns the device the listener waits for.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.key.0
    }

    /// Returns the correlation id the listener waits for.
    #[must_use]
    pub fn mutation_id(&self) -> u32 {
        self.key.1
    }

    /// Waits for the matching state report.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::ChannelClosed` if the gateway dropped the
    /// listener without delivering a report.
    pub async fn recv(&mut self) -> Result<StateMessage> {
        (&mut self.receiver).await.map_err(|_| {
            ProtocolError::ChannelClosed(format!(
                "response listener for {} #{}",
                self.key.0, self.key.1
            ))
            .into()
        })
    }
}

impl Drop for ResponseListener {
    fn drop(&mut self) {
        let mut pending = self.table.pending.lock();
        if pending
            .get(&self.key)
            .is_some_and(|(token, _)| *token == self.token)
        {
            pending.remove(&self.key);
        }
    }
}

/// Bridge between the pub/sub transport and the rest of the library.
///
/// # Examples
///
/// ```ignore
/// let (broker, events) = MqttBroker::builder().host("localhost").build().await?;
/// let gateway = Arc::new(Gateway::new(Arc::new(broker), "ledsync"));
/// gateway.on_connected_message(|msg| println!("{} -> {:?}", msg.name, msg.connection));
/// gateway.spawn(events);
/// ```
pub struct Gateway<T> {
    transport: Arc<T>,
    topics: Topics,
    listeners: ListenerRegistry,
    responses: Arc<ResponseTable>,
}

impl<T: Transport> Gateway<T> {
    /// Creates a gateway over `transport` for topics under `namespace`.
    #[must_use]
    pub fn new(transport: Arc<T>, namespace: impl Into<String>) -> Self {
        Self {
            transport,
            topics: Topics::new(namespace),
            listeners: ListenerRegistry::new(),
            responses: Arc::new(ResponseTable::default()),
        }
    }

    /// Returns the topic codec.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns `true` while the transport is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.transport.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Subscribes to the `connected`, `state`, `effects` and `config` topics
    /// of `id`.
    ///
    /// The four subscriptions run concurrently. Succeeds only if all do.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the transport is down, or the first
    /// transport error otherwise.
    pub async fn subscribe_to_device(&self, id: &DeviceId) -> Result<()> {
        self.ensure_connected()?;
        let topics = self.device_topics(id);
        let results = join_all(topics.iter().map(|topic| self.transport.subscribe(topic))).await;
        results.into_iter().collect::<Result<Vec<()>>>()?;
        tracing::debug!(device = %id, "Subscribed to device topics");
        Ok(())
    }

    /// Unsubscribes from the four device topics of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the transport is down, or the first
    /// transport error otherwise.
    pub async fn unsubscribe_from_device(&self, id: &DeviceId) -> Result<()> {
        self.ensure_connected()?;
        let topics = self.device_topics(id);
        let results =
            join_all(topics.iter().map(|topic| self.transport.unsubscribe(topic))).await;
        results.into_iter().collect::<Result<Vec<()>>>()?;
        tracing::debug!(device = %id, "Unsubscribed from device topics");
        Ok(())
    }

    fn device_topics(&self, id: &DeviceId) -> Vec<String> {
        MessageKind::DEVICE_SUBSCRIPTIONS
            .iter()
            .map(|kind| self.topics.device(*kind, id))
            .collect()
    }

    /// Publishes `command` to the command topic of its device.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the transport is down, or the
    /// encoding or transport error.
    pub async fn publish_command(&self, command: &CommandMessage) -> Result<()> {
        self.ensure_connected()?;
        let topic = self.topics.device(MessageKind::Command, &command.name);
        let payload = command.to_json()?;
        tracing::debug!(
            device = %command.name,
            mutation_id = command.mutation_id,
            "Publishing command"
        );
        self.transport
            .publish(&topic, payload.into_bytes(), false)
            .await
    }

    /// Subscribes to the discovery answer wildcard.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the transport is down, or the
    /// transport error.
    pub async fn start_discovery(&self) -> Result<()> {
        self.ensure_connected()?;
        self.transport
            .subscribe(&self.topics.discovery_wildcard())
            .await
    }

    /// Unsubscribes from the discovery answer wildcard.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the transport is down, or the
    /// transport error.
    pub async fn stop_discovery(&self) -> Result<()> {
        self.ensure_connected()?;
        self.transport
            .unsubscribe(&self.topics.discovery_wildcard())
            .await
    }

    /// Broadcasts a discovery ping to every device.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the transport is down, or the
    /// transport error.
    pub async fn publish_discovery_ping(&self) -> Result<()> {
        self.ensure_connected()?;
        tracing::debug!(topic = %self.topics.discovery(), "Publishing discovery ping");
        self.transport
            .publish(&self.topics.discovery(), DISCOVERY_PING.to_vec(), false)
            .await
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Registers a listener for every event.
    pub fn on_event<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.listeners.add(None, callback)
    }

    /// Registers a listener for transport connects.
    pub fn on_connect<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners
            .add(Some(GatewayEventKind::Connect), move |_| callback())
    }

    /// Registers a listener for transport disconnects.
    pub fn on_disconnect<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners
            .add(Some(GatewayEventKind::Disconnect), move |_| callback())
    }

    /// Registers a listener for `connected` messages.
    pub fn on_connected_message<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ConnectedMessage) + Send + Sync + 'static,
    {
        self.listeners
            .add(Some(GatewayEventKind::ConnectedMessage), move |event| {
                if let GatewayEvent::ConnectedMessage(msg) = event {
                    callback(msg);
                }
            })
    }

    /// Registers a listener for uncorrelated `state` messages.
    pub fn on_state_message<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&StateMessage) + Send + Sync + 'static,
    {
        self.listeners
            .add(Some(GatewayEventKind::StateMessage), move |event| {
                if let GatewayEvent::StateMessage(msg) = event {
                    callback(msg);
                }
            })
    }

    /// Registers a listener for `state` messages answering a pending
    /// command.
    pub fn on_command_response<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&StateMessage) + Send + Sync + 'static,
    {
        self.listeners
            .add(Some(GatewayEventKind::CommandResponse), move |event| {
                if let GatewayEvent::CommandResponse(msg) = event {
                    callback(msg);
                }
            })
    }

    /// Registers a listener for `effects` messages.
    pub fn on_effect_list_message<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&EffectListMessage) + Send + Sync + 'static,
    {
        self.listeners
            .add(Some(GatewayEventKind::EffectListMessage), move |event| {
                if let GatewayEvent::EffectListMessage(msg) = event {
                    callback(msg);
                }
            })
    }

    /// Registers a listener for `config` messages.
    pub fn on_config_message<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&DeviceInfo) + Send + Sync + 'static,
    {
        self.listeners
            .add(Some(GatewayEventKind::ConfigMessage), move |event| {
                if let GatewayEvent::ConfigMessage(info) = event {
                    callback(info);
                }
            })
    }

    /// Registers a listener for discovery answers.
    pub fn on_discovery_message<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&DeviceInfo) + Send + Sync + 'static,
    {
        self.listeners
            .add(Some(GatewayEventKind::DiscoveryMessage), move |event| {
                if let GatewayEvent::DiscoveryMessage(info) = event {
                    callback(info);
                }
            })
    }

    /// Removes a listener. Removing an unknown or already removed id is a
    /// no-op returning `false`.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Registers a one-shot listener for the state report of `device_id`
    /// carrying `mutation_id`.
    ///
    /// Returns `None` if a listener for the same pair is already pending.
    #[must_use]
    pub fn expect_response(
        &self,
        device_id: &DeviceId,
        mutation_id: u32,
    ) -> Option<ResponseListener> {
        let key = (device_id.clone(), mutation_id);
        let mut pending = self.responses.pending.lock();
        if pending.contains_key(&key) {
            return None;
        }

        let token = self.responses.next_token.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        pending.insert(key.clone(), (token, sender));
        drop(pending);

        Some(ResponseListener {
            key,
            token,
            table: Arc::clone(&self.responses),
            receiver,
        })
    }

    /// Returns the number of correlated listeners still waiting.
    #[must_use]
    pub fn pending_responses(&self) -> usize {
        self.responses.pending.lock().len()
    }

    /// Returns the number of registered listeners, correlated ones included.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len() + self.pending_responses()
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Handles one event from the transport.
    ///
    /// Never fails: unrecognized topics are ignored and invalid payloads are
    /// logged and dropped.
    pub fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                tracing::info!(namespace = %self.topics.namespace(), "Gateway connected");
                self.listeners.dispatch(&GatewayEvent::Connect);
            }
            TransportEvent::Disconnected => {
                tracing::info!(namespace = %self.topics.namespace(), "Gateway disconnected");
                self.listeners.dispatch(&GatewayEvent::Disconnect);
            }
            TransportEvent::Message { topic, payload } => self.handle_message(&topic, &payload),
        }
    }

    fn handle_message(&self, topic: &str, payload: &[u8]) {
        let Some(decoded) = self.topics.decode(topic) else {
            tracing::trace!(topic = %topic, "Ignoring unrecognized topic");
            return;
        };
        if matches!(decoded.kind, MessageKind::Command | MessageKind::Discovery) {
            tracing::trace!(topic = %topic, "Ignoring outbound topic");
            return;
        }

        let message = match InboundMessage::decode(&decoded, payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Dropping invalid payload"
                );
                return;
            }
        };

        let event = match message {
            InboundMessage::Connected(msg) => GatewayEvent::ConnectedMessage(msg),
            InboundMessage::State(msg) => match self.deliver_response(msg) {
                Some(msg) => GatewayEvent::StateMessage(msg),
                None => return,
            },
            InboundMessage::EffectList(msg) => GatewayEvent::EffectListMessage(msg),
            InboundMessage::Config(info) => GatewayEvent::ConfigMessage(info),
            InboundMessage::DiscoveryResponse(info) => GatewayEvent::DiscoveryMessage(info),
        };
        tracing::debug!(topic = %topic, kind = ?event.kind(), "Dispatching gateway event");
        self.listeners.dispatch(&event);
    }

    /// Hands a correlated report to its listener. Returns the message back
    /// if nobody was waiting for it.
    ///
    /// [`GatewayEvent::CommandResponse`] is dispatched before the listener
    /// is woken, so a queue fed by an `on_event` listener holds the report
    /// behind every message that arrived before it.
    fn deliver_response(&self, msg: StateMessage) -> Option<StateMessage> {
        let Some(mutation_id) = msg.mutation_id else {
            return Some(msg);
        };
        let Some(sender) = self.responses.take(&(msg.name.clone(), mutation_id)) else {
            return Some(msg);
        };

        tracing::debug!(device = %msg.name, mutation_id, "Delivering correlated response");
        self.listeners
            .dispatch(&GatewayEvent::CommandResponse(msg.clone()));
        if sender.send(msg).is_err() {
            tracing::debug!(mutation_id, "Command gave up before its response was delivered");
        }
        None
    }

    /// Feeds transport events into the gateway until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_transport_event(event);
        }
        tracing::debug!("Transport event channel closed");
    }

    /// Spawns [`run`](Self::run) on the tokio runtime.
    pub fn spawn(self: &Arc<Self>, events: mpsc::Receiver<TransportEvent>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(events))
    }
}

impl<T> fmt::Debug for Gateway<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("topics", &self.topics)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::protocol::transport::mock::MockTransport;

    fn gateway() -> Gateway<MockTransport> {
        Gateway::new(Arc::new(MockTransport::connected()), "ledsync")
    }

    fn message(topic: &str, payload: &str) -> TransportEvent {
        TransportEvent::Message {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn subscribe_to_device_covers_four_topics() {
        let gateway = gateway();
        gateway
            .subscribe_to_device(&DeviceId::new("L1"))
            .await
            .unwrap();

        let mut subs = gateway.transport().subscriptions();
        subs.sort();
        assert_eq!(
            subs,
            vec![
                "ledsync/L1/config",
                "ledsync/L1/connected",
                "ledsync/L1/effects",
                "ledsync/L1/state",
            ]
        );
    }

    #[tokio::test]
    async fn subscribe_fails_if_any_topic_fails() {
        let gateway = gateway();
        gateway.transport().fail_topic("/effects");

        let err = gateway
            .subscribe_to_device(&DeviceId::new("L1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol(ProtocolError::ChannelClosed(_))));
        // The others were still attempted.
        assert_eq!(gateway.transport().subscriptions().len(), 3);
    }

    #[tokio::test]
    async fn outbound_fails_fast_when_disconnected() {
        let gateway = gateway();
        gateway.transport().set_connected(false);
        let id = DeviceId::new("L1");

        assert!(gateway.subscribe_to_device(&id).await.unwrap_err().is_not_connected());
        assert!(gateway.unsubscribe_from_device(&id).await.unwrap_err().is_not_connected());
        assert!(gateway.start_discovery().await.unwrap_err().is_not_connected());
        assert!(gateway.publish_discovery_ping().await.unwrap_err().is_not_connected());
        let command = CommandMessage::new(&id, 1, &crate::state::StatePatch::new());
        assert!(gateway.publish_command(&command).await.unwrap_err().is_not_connected());
        assert!(gateway.transport().published().is_empty());
    }

    #[tokio::test]
    async fn discovery_topics_and_ping() {
        let gateway = gateway();
        gateway.start_discovery().await.unwrap();
        gateway.publish_discovery_ping().await.unwrap();
        gateway.stop_discovery().await.unwrap();

        assert_eq!(gateway.transport().subscriptions(), vec!["ledsync/+/hello"]);
        assert_eq!(gateway.transport().unsubscriptions(), vec!["ledsync/+/hello"]);
        let published = gateway.transport().published();
        assert_eq!(published[0].topic, "ledsync/discovery");
        assert_eq!(published[0].payload, DISCOVERY_PING);
        assert!(!published[0].retain);
    }

    #[tokio::test]
    async fn publish_command_is_not_retained() {
        let gateway = gateway();
        let patch = crate::state::StatePatch::new().with_on(true);
        gateway
            .publish_command(&CommandMessage::new(&DeviceId::new("L1"), 9, &patch))
            .await
            .unwrap();

        let published = gateway.transport().published();
        assert_eq!(published[0].topic, "ledsync/L1/command");
        assert_eq!(
            published[0].payload,
            br#"{"mutationId":9,"name":"L1","state":"ON"}"#
        );
        assert!(!published[0].retain);
    }

    #[test]
    fn inbound_connected_message_is_dispatched() {
        let gateway = gateway();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        gateway.on_connected_message(move |msg| sink.lock().push(msg.connection.is_connected()));

        gateway.handle_transport_event(message(
            "ledsync/L1/connected",
            r#"{"name":"L1","connection":2}"#,
        ));
        gateway.handle_transport_event(message(
            "ledsync/L1/connected",
            r#"{"name":"L1","connection":0}"#,
        ));

        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[test]
    fn invalid_and_foreign_messages_are_dropped() {
        let gateway = gateway();
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        gateway.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        gateway.handle_transport_event(message("other/L1/state", r#"{"name":"L1"}"#));
        gateway.handle_transport_event(message("ledsync/L1/state", "{not json"));
        gateway.handle_transport_event(message("ledsync/L1/state", r#"{"name":"L2"}"#));
        gateway.handle_transport_event(message(
            "ledsync/L1/state",
            r#"{"name":"L1","brightness":400}"#,
        ));
        gateway.handle_transport_event(message("ledsync/L1/command", r#"{"mutationId":1,"name":"L1"}"#));

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn connection_transitions_are_dispatched() {
        let gateway = gateway();
        let connects = Arc::new(AtomicU32::new(0));
        let disconnects = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&connects);
        gateway.on_connect(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let d = Arc::clone(&disconnects);
        gateway.on_disconnect(move || {
            d.fetch_add(1, Ordering::SeqCst);
        });

        gateway.handle_transport_event(TransportEvent::Connected);
        gateway.handle_transport_event(TransportEvent::Disconnected);
        gateway.handle_transport_event(TransportEvent::Disconnected);

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(disconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn correlated_response_bypasses_general_listeners() {
        let gateway = gateway();
        let general = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&general);
        gateway.on_state_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut listener = gateway.expect_response(&DeviceId::new("L1"), 77).unwrap();
        assert_eq!(gateway.pending_responses(), 1);

        gateway.handle_transport_event(message(
            "ledsync/L1/state",
            r#"{"mutationId":77,"name":"L1","brightness":40}"#,
        ));

        let response = listener.recv().await.unwrap();
        assert_eq!(response.brightness.map(|b| b.value()), Some(40));
        assert_eq!(general.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.pending_responses(), 0);
    }

    #[test]
    fn command_response_is_dispatched_before_the_waiter_wakes() {
        let gateway = gateway();
        let mut listener = gateway.expect_response(&DeviceId::new("L1"), 77).unwrap();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        gateway.on_event(move |event| sink.lock().push(event.kind()));

        gateway.handle_transport_event(message(
            "ledsync/L1/state",
            r#"{"name":"L1","brightness":10}"#,
        ));
        gateway.handle_transport_event(message(
            "ledsync/L1/state",
            r#"{"mutationId":77,"name":"L1","brightness":40}"#,
        ));

        assert_eq!(
            *order.lock(),
            vec![GatewayEventKind::StateMessage, GatewayEventKind::CommandResponse]
        );
        let response = listener.receiver.try_recv().unwrap();
        assert_eq!(response.mutation_id, Some(77));
    }

    #[test]
    fn duplicate_response_is_unsolicited() {
        let gateway = gateway();
        let unsolicited = Arc::new(AtomicU32::new(0));
        let answered = Arc::new(AtomicU32::new(0));
        let u = Arc::clone(&unsolicited);
        gateway.on_state_message(move |_| {
            u.fetch_add(1, Ordering::SeqCst);
        });
        let a = Arc::clone(&answered);
        gateway.on_command_response(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let _listener = gateway.expect_response(&DeviceId::new("L1"), 77).unwrap();

        for _ in 0..2 {
            gateway.handle_transport_event(message(
                "ledsync/L1/state",
                r#"{"mutationId":77,"name":"L1","state":"ON"}"#,
            ));
        }

        assert_eq!(answered.load(Ordering::SeqCst), 1);
        assert_eq!(unsolicited.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.pending_responses(), 0);
    }

    #[test]
    fn unmatched_mutation_id_is_unsolicited() {
        let gateway = gateway();
        let general = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&general);
        gateway.on_state_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let _listener = gateway.expect_response(&DeviceId::new("L1"), 77).unwrap();

        gateway.handle_transport_event(message(
            "ledsync/L1/state",
            r#"{"mutationId":78,"name":"L1","state":"ON"}"#,
        ));
        gateway.handle_transport_event(message(
            "ledsync/L2/state",
            r#"{"mutationId":77,"name":"L2","state":"ON"}"#,
        ));

        assert_eq!(general.load(Ordering::SeqCst), 2);
        assert_eq!(gateway.pending_responses(), 1);
    }

    #[test]
    fn dropping_listener_removes_it() {
        let gateway = gateway();
        let id = DeviceId::new("L1");

        let listener = gateway.expect_response(&id, 1).unwrap();
        assert!(gateway.expect_response(&id, 1).is_none());
        assert_eq!(gateway.listener_count(), 1);

        drop(listener);
        assert_eq!(gateway.listener_count(), 0);
        assert!(gateway.expect_response(&id, 1).is_some());
    }

    #[test]
    fn stale_guard_does_not_remove_newer_listener() {
        let gateway = gateway();
        let id = DeviceId::new("L1");

        let first = gateway.expect_response(&id, 5).unwrap();
        gateway.handle_transport_event(message(
            "ledsync/L1/state",
            r#"{"mutationId":5,"name":"L1"}"#,
        ));
        let _second = gateway.expect_response(&id, 5).unwrap();

        drop(first);
        assert_eq!(gateway.pending_responses(), 1);
    }

    #[test]
    fn remove_listener_is_idempotent() {
        let gateway = gateway();
        let id = gateway.on_event(|_| {});
        assert!(gateway.remove_listener(id));
        assert!(!gateway.remove_listener(id));
        assert_eq!(gateway.listener_count(), 0);
    }

    #[tokio::test]
    async fn run_drains_channel() {
        let gateway = Arc::new(gateway());
        let connects = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&connects);
        gateway.on_connect(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let (tx, rx) = mpsc::channel(4);
        let handle = gateway.spawn(rx);
        tx.send(TransportEvent::Connected).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }
}
