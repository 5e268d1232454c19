// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::command::Correlator;
use crate::discovery::{DiscoveredDevice, DiscoveryCoordinator};
use crate::error::{Error, Result};
use crate::event::{DeviceChange, DeviceEvent, DeviceId, EventBus};
use crate::protocol::{
    ConnectedMessage, DeviceInfo, EffectListMessage, Gateway, GatewayEvent, StateMessage,
    Transport, TransportEvent,
};
use crate::state::{LiveState, StateCache, StatePatch};

use super::{ConnectionStateMachine, DeviceRecord, DeviceRegistry, ServiceConfig};

/// Keeps a fleet of LED controllers in sync with the bus.
///
/// The service composes the gateway, the state cache, the correlator, the
/// discovery coordinator and the connection state machine with an external
/// [`DeviceRegistry`]. Inbound bus events are handled one at a time by a
/// single dispatch task; outbound operations run on the caller's task.
///
/// The service is cheaply cloneable; clones share all state.
///
/// # Examples
///
/// ```no_run
/// use ledsync_lib::manager::{DeviceService, InMemoryRegistry, ServiceConfig};
/// use ledsync_lib::event::DeviceId;
/// use ledsync_lib::protocol::MqttBroker;
/// use ledsync_lib::state::StatePatch;
/// use ledsync_lib::types::Brightness;
///
/// #[tokio::main]
/// async fn main() -> ledsync_lib::Result<()> {
///     let (broker, events) = MqttBroker::builder().host("192.168.1.50").build().await?;
///     let service = DeviceService::new(broker, InMemoryRegistry::new(), ServiceConfig::default());
///     service.start(events).await?;
///
///     let mut notifications = service.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = notifications.recv().await {
///             println!("{event:?}");
///         }
///     });
///
///     let state = service
///         .set_state(
///             &DeviceId::new("L1"),
///             &StatePatch::new().with_on(true).with_brightness(Brightness::new(40)?),
///         )
///         .await?;
///     println!("L1 is now at {}%", state.brightness());
///     Ok(())
/// }
/// ```
pub struct DeviceService<T, R> {
    inner: Arc<ServiceInner<T, R>>,
}

/// Work item of the dispatch task.
enum Dispatch {
    Gateway(GatewayEvent),
    /// Reads the cache once everything queued before it has been applied.
    Snapshot {
        device_id: DeviceId,
        reply: oneshot::Sender<Result<LiveState>>,
    },
}

struct ServiceInner<T, R> {
    gateway: Arc<Gateway<T>>,
    registry: Arc<R>,
    cache: StateCache,
    correlator: Correlator<T>,
    discovery: DiscoveryCoordinator,
    connection: ConnectionStateMachine,
    events: EventBus,
    config: ServiceConfig,
    started: AtomicBool,
    dispatch_tx: mpsc::UnboundedSender<Dispatch>,
    dispatch_rx: Mutex<Option<mpsc::UnboundedReceiver<Dispatch>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Transport, R: DeviceRegistry> DeviceService<T, R> {
    /// Creates a service over `transport` and `registry`.
    #[must_use]
    pub fn new(transport: T, registry: R, config: ServiceConfig) -> Self {
        Self::with_shared(Arc::new(transport), Arc::new(registry), config)
    }

    /// Creates a service over a transport and registry shared with the host.
    #[must_use]
    pub fn with_shared(transport: Arc<T>, registry: Arc<R>, config: ServiceConfig) -> Self {
        let gateway = Arc::new(Gateway::new(transport, config.namespace.clone()));
        let correlator = Correlator::new(Arc::clone(&gateway), config.command_timeout);
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(ServiceInner {
                gateway,
                registry,
                cache: StateCache::new(),
                correlator,
                discovery: DiscoveryCoordinator::new(config.discovery_window),
                connection: ConnectionStateMachine::new(),
                events: EventBus::with_capacity(config.notification_capacity),
                config,
                started: AtomicBool::new(false),
                dispatch_tx,
                dispatch_rx: Mutex::new(Some(dispatch_rx)),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Returns the gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<Gateway<T>> {
        &self.inner.gateway
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<R> {
        &self.inner.registry
    }

    /// Returns `true` while the connection state machine is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initializes the cache for every registered device and starts
    /// processing `transport_events`.
    ///
    /// If the transport is already connected the connect transition runs
    /// before this returns. Calling `start` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the registry error if the registered devices cannot be
    /// listed.
    pub async fn start(&self, transport_events: mpsc::Receiver<TransportEvent>) -> Result<()> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            tracing::debug!("Device service already started");
            return Ok(());
        }

        let ids = match self.inner.registry.list_device_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                self.inner.started.store(false, Ordering::Release);
                return Err(e);
            }
        };
        for id in &ids {
            self.inner.cache.initialize(id);
        }

        let Some(rx) = self.inner.dispatch_rx.lock().take() else {
            return Ok(());
        };
        let tx = self.inner.dispatch_tx.clone();
        self.inner.gateway.on_event(move |event| {
            let _ = tx.send(Dispatch::Gateway(event.clone()));
        });

        let dispatch = tokio::spawn(dispatch_loop(Arc::downgrade(&self.inner), rx));
        let transport = self.inner.gateway.spawn(transport_events);
        self.inner.tasks.lock().extend([dispatch, transport]);

        tracing::info!(
            namespace = %self.inner.config.namespace,
            devices = ids.len(),
            "Device service started"
        );

        if self.inner.gateway.is_connected() {
            self.inner
                .connection
                .on_connect(&self.inner.gateway, self.inner.registry.as_ref())
                .await;
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Subscribes to device notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the live state of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the device has no cache entry.
    pub fn state(&self, id: &DeviceId) -> Result<LiveState> {
        self.inner.cache.get(id)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Asks `id` to apply `patch` and returns the state it reports back.
    ///
    /// The report is applied to the cache in bus order with every other
    /// inbound message, and the returned state is the cache entry right
    /// after it. A patch without device-settable fields returns the cached
    /// state without publishing anything.
    ///
    /// # Errors
    ///
    /// - `Error::DeviceNotFound` if the device is not registered.
    /// - `Error::NotConnected`, `Error::Protocol` or `Error::Timeout` from
    ///   the command round trip.
    pub async fn set_state(&self, id: &DeviceId, patch: &StatePatch) -> Result<LiveState> {
        if !self.inner.registry.exists(id).await? {
            return Err(Error::DeviceNotFound(id.clone()));
        }
        if !patch.has_device_fields() {
            return self.inner.cache.get(id);
        }

        let report = self.inner.correlator.send(id, patch).await?;
        self.inner.settled_state(id, &report).await
    }

    /// Runs a discovery session and returns the unregistered devices that
    /// answered.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` or the transport error.
    pub async fn discover(&self) -> Result<Vec<DiscoveredDevice>> {
        self.inner.discovery.discover(&self.inner.gateway).await
    }

    /// Registers a device and subscribes to its topics.
    ///
    /// Being disconnected is not an error: the device is subscribed on the
    /// next connect.
    ///
    /// # Errors
    ///
    /// - `Error::Value` if the id cannot be used in a topic.
    /// - The registry error if the insert fails.
    /// - The transport error if subscribing fails while connected; the
    ///   device stays registered.
    pub async fn add_device(&self, info: DeviceInfo) -> Result<()> {
        let id = DeviceId::parse(info.id.as_str())?;
        self.inner
            .registry
            .insert(DeviceRecord::new(info.clone()))
            .await?;
        self.inner.cache.initialize(&id);
        self.inner.events.publish(DeviceEvent::device_added(info));
        tracing::info!(device = %id, "Device added");

        match self.inner.gateway.subscribe_to_device(&id).await {
            Ok(()) => Ok(()),
            Err(Error::NotConnected) => {
                tracing::debug!(device = %id, "Not connected, subscription deferred");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(device = %id, error = %e, "Failed to subscribe new device");
                Err(e)
            }
        }
    }

    /// Deregisters a device.
    ///
    /// Unsubscribing is best effort. Returns `false` if the device was not
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns the registry error if the removal fails.
    pub async fn remove_device(&self, id: &DeviceId) -> Result<bool> {
        if !self.inner.registry.remove(id).await? {
            return Ok(false);
        }

        if let Err(e) = self.inner.gateway.unsubscribe_from_device(id).await {
            tracing::warn!(device = %id, error = %e, "Failed to unsubscribe removed device");
        }
        self.inner.cache.clear(id);
        self.inner
            .events
            .publish(DeviceEvent::device_removed(id.clone()));
        tracing::info!(device = %id, "Device removed");
        Ok(true)
    }
}

impl<T, R> Clone for DeviceService<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, R> std::fmt::Debug for DeviceService<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceService")
            .field("config", &self.inner.config)
            .field("devices", &self.inner.cache.len())
            .field("connection", &self.inner.connection.state())
            .finish_non_exhaustive()
    }
}

impl<T, R> Drop for ServiceInner<T, R> {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Handles queued work one item at a time until the service is dropped.
async fn dispatch_loop<T, R>(
    inner: Weak<ServiceInner<T, R>>,
    mut queue: mpsc::UnboundedReceiver<Dispatch>,
) where
    T: Transport,
    R: DeviceRegistry,
{
    while let Some(item) = queue.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match item {
            Dispatch::Gateway(event) => inner.handle_event(event).await,
            Dispatch::Snapshot { device_id, reply } => {
                let _ = reply.send(inner.cache.get(&device_id));
            }
        }
    }
    tracing::debug!("Device service dispatch loop stopped");
}

impl<T: Transport, R: DeviceRegistry> ServiceInner<T, R> {
    /// Returns the cache entry of `id` once `report` has been applied.
    ///
    /// The gateway queues the report as [`GatewayEvent::CommandResponse`]
    /// before waking the command, so a snapshot queued now is answered
    /// after it. Without a dispatch task the report is applied here.
    async fn settled_state(&self, id: &DeviceId, report: &StateMessage) -> Result<LiveState> {
        if self.started.load(Ordering::Acquire) {
            let (reply, rx) = oneshot::channel();
            let queued = self.dispatch_tx.send(Dispatch::Snapshot {
                device_id: id.clone(),
                reply,
            });
            if queued.is_ok()
                && let Ok(state) = rx.await
            {
                return state;
            }
        }

        let state = self.cache.merge(id, &report.patch())?;
        self.events
            .publish(DeviceEvent::state_changed(id.clone(), state.clone()));
        Ok(state)
    }

    async fn handle_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::Connect => {
                self.connection
                    .on_connect(&self.gateway, self.registry.as_ref())
                    .await;
            }
            GatewayEvent::Disconnect => {
                self.connection
                    .on_disconnect(self.registry.as_ref(), &self.cache, &self.events)
                    .await;
            }
            GatewayEvent::ConnectedMessage(msg) => self.handle_connected(&msg),
            GatewayEvent::StateMessage(msg) | GatewayEvent::CommandResponse(msg) => {
                self.handle_state(&msg);
            }
            GatewayEvent::EffectListMessage(msg) => self.handle_effect_list(msg).await,
            GatewayEvent::ConfigMessage(info) => self.handle_config(info).await,
            GatewayEvent::DiscoveryMessage(info) => {
                self.discovery
                    .handle_response(info, self.registry.as_ref())
                    .await;
            }
        }
    }

    fn handle_connected(&self, msg: &ConnectedMessage) {
        let connected = msg.connection.is_connected();
        tracing::debug!(device = %msg.name, connected, "Device reachability changed");
        self.apply(&msg.name, &StatePatch::connection(connected));
    }

    fn handle_state(&self, msg: &StateMessage) {
        self.apply(&msg.name, &msg.patch());
    }

    /// Merges `patch` and notifies. Unknown devices are ignored.
    fn apply(&self, id: &DeviceId, patch: &StatePatch) {
        match self.cache.merge(id, patch) {
            Ok(state) => {
                self.events
                    .publish(DeviceEvent::state_changed(id.clone(), state));
            }
            Err(e) => {
                tracing::debug!(device = %id, error = %e, "Ignoring state of unknown device");
            }
        }
    }

    async fn handle_effect_list(&self, msg: EffectListMessage) {
        let EffectListMessage { name, effect_list } = msg;
        match self
            .registry
            .update_effect_list(&name, effect_list.clone())
            .await
        {
            Ok(()) => {
                self.events.publish(DeviceEvent::device_changed(
                    name,
                    DeviceChange::EffectList(effect_list),
                ));
            }
            Err(e) => tracing::warn!(device = %name, error = %e, "Failed to store effect list"),
        }
    }

    async fn handle_config(&self, info: DeviceInfo) {
        let id = info.id.clone();
        match self.registry.update_info(info.clone()).await {
            Ok(()) => {
                self.events
                    .publish(DeviceEvent::device_changed(id, DeviceChange::Info(info)));
            }
            Err(e) => tracing::warn!(device = %id, error = %e, "Failed to store device config"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::manager::InMemoryRegistry;
    use crate::protocol::transport::mock::MockTransport;
    use crate::types::Brightness;

    type TestService = DeviceService<MockTransport, InMemoryRegistry>;

    fn service(ids: &[&str]) -> TestService {
        let registry = InMemoryRegistry::with_records(
            ids.iter()
                .map(|id| DeviceRecord::new(DeviceInfo::new(DeviceId::new(*id), *id))),
        );
        DeviceService::new(
            MockTransport::connected(),
            registry,
            ServiceConfig::default().with_command_timeout(Duration::from_millis(200)),
        )
    }

    async fn started(ids: &[&str]) -> (TestService, mpsc::Sender<TransportEvent>) {
        let service = service(ids);
        let (tx, rx) = mpsc::channel(16);
        service.start(rx).await.unwrap();
        (service, tx)
    }

    fn message(topic: &str, payload: &str) -> TransportEvent {
        TransportEvent::Message {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<DeviceEvent>) -> DeviceEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn start_initializes_and_subscribes() {
        let (service, _tx) = started(&["L1", "L2"]).await;

        assert_eq!(service.state(&DeviceId::new("L1")).unwrap(), LiveState::default());
        assert!(service.is_connected());
        assert_eq!(service.gateway().transport().subscriptions().len(), 9);
    }

    #[tokio::test]
    async fn start_twice_is_a_no_op() {
        let (service, _tx) = started(&["L1"]).await;
        let (_tx2, rx2) = mpsc::channel(1);

        service.start(rx2).await.unwrap();

        assert_eq!(service.gateway().transport().subscriptions().len(), 5);
    }

    #[tokio::test]
    async fn connected_message_updates_cache() {
        let (service, tx) = started(&["L1"]).await;
        let mut rx = service.subscribe();
        let id = DeviceId::new("L1");

        tx.send(message("ledsync/L1/connected", r#"{"name":"L1","connection":2}"#))
            .await
            .unwrap();
        let event = next_event(&mut rx).await;
        assert!(matches!(
            event,
            DeviceEvent::DeviceStateChanged { ref state, .. } if state.is_connected()
        ));
        assert!(service.state(&id).unwrap().is_connected());

        tx.send(message("ledsync/L1/connected", r#"{"name":"L1","connection":0}"#))
            .await
            .unwrap();
        next_event(&mut rx).await;
        assert!(!service.state(&id).unwrap().is_connected());
    }

    #[tokio::test]
    async fn set_state_round_trip() {
        let (service, tx) = started(&["L1"]).await;
        let id = DeviceId::new("L1");
        let patch = StatePatch::new().with_brightness(Brightness::new(40).unwrap());

        let responder = {
            let service = service.clone();
            tokio::spawn(async move {
                loop {
                    let published = service.gateway().transport().published();
                    if let Some(command) = published.first() {
                        let json: serde_json::Value =
                            serde_json::from_slice(&command.payload).unwrap();
                        let reply = format!(
                            r#"{{"mutationId":{},"name":"L1","state":"ON","brightness":40}}"#,
                            json["mutationId"]
                        );
                        tx.send(message("ledsync/L1/state", &reply)).await.unwrap();
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let state = service.set_state(&id, &patch).await.unwrap();
        responder.await.unwrap();

        assert!(state.is_on());
        assert_eq!(state.brightness().value(), 40);
        assert_eq!(service.state(&id).unwrap(), state);
        assert_eq!(service.gateway().pending_responses(), 0);
    }

    /// Registry that holds the dispatch task on every effect list update.
    struct SlowEffects(InMemoryRegistry);

    impl DeviceRegistry for SlowEffects {
        async fn list_device_ids(&self) -> Result<Vec<DeviceId>> {
            self.0.list_device_ids().await
        }
        async fn exists(&self, id: &DeviceId) -> Result<bool> {
            self.0.exists(id).await
        }
        async fn get(&self, id: &DeviceId) -> Result<Option<DeviceRecord>> {
            self.0.get(id).await
        }
        async fn insert(&self, record: DeviceRecord) -> Result<()> {
            self.0.insert(record).await
        }
        async fn remove(&self, id: &DeviceId) -> Result<bool> {
            self.0.remove(id).await
        }
        async fn update_effect_list(&self, id: &DeviceId, effects: Vec<String>) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.update_effect_list(id, effects).await
        }
        async fn update_info(&self, info: DeviceInfo) -> Result<()> {
            self.0.update_info(info).await
        }
    }

    #[tokio::test]
    async fn command_report_lands_after_earlier_updates() {
        let registry = SlowEffects(InMemoryRegistry::with_records([DeviceRecord::new(
            DeviceInfo::new(DeviceId::new("L1"), "L1"),
        )]));
        let service = DeviceService::new(
            MockTransport::connected(),
            registry,
            ServiceConfig::default().with_command_timeout(Duration::from_secs(2)),
        );
        let (tx, rx) = mpsc::channel(16);
        service.start(rx).await.unwrap();
        let mut notifications = service.subscribe();
        let id = DeviceId::new("L1");
        let patch = StatePatch::new().with_brightness(Brightness::new(40).unwrap());

        let device = async {
            while service.gateway().transport().published().is_empty() {
                tokio::task::yield_now().await;
            }
            let command = &service.gateway().transport().published()[0];
            let json: serde_json::Value = serde_json::from_slice(&command.payload).unwrap();
            tx.send(message("ledsync/L1/effects", r#"{"name":"L1","effectList":["Fire"]}"#))
                .await
                .unwrap();
            tx.send(message("ledsync/L1/state", r#"{"name":"L1","brightness":10}"#))
                .await
                .unwrap();
            let reply = format!(
                r#"{{"mutationId":{},"name":"L1","brightness":40}}"#,
                json["mutationId"]
            );
            tx.send(message("ledsync/L1/state", &reply)).await.unwrap();
        };
        let (state, ()) = tokio::join!(service.set_state(&id, &patch), device);

        let state = state.unwrap();
        assert_eq!(state.brightness().value(), 40);
        assert_eq!(service.state(&id).unwrap().brightness().value(), 40);

        let mut brightness = Vec::new();
        while let Ok(event) = notifications.try_recv() {
            if let DeviceEvent::DeviceStateChanged { state, .. } = event {
                brightness.push(state.brightness().value());
            }
        }
        assert_eq!(brightness, vec![10, 40]);
    }

    #[tokio::test]
    async fn set_state_unknown_device() {
        let (service, _tx) = started(&["L1"]).await;
        let err = service
            .set_state(&DeviceId::new("L9"), &StatePatch::new().with_on(true))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn set_state_timeout_leaves_cache_untouched() {
        let (service, _tx) = started(&["L1"]).await;
        let id = DeviceId::new("L1");

        let err = service
            .set_state(&id, &StatePatch::new().with_on(true))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(!service.state(&id).unwrap().is_on());
        assert_eq!(service.gateway().pending_responses(), 0);
    }

    #[tokio::test]
    async fn add_and_remove_device() {
        let (service, _tx) = started(&[]).await;
        let mut rx = service.subscribe();
        let id = DeviceId::new("L7");

        service
            .add_device(DeviceInfo::new(id.clone(), "Porch"))
            .await
            .unwrap();
        assert!(matches!(next_event(&mut rx).await, DeviceEvent::DeviceAdded { .. }));
        assert!(service.state(&id).is_ok());
        assert!(
            service
                .gateway()
                .transport()
                .subscriptions()
                .contains(&"ledsync/L7/state".to_string())
        );

        assert!(service.remove_device(&id).await.unwrap());
        assert!(matches!(next_event(&mut rx).await, DeviceEvent::DeviceRemoved { .. }));
        assert!(service.state(&id).is_err());
        assert_eq!(service.gateway().transport().unsubscriptions().len(), 4);
        assert!(!service.remove_device(&id).await.unwrap());
    }

    #[tokio::test]
    async fn add_device_while_disconnected_is_deferred() {
        let service = service(&[]);
        service.gateway().transport().set_connected(false);

        service
            .add_device(DeviceInfo::new(DeviceId::new("L7"), "Porch"))
            .await
            .unwrap();

        assert!(service.registry().exists(&DeviceId::new("L7")).await.unwrap());
    }

    #[tokio::test]
    async fn add_device_rejects_unsafe_id() {
        let service = service(&[]);
        let err = service
            .add_device(DeviceInfo::new(DeviceId::new("a/b"), "Bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Value(_)));
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn remove_device_swallows_unsubscribe_failure() {
        let (service, _tx) = started(&["L1"]).await;
        service.gateway().transport().fail_topic("/L1/");

        assert!(service.remove_device(&DeviceId::new("L1")).await.unwrap());
        assert!(service.state(&DeviceId::new("L1")).is_err());
    }

    #[tokio::test]
    async fn effect_list_and_config_update_registry() {
        let (service, tx) = started(&["L1"]).await;
        let mut rx = service.subscribe();
        let id = DeviceId::new("L1");

        tx.send(message(
            "ledsync/L1/effects",
            r#"{"name":"L1","effectList":["Rainbow","Fire"]}"#,
        ))
        .await
        .unwrap();
        let event = next_event(&mut rx).await;
        assert!(matches!(
            event,
            DeviceEvent::DeviceChanged {
                change: DeviceChange::EffectList(ref effects),
                ..
            } if effects.len() == 2
        ));

        tx.send(message(
            "ledsync/L1/config",
            r#"{"id":"L1","name":"Desk","numLeds":60}"#,
        ))
        .await
        .unwrap();
        let event = next_event(&mut rx).await;
        assert!(matches!(
            event,
            DeviceEvent::DeviceChanged { change: DeviceChange::Info(_), .. }
        ));

        let record = service.registry().get(&id).await.unwrap().unwrap();
        assert_eq!(record.effects, vec!["Rainbow", "Fire"]);
        assert_eq!(record.info.num_leds, 60);
    }

    #[tokio::test]
    async fn disconnect_flips_every_device() {
        let (service, tx) = started(&["A", "B"]).await;
        let mut rx = service.subscribe();

        service.gateway().transport().set_connected(false);
        tx.send(TransportEvent::Disconnected).await.unwrap();

        next_event(&mut rx).await;
        next_event(&mut rx).await;
        assert!(!service.is_connected());
        assert!(!service.state(&DeviceId::new("A")).unwrap().is_connected());
        assert!(!service.state(&DeviceId::new("B")).unwrap().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_through_service() {
        let (service, tx) = started(&["A"]).await;

        let answers = async {
            while service.gateway().transport().published().is_empty() {
                tokio::task::yield_now().await;
            }
            for id in ["A", "B", "B"] {
                let payload = format!(r#"{{"id":"{id}","name":"{id}"}}"#);
                tx.send(message(&format!("ledsync/{id}/hello"), &payload))
                    .await
                    .unwrap();
            }
        };
        let (found, ()) = tokio::join!(service.discover(), answers);

        let found = found.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "B");
    }
}
