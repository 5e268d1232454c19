// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery of unregistered LED controllers.
//!
//! # Discovery Mechanism
//!
//! A session broadcasts `{"discover":true}` on `<namespace>/discovery`.
//! Every controller answers with its configuration on
//! `<namespace>/<id>/hello`, which the gateway receives through the
//! `<namespace>/+/hello` wildcard. Answers are collected for a fixed window;
//! devices already registered, or already seen in the session, are skipped.
//! The wildcard is released when the window closes.
//!
//! # Examples
//!
//! ```no_run
//! use ledsync_lib::manager::{DeviceService, InMemoryRegistry, ServiceConfig};
//! use ledsync_lib::protocol::MqttBroker;
//!
//! # async fn example() -> ledsync_lib::Result<()> {
//! let (broker, events) = MqttBroker::builder().host("192.168.1.50").build().await?;
//! let service = DeviceService::new(broker, InMemoryRegistry::new(), ServiceConfig::default());
//! service.start(events).await?;
//!
//! for device in service.discover().await? {
//!     println!("{} at {}", device.id, device.info.ip_address);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::event::DeviceId;
use crate::manager::DeviceRegistry;
use crate::protocol::{DeviceInfo, Gateway, Transport};

/// Default time discovery answers are collected for.
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_millis(1500);

/// An unregistered device that answered a discovery ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    /// Device id.
    pub id: DeviceId,
    /// Reported configuration.
    pub info: DeviceInfo,
}

#[derive(Debug, Default)]
struct Session {
    active: bool,
    devices: HashMap<DeviceId, DeviceInfo>,
}

/// Runs discovery sessions and owns their result set.
///
/// Sessions are serialized: a second `discover` call waits for the first to
/// finish instead of clearing its set.
#[derive(Debug)]
pub struct DiscoveryCoordinator {
    window: Duration,
    run_lock: Mutex<()>,
    session: Mutex<Session>,
}

impl DiscoveryCoordinator {
    /// Creates a coordinator collecting answers for `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            run_lock: Mutex::new(()),
            session: Mutex::new(Session::default()),
        }
    }

    /// Returns the collection window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` while a session is collecting answers.
    pub async fn is_active(&self) -> bool {
        self.session.lock().await.active
    }

    /// Runs one session and returns the new devices, sorted by id ignoring
    /// case.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` or the transport error if the wildcard
    /// subscription or the ping fails.
    pub async fn discover<T: Transport>(&self, gateway: &Gateway<T>) -> Result<Vec<DiscoveredDevice>> {
        let _running = self.run_lock.lock().await;
        {
            let mut session = self.session.lock().await;
            session.devices.clear();
            session.active = true;
        }

        let collected = self.collect(gateway).await;

        let devices = {
            let mut session = self.session.lock().await;
            session.active = false;
            std::mem::take(&mut session.devices)
        };
        if let Err(e) = gateway.stop_discovery().await {
            tracing::debug!(error = %e, "Failed to release discovery subscription");
        }
        collected?;

        let mut devices: Vec<DiscoveredDevice> = devices
            .into_iter()
            .map(|(id, info)| DiscoveredDevice { id, info })
            .collect();
        devices.sort_by(|a, b| {
            a.id.as_str()
                .to_lowercase()
                .cmp(&b.id.as_str().to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });

        tracing::info!(count = devices.len(), "Discovery finished");
        Ok(devices)
    }

    async fn collect<T: Transport>(&self, gateway: &Gateway<T>) -> Result<()> {
        gateway.start_discovery().await?;
        gateway.publish_discovery_ping().await?;
        tokio::time::sleep(self.window).await;
        Ok(())
    }

    /// Records a discovery answer.
    ///
    /// Returns `true` if the device was added to the session. Answers
    /// outside a session, duplicates, registered devices, and devices whose
    /// registry lookup fails are skipped.
    pub async fn handle_response<R: DeviceRegistry>(&self, info: DeviceInfo, registry: &R) -> bool {
        // Held across the registry lookup so check and insert are one step.
        let mut session = self.session.lock().await;
        if !session.active {
            tracing::trace!(device = %info.id, "Ignoring discovery answer outside a session");
            return false;
        }
        if session.devices.contains_key(&info.id) {
            return false;
        }

        match registry.exists(&info.id).await {
            Ok(true) => false,
            Ok(false) => {
                tracing::debug!(device = %info.id, ip = %info.ip_address, "Discovered device");
                session.devices.insert(info.id.clone(), info);
                true
            }
            Err(e) => {
                tracing::warn!(device = %info.id, error = %e, "Registry lookup failed, skipping discovery answer");
                false
            }
        }
    }
}

impl Default for DiscoveryCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_DISCOVERY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;
    use crate::manager::{DeviceRecord, InMemoryRegistry};
    use crate::protocol::transport::mock::MockTransport;

    fn info(id: &str) -> DeviceInfo {
        DeviceInfo::new(DeviceId::new(id), id)
    }

    /// Registry whose lookups always fail.
    struct BrokenRegistry;

    impl DeviceRegistry for BrokenRegistry {
        async fn list_device_ids(&self) -> Result<Vec<DeviceId>> {
            Err(Error::Registry("offline".to_string()))
        }
        async fn exists(&self, _id: &DeviceId) -> Result<bool> {
            Err(Error::Registry("offline".to_string()))
        }
        async fn get(&self, _id: &DeviceId) -> Result<Option<DeviceRecord>> {
            Err(Error::Registry("offline".to_string()))
        }
        async fn insert(&self, _record: DeviceRecord) -> Result<()> {
            Err(Error::Registry("offline".to_string()))
        }
        async fn remove(&self, _id: &DeviceId) -> Result<bool> {
            Err(Error::Registry("offline".to_string()))
        }
        async fn update_effect_list(&self, _id: &DeviceId, _effects: Vec<String>) -> Result<()> {
            Err(Error::Registry("offline".to_string()))
        }
        async fn update_info(&self, _info: DeviceInfo) -> Result<()> {
            Err(Error::Registry("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn answers_outside_session_are_ignored() {
        let coordinator = DiscoveryCoordinator::default();
        let registry = InMemoryRegistry::new();

        assert!(!coordinator.handle_response(info("B"), &registry).await);
        assert!(!coordinator.is_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn dedups_against_registry_and_session() {
        let gateway = Gateway::new(Arc::new(MockTransport::connected()), "ledsync");
        let coordinator = DiscoveryCoordinator::default();
        let registry = InMemoryRegistry::with_records([DeviceRecord::new(info("A"))]);

        let answers = async {
            while !coordinator.is_active().await {
                tokio::task::yield_now().await;
            }
            let a = coordinator.handle_response(info("A"), &registry).await;
            let b1 = coordinator.handle_response(info("B"), &registry).await;
            let b2 = coordinator.handle_response(info("B"), &registry).await;
            (a, b1, b2)
        };
        let (found, accepted) = tokio::join!(coordinator.discover(&gateway), answers);

        assert_eq!(accepted, (false, true, false));
        let found = found.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "B");
        assert_eq!(
            gateway.transport().subscriptions(),
            vec!["ledsync/+/hello"]
        );
        assert_eq!(gateway.transport().published()[0].topic, "ledsync/discovery");
    }

    #[tokio::test(start_paused = true)]
    async fn wildcard_is_released_when_session_ends() {
        let gateway = Gateway::new(Arc::new(MockTransport::connected()), "ledsync");
        let coordinator = DiscoveryCoordinator::default();
        let registry = InMemoryRegistry::new();

        coordinator.discover(&gateway).await.unwrap();

        assert_eq!(gateway.transport().unsubscriptions(), vec!["ledsync/+/hello"]);
        assert!(!coordinator.handle_response(info("B"), &registry).await);
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_sorted_case_insensitively() {
        let gateway = Gateway::new(Arc::new(MockTransport::connected()), "ledsync");
        let coordinator = DiscoveryCoordinator::new(Duration::from_secs(1));
        let registry = InMemoryRegistry::new();

        let answers = async {
            while !coordinator.is_active().await {
                tokio::task::yield_now().await;
            }
            for id in ["delta", "Bravo", "alpha", "Charlie"] {
                coordinator.handle_response(info(id), &registry).await;
            }
        };
        let (found, ()) = tokio::join!(coordinator.discover(&gateway), answers);

        let ids: Vec<_> = found.unwrap().into_iter().map(|d| d.id.to_string()).collect();
        assert_eq!(ids, vec!["alpha", "Bravo", "Charlie", "delta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn registry_failure_drops_answer() {
        let gateway = Gateway::new(Arc::new(MockTransport::connected()), "ledsync");
        let coordinator = DiscoveryCoordinator::default();

        let answers = async {
            while !coordinator.is_active().await {
                tokio::task::yield_now().await;
            }
            coordinator.handle_response(info("B"), &BrokenRegistry).await
        };
        let (found, accepted) = tokio::join!(coordinator.discover(&gateway), answers);

        assert!(!accepted);
        assert!(found.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn each_session_starts_empty() {
        let gateway = Gateway::new(Arc::new(MockTransport::connected()), "ledsync");
        let coordinator = DiscoveryCoordinator::default();
        let registry = InMemoryRegistry::new();

        let answers = async {
            while !coordinator.is_active().await {
                tokio::task::yield_now().await;
            }
            coordinator.handle_response(info("B"), &registry).await;
        };
        let (first, ()) = tokio::join!(coordinator.discover(&gateway), answers);
        assert_eq!(first.unwrap().len(), 1);

        let second = coordinator.discover(&gateway).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn not_connected_fails_and_closes_session() {
        let transport = MockTransport::default();
        let gateway = Gateway::new(Arc::new(transport), "ledsync");
        let coordinator = DiscoveryCoordinator::default();

        let err = coordinator.discover(&gateway).await.unwrap_err();

        assert!(err.is_not_connected());
        assert!(!coordinator.is_active().await);
    }
}
