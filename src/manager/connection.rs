// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus connection lifecycle.

use futures::future::join_all;
use parking_lot::Mutex;

use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::protocol::{Gateway, Transport};
use crate::state::{StateCache, StatePatch};

use super::DeviceRegistry;

/// Whether the bus is reachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state; also entered on every transport disconnect.
    #[default]
    Disconnected,
    /// The transport is up.
    Connected,
}

/// Reacts to transport connects and disconnects.
///
/// On connect every registered device is resubscribed and the discovery
/// wildcard is re-armed. On disconnect every device is marked disconnected.
/// A transition to the current state is a no-op.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: Mutex<ConnectionState>,
}

impl ConnectionStateMachine {
    /// Creates a machine in [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Returns `true` in [`ConnectionState::Connected`].
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Moves to `next`. Returns `false` if already there.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if *state == next {
            return false;
        }
        *state = next;
        true
    }

    /// Handles a transport connect.
    ///
    /// Returns the number of devices resubscribed, or `None` if the machine
    /// was already connected.
    pub async fn on_connect<T, R>(&self, gateway: &Gateway<T>, registry: &R) -> Option<usize>
    where
        T: Transport,
        R: DeviceRegistry,
    {
        if !self.transition(ConnectionState::Connected) {
            tracing::debug!("Already connected, ignoring connect");
            return None;
        }

        let ids = match registry.list_device_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list devices for resubscription");
                Vec::new()
            }
        };

        let results = join_all(ids.iter().map(|id| async move {
            let result = gateway.subscribe_to_device(id).await;
            if let Err(e) = &result {
                tracing::warn!(device = %id, error = %e, "Failed to resubscribe device");
            }
            result.is_ok()
        }))
        .await;
        let subscribed = results.into_iter().filter(|ok| *ok).count();

        if let Err(e) = gateway.start_discovery().await {
            tracing::warn!(error = %e, "Failed to re-arm discovery subscription");
        }

        tracing::info!(
            devices = ids.len(),
            subscribed,
            "Connected, device subscriptions restored"
        );
        Some(subscribed)
    }

    /// Handles a transport disconnect.
    ///
    /// Every registered device gets a `connected = false` merge; a device
    /// whose merge fails is logged and skipped. Falls back to the ids in the
    /// cache if the registry cannot be listed. Returns the number of
    /// devices notified, or `None` if the machine was already disconnected.
    pub async fn on_disconnect<R>(
        &self,
        registry: &R,
        cache: &StateCache,
        events: &EventBus,
    ) -> Option<usize>
    where
        R: DeviceRegistry,
    {
        if !self.transition(ConnectionState::Disconnected) {
            tracing::debug!("Already disconnected, ignoring disconnect");
            return None;
        }

        let ids: Vec<DeviceId> = match registry.list_device_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list devices, using cached ids");
                cache.ids()
            }
        };

        let patch = StatePatch::connection(false);
        let mut notified = 0;
        for id in ids {
            match cache.merge(&id, &patch) {
                Ok(state) => {
                    events.publish(DeviceEvent::state_changed(id, state));
                    notified += 1;
                }
                Err(e) => {
                    tracing::warn!(device = %id, error = %e, "Failed to mark device disconnected");
                }
            }
        }

        tracing::info!(notified, "Disconnected, devices marked unreachable");
        Some(notified)
    }
}
