// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast sink for device notifications.

use tokio::sync::broadcast;

use super::DeviceEvent;

/// Default number of buffered notifications per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out channel for [`DeviceEvent`]s.
///
/// Publishing never blocks and never fails: without subscribers the event
/// is dropped, and a subscriber that falls more than `capacity` events
/// behind gets `RecvError::Lagged` and skips ahead.
///
/// Clones share the same channel.
///
/// # Examples
///
/// ```
/// use ledsync_lib::event::{DeviceEvent, DeviceId, EventBus};
///
/// let bus = EventBus::with_capacity(16);
/// let mut api = bus.subscribe();
/// let mut log = bus.subscribe();
///
/// assert_eq!(bus.publish(DeviceEvent::device_removed(DeviceId::new("L1"))), 2);
/// assert!(api.try_recv().is_ok());
/// assert!(log.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Creates a bus with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` events per subscriber.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes `event` and returns how many subscribers received it.
    pub fn publish(&self, event: DeviceEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(device = %event.device_id(), "No subscriber for device event");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
