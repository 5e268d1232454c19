// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gateway events and the listener registry that dispatches them.
//!
//! - [`GatewayEvent`] - Typed event emitted for every accepted bus message
//! - [`ListenerId`] - Handle returned on registration, used for removal
//! - [`ListenerRegistry`] - Thread-safe registry of listener callbacks

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::message::{ConnectedMessage, DeviceInfo, EffectListMessage, StateMessage};

/// An event emitted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The transport connected.
    Connect,
    /// The transport disconnected.
    Disconnect,
    /// A device reported its reachability.
    ConnectedMessage(ConnectedMessage),
    /// A device reported its state without a pending correlated command.
    StateMessage(StateMessage),
    /// A device answered a pending command. Dispatched before the waiting
    /// command is woken.
    CommandResponse(StateMessage),
    /// A device reported its effect list.
    EffectListMessage(EffectListMessage),
    /// A device reported its configuration.
    ConfigMessage(DeviceInfo),
    /// A device answered a discovery ping.
    DiscoveryMessage(DeviceInfo),
}

impl GatewayEvent {
    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> GatewayEventKind {
        match self {
            Self::Connect => GatewayEventKind::Connect,
            Self::Disconnect => GatewayEventKind::Disconnect,
            Self::ConnectedMessage(_) => GatewayEventKind::ConnectedMessage,
            Self::StateMessage(_) => GatewayEventKind::StateMessage,
            Self::CommandResponse(_) => GatewayEventKind::CommandResponse,
            Self::EffectListMessage(_) => GatewayEventKind::EffectListMessage,
            Self::ConfigMessage(_) => GatewayEventKind::ConfigMessage,
            Self::DiscoveryMessage(_) => GatewayEventKind::DiscoveryMessage,
        }
    }
}

/// Discriminant of [`GatewayEvent`], used to filter listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayEventKind {
    /// [`GatewayEvent::Connect`]
    Connect,
    /// [`GatewayEvent::Disconnect`]
    Disconnect,
    /// [`GatewayEvent::ConnectedMessage`]
    ConnectedMessage,
    /// [`GatewayEvent::StateMessage`]
    StateMessage,
    /// [`GatewayEvent::CommandResponse`]
    CommandResponse,
    /// [`GatewayEvent::EffectListMessage`]
    EffectListMessage,
    /// [`GatewayEvent::ConfigMessage`]
    ConfigMessage,
    /// [`GatewayEvent::DiscoveryMessage`]
    DiscoveryMessage,
}

/// Handle of a registered listener.
///
/// Ids are never reused within one registry, so removing the same id twice
/// is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw id value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}

type Callback = Arc<dyn Fn(&GatewayEvent) + Send + Sync>;

struct Listener {
    /// `None` listens to every kind.
    filter: Option<GatewayEventKind>,
    callback: Callback,
}

/// Registry of event listeners.
///
/// Callbacks are called outside the lock, so a callback may register or
/// remove listeners itself.
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<ListenerId, Listener>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `callback` for events of `filter`, or for every event when
    /// `filter` is `None`.
    pub fn add<F>(&self, filter: Option<GatewayEventKind>, callback: F) -> ListenerId
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().insert(
            id,
            Listener {
                filter,
                callback: Arc::new(callback),
            },
        );
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Calls every listener interested in `event`.
    pub fn dispatch(&self, event: &GatewayEvent) {
        let kind = event.kind();
        let callbacks: Vec<Callback> = self
            .listeners
            .read()
            .values()
            .filter(|listener| listener.filter.is_none_or(|filter| filter == kind))
            .map(|listener| Arc::clone(&listener.callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish_non_exhaustive()
    }
}
