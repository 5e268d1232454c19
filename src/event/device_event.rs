// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use serde::{Deserialize, Serialize};

use crate::protocol::DeviceInfo;
use crate::state::LiveState;

use super::DeviceId;

/// Durable device data that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum DeviceChange {
    /// The device reported the effects it supports.
    EffectList(Vec<String>),
    /// The device reported its configuration.
    Info(DeviceInfo),
}

/// Notifications emitted by the device service.
///
/// Every event carries the affected device id and the new data, so a
/// consumer never has to query back.
///
/// # Examples
///
/// ```
/// use ledsync_lib::event::{DeviceEvent, DeviceId};
/// use ledsync_lib::state::LiveState;
///
/// let event = DeviceEvent::state_changed(DeviceId::new("L1"), LiveState::default());
/// assert_eq!(event.device_id().as_str(), "L1");
/// assert!(event.is_state_change());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// A device was registered.
    #[serde(rename_all = "camelCase")]
    DeviceAdded {
        /// The ID of the added device.
        device_id: DeviceId,
        /// Its configuration.
        info: DeviceInfo,
    },

    /// A device was deregistered.
    #[serde(rename_all = "camelCase")]
    DeviceRemoved {
        /// The ID of the removed device.
        device_id: DeviceId,
    },

    /// Durable data of a device changed.
    #[serde(rename_all = "camelCase")]
    DeviceChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// What changed.
        change: DeviceChange,
    },

    /// The live state of a device changed.
    #[serde(rename_all = "camelCase")]
    DeviceStateChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// The complete new state of the device.
        state: LiveState,
    },
}

impl DeviceEvent {
    /// Returns the device ID associated with this event.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::DeviceAdded { device_id, .. }
            | Self::DeviceRemoved { device_id }
            | Self::DeviceChanged { device_id, .. }
            | Self::DeviceStateChanged { device_id, .. } => device_id,
        }
    }

    /// Returns `true` if this is a device lifecycle event (added/removed).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::DeviceAdded { .. } | Self::DeviceRemoved { .. })
    }

    /// Returns `true` if this is a live state event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::DeviceStateChanged { .. })
    }

    /// Creates a device added event.
    #[must_use]
    pub fn device_added(info: DeviceInfo) -> Self {
        Self::DeviceAdded {
            device_id: info.id.clone(),
            info,
        }
    }

    /// Creates a device removed event.
    #[must_use]
    pub fn device_removed(device_id: DeviceId) -> Self {
        Self::DeviceRemoved { device_id }
    }

    /// Creates a device changed event.
    #[must_use]
    pub fn device_changed(device_id: DeviceId, change: DeviceChange) -> Self {
        Self::DeviceChanged { device_id, change }
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(device_id: DeviceId, state: LiveState) -> Self {
        Self::DeviceStateChanged { device_id, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_extraction() {
        let id = DeviceId::new("L1");

        let added = DeviceEvent::device_added(DeviceInfo::new(id.clone(), "Desk"));
        assert_eq!(added.device_id(), &id);

        let removed = DeviceEvent::device_removed(id.clone());
        assert_eq!(removed.device_id(), &id);

        let changed =
            DeviceEvent::device_changed(id.clone(), DeviceChange::EffectList(Vec::new()));
        assert_eq!(changed.device_id(), &id);
    }

    #[test]
    fn event_classification() {
        let id = DeviceId::new("L1");

        assert!(DeviceEvent::device_removed(id.clone()).is_lifecycle());
        assert!(!DeviceEvent::device_removed(id.clone()).is_state_change());
        assert!(DeviceEvent::state_changed(id, LiveState::default()).is_state_change());
    }

    #[test]
    fn serializes_tagged() {
        let event = DeviceEvent::device_changed(
            DeviceId::new("L1"),
            DeviceChange::EffectList(vec!["Rainbow".to_string()]),
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "deviceChanged");
        assert_eq!(json["deviceId"], "L1");
        assert_eq!(json["change"]["kind"], "effectList");
        assert_eq!(json["change"]["value"][0], "Rainbow");
    }
}
