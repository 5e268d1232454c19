// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notification events for device changes.
//!
//! The [`EventBus`] uses tokio's broadcast channel so any number of
//! consumers (typically an API layer fanning out to its own clients) can
//! receive every [`DeviceEvent`].
//!
//! # Examples
//!
//! ```
//! use ledsync_lib::event::{DeviceEvent, DeviceId, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(DeviceEvent::device_removed(DeviceId::new("L1")));
//! assert!(rx.try_recv().is_ok());
//! ```

mod device_event;
mod device_id;
mod event_bus;

pub use device_event::{DeviceChange, DeviceEvent};
pub use device_id::DeviceId;
pub use event_bus::{DEFAULT_CAPACITY, EventBus};
