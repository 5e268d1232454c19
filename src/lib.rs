// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `LedSync` Lib - keeps a fleet of networked LED controllers in sync.
//!
//! Controllers publish their reachability, state, effect list and
//! configuration on a publish/subscribe bus and accept commands on it.
//! This library tracks the live state of every registered controller,
//! correlates commands with the state reports they produce, and finds
//! controllers that are not registered yet.
//!
//! # Supported Features
//!
//! - **Live state**: power, brightness, color, effect and speed per device
//! - **Commands**: state changes confirmed by the device or timed out
//! - **Discovery**: timed collection of unregistered controllers
//! - **Reconnects**: subscriptions restored on every transport connect
//! - **Notifications**: broadcast stream of device lifecycle and state events
//!
//! # Quick Start
//!
//! ```no_run
//! use ledsync_lib::{DeviceId, DeviceService, InMemoryRegistry, ServiceConfig, StatePatch};
//! use ledsync_lib::protocol::MqttBroker;
//! use ledsync_lib::types::RgbColor;
//!
//! #[tokio::main]
//! async fn main() -> ledsync_lib::Result<()> {
//!     let (broker, events) = MqttBroker::builder()
//!         .host("192.168.1.50")
//!         .credentials("user", "pass")
//!         .build()
//!         .await?;
//!
//!     let service = DeviceService::new(broker, InMemoryRegistry::new(), ServiceConfig::default());
//!     service.start(events).await?;
//!
//!     for device in service.discover().await? {
//!         service.add_device(device.info).await?;
//!     }
//!
//!     let patch = StatePatch::new()
//!         .with_on(true)
//!         .with_color(RgbColor::from_hex("#ff8800")?);
//!     let state = service.set_state(&DeviceId::new("L1"), &patch).await?;
//!     println!("L1: {state:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `mqtt` (default): [`protocol::MqttBroker`], a `rumqttc` transport
//!
//! Without `mqtt` the crate still builds; hosts then supply their own
//! [`protocol::Transport`].

pub mod command;
pub mod discovery;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod types;

pub use discovery::{DiscoveredDevice, DiscoveryCoordinator};
pub use error::{Error, ParseError, ProtocolError, Result, ValueError};
pub use event::{DeviceChange, DeviceEvent, DeviceId, EventBus};
pub use manager::{DeviceRecord, DeviceRegistry, DeviceService, InMemoryRegistry, ServiceConfig};
#[cfg(feature = "mqtt")]
pub use protocol::{MqttBroker, MqttBrokerBuilder, MqttBrokerConfig};
pub use protocol::{DeviceInfo, Gateway, Transport, TransportEvent};
pub use state::{LiveState, StatePatch};
pub use types::{Brightness, PowerState, RgbColor, Speed};
