// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet management on top of the gateway.
//!
//! # Overview
//!
//! [`DeviceService`] is the entry point for hosts. It owns the live state
//! of every registered controller and keeps it current from the bus:
//!
//! - **Registry**: device records live behind the [`DeviceRegistry`] trait;
//!   [`InMemoryRegistry`] is the bundled implementation
//! - **Connection tracking**: [`ConnectionStateMachine`] resubscribes on
//!   connect and marks every device unreachable on disconnect
//! - **Commands**: [`DeviceService::set_state`] publishes a command and
//!   waits for the matching state report
//! - **Notifications**: [`DeviceService::subscribe`] yields a
//!   [`DeviceEvent`](crate::event::DeviceEvent) stream
//!
//! # Examples
//!
//! ```no_run
//! use ledsync_lib::event::DeviceId;
//! use ledsync_lib::manager::{DeviceService, InMemoryRegistry, ServiceConfig};
//! use ledsync_lib::protocol::{DeviceInfo, MqttBroker};
//!
//! #[tokio::main]
//! async fn main() -> ledsync_lib::Result<()> {
//!     let (broker, events) = MqttBroker::builder().host("192.168.1.50").build().await?;
//!     let service = DeviceService::new(broker, InMemoryRegistry::new(), ServiceConfig::default());
//!     service.start(events).await?;
//!
//!     service
//!         .add_device(DeviceInfo::new(DeviceId::new("L1"), "Living room strip"))
//!         .await?;
//!     println!("{:?}", service.state(&DeviceId::new("L1"))?);
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod registry;
mod service;

pub use config::{DEFAULT_NAMESPACE, ServiceConfig};
pub use connection::{ConnectionState, ConnectionStateMachine};
pub use registry::{DeviceRecord, DeviceRegistry, InMemoryRegistry};
pub use service::DeviceService;
