// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Communication with LED controllers over a publish/subscribe bus.
//!
//! # Layers
//!
//! - [`Topics`]: topic layout, `<namespace>/<device>/<kind>`
//! - [`InboundMessage`], [`CommandMessage`]: typed, validated payloads
//! - [`Transport`]: the connection the gateway drives
//! - [`MqttBroker`]: `rumqttc`-backed transport (feature `mqtt`)
//! - [`Gateway`]: subscribe/publish plus typed event dispatch

mod gateway;
mod listeners;
mod message;
#[cfg(feature = "mqtt")]
mod mqtt_broker;
mod topic;
pub(crate) mod transport;

pub use gateway::{DISCOVERY_PING, Gateway, ResponseListener};
pub use listeners::{GatewayEvent, GatewayEventKind, ListenerId, ListenerRegistry};
pub use message::{
    CommandMessage, ConnectedMessage, ConnectionStatus, DeviceInfo, EffectListMessage,
    InboundMessage, StateMessage,
};
#[cfg(feature = "mqtt")]
pub use mqtt_broker::{MqttBroker, MqttBrokerBuilder, MqttBrokerConfig};
pub use topic::{DecodedTopic, MessageKind, Topics};
pub use transport::{Transport, TransportEvent};
