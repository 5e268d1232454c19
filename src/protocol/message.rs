// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed JSON payloads exchanged with LED controllers.
//!
//! Decoding validates the payload against the schema of its topic kind:
//! constrained values are range-checked by their types, and the device id
//! carried in the payload must match the one in the topic.

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ValueError};
use crate::event::DeviceId;
use crate::state::StatePatch;
use crate::types::{Brightness, PowerState, RgbColor, Speed};

use super::topic::{DecodedTopic, MessageKind};

/// Reachability code carried by a `connected` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ConnectionStatus {
    /// The device left the bus (also the last-will payload).
    Disconnected,
    /// The device is online.
    Connected,
}

impl ConnectionStatus {
    /// Returns `true` for [`ConnectionStatus::Connected`].
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl TryFrom<u8> for ConnectionStatus {
    type Error = ValueError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Disconnected),
            2 => Ok(Self::Connected),
            other => Err(ValueError::InvalidConnectionStatus(other)),
        }
    }
}

impl From<ConnectionStatus> for u8 {
    fn from(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Disconnected => 0,
            ConnectionStatus::Connected => 2,
        }
    }
}

/// Payload of `<ns>/<id>/connected`.
///
/// # Examples
///
/// ```
/// use ledsync_lib::protocol::ConnectedMessage;
///
/// let msg: ConnectedMessage = serde_json::from_str(r#"{"name":"L1","connection":2}"#).unwrap();
/// assert!(msg.connection.is_connected());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedMessage {
    /// Reporting device.
    pub name: DeviceId,
    /// Reachability code.
    pub connection: ConnectionStatus,
}

/// Payload of `<ns>/<id>/state`.
///
/// Every state field is optional so partial reports merge cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMessage {
    /// Correlation id echoed from the command this report answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_id: Option<u32>,
    /// Reporting device.
    #[serde(alias = "deviceId")]
    pub name: DeviceId,
    /// Power state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PowerState>,
    /// Strip color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<RgbColor>,
    /// Brightness level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Brightness>,
    /// Effect name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    /// Effect speed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<Speed>,
}

impl StateMessage {
    /// Converts the reported fields into a cache patch.
    #[must_use]
    pub fn patch(&self) -> StatePatch {
        StatePatch {
            connected: None,
            on: self.state.map(PowerState::is_on),
            brightness: self.brightness,
            color: self.color,
            effect: self.effect.clone(),
            speed: self.speed,
        }
    }
}

/// Payload of `<ns>/<id>/command`.
///
/// Only the fields being changed are serialized.
///
/// # Examples
///
/// ```
/// use ledsync_lib::event::DeviceId;
/// use ledsync_lib::protocol::CommandMessage;
/// use ledsync_lib::state::StatePatch;
/// use ledsync_lib::types::Brightness;
///
/// let patch = StatePatch::new().with_brightness(Brightness::new(40).unwrap());
/// let msg = CommandMessage::new(&DeviceId::new("L1"), 77, &patch);
///
/// assert_eq!(msg.to_json().unwrap(), r#"{"mutationId":77,"name":"L1","brightness":40}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    /// Correlation id the device echoes back.
    pub mutation_id: u32,
    /// Target device.
    pub name: DeviceId,
    /// Power state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PowerState>,
    /// Strip color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<RgbColor>,
    /// Brightness level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Brightness>,
    /// Effect name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    /// Effect speed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<Speed>,
}

impl CommandMessage {
    /// Builds a command carrying the device-settable fields of `patch`.
    #[must_use]
    pub fn new(id: &DeviceId, mutation_id: u32, patch: &StatePatch) -> Self {
        Self {
            mutation_id,
            name: id.clone(),
            state: patch.on.map(PowerState::from),
            color: patch.color,
            brightness: patch.brightness,
            effect: patch.effect.clone(),
            speed: patch.speed,
        }
    }

    /// Serializes the command.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, ParseError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Payload of `<ns>/<id>/effects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectListMessage {
    /// Reporting device.
    pub name: DeviceId,
    /// Effect names the firmware supports.
    pub effect_list: Vec<String>,
}

/// Hardware configuration reported on `config` and `hello`.
///
/// # Examples
///
/// ```
/// use ledsync_lib::protocol::DeviceInfo;
///
/// let json = r#"{"id":"L1","name":"Desk","version":"1.2.0","numLeds":60,"udpPort":7778}"#;
/// let info: DeviceInfo = serde_json::from_str(json).unwrap();
/// assert_eq!(info.id.as_str(), "L1");
/// assert_eq!(info.num_leds, 60);
/// assert!(info.mac_address.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device id.
    pub id: DeviceId,
    /// Human readable name.
    pub name: String,
    /// Firmware version.
    #[serde(default)]
    pub version: String,
    /// Controller board.
    #[serde(default)]
    pub hardware: String,
    /// Channel order of the strip, e.g. `GRB`.
    #[serde(default)]
    pub color_order: String,
    /// LED chipset, e.g. `WS2812B`.
    #[serde(default)]
    pub strip_type: String,
    /// IP address on the local network.
    #[serde(default)]
    pub ip_address: String,
    /// MAC address.
    #[serde(default)]
    pub mac_address: String,
    /// Number of LEDs on the strip.
    #[serde(default)]
    pub num_leds: u32,
    /// Port for realtime UDP streaming.
    #[serde(default)]
    pub udp_port: u16,
}

impl DeviceInfo {
    /// Creates a record with only id and name filled in.
    #[must_use]
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: String::new(),
            hardware: String::new(),
            color_order: String::new(),
            strip_type: String::new(),
            ip_address: String::new(),
            mac_address: String::new(),
            num_leds: 0,
            udp_port: 0,
        }
    }
}

/// A validated message received from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Reachability report.
    Connected(ConnectedMessage),
    /// Live state report.
    State(StateMessage),
    /// Effect list report.
    EffectList(EffectListMessage),
    /// Configuration report.
    Config(DeviceInfo),
    /// Answer to a discovery ping.
    DiscoveryResponse(DeviceInfo),
}

impl InboundMessage {
    /// Decodes and validates `payload` received on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` for malformed JSON or out-of-range values,
    /// `ParseError::DeviceMismatch` if the payload names another device and
    /// `ParseError::UnexpectedFormat` for outbound kinds.
    pub fn decode(topic: &DecodedTopic, payload: &[u8]) -> Result<Self, ParseError> {
        let message = match topic.kind {
            MessageKind::Connected => Self::Connected(serde_json::from_slice(payload)?),
            MessageKind::State => Self::State(serde_json::from_slice(payload)?),
            MessageKind::EffectList => Self::EffectList(serde_json::from_slice(payload)?),
            MessageKind::Config => Self::Config(serde_json::from_slice(payload)?),
            MessageKind::DiscoveryResponse => {
                Self::DiscoveryResponse(serde_json::from_slice(payload)?)
            }
            MessageKind::Command | MessageKind::Discovery => {
                return Err(ParseError::UnexpectedFormat(format!(
                    "{} is not an inbound message kind",
                    topic.kind
                )));
            }
        };

        if message.device_id() != &topic.device_id {
            return Err(ParseError::DeviceMismatch {
                topic: topic.device_id.clone(),
                payload: message.device_id().clone(),
            });
        }
        Ok(message)
    }

    /// Returns the device id carried in the payload.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Connected(msg) => &msg.name,
            Self::State(msg) => &msg.name,
            Self::EffectList(msg) => &msg.name,
            Self::Config(info) | Self::DiscoveryResponse(info) => &info.id,
        }
    }
}
