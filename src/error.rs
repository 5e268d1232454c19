// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `LedSync` library.
//!
//! Outbound operations (publish, subscribe, correlated commands) surface
//! these errors to their direct caller. Inbound message handling never does:
//! malformed payloads are logged and dropped at the gateway boundary.

use thiserror::Error;

use crate::event::DeviceId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A value was outside its allowed range.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Publishing, subscribing or unsubscribing failed at the wire level.
    #[error("transport error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A payload could not be encoded or failed validation.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The device has no live state entry or is not registered.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// The transport is not connected; the operation was not attempted.
    #[error("not connected to the message bus")]
    NotConnected,

    /// The device did not answer a correlated command in time.
    #[error("device {device_id} did not answer mutation {mutation_id} within {after_ms} ms")]
    Timeout {
        /// The device the command was sent to.
        device_id: DeviceId,
        /// The correlation id of the command.
        mutation_id: u32,
        /// How long the correlator waited.
        after_ms: u64,
    },

    /// The external device registry failed.
    #[error("registry error: {0}")]
    Registry(String),
}

impl Error {
    /// Returns `true` if the device did not answer in time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the operation failed because the bus is down.
    #[must_use]
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Returns `true` for cache or registry misses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DeviceNotFound(_))
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },

    /// An invalid power state string was provided.
    #[error("invalid power state: {0}")]
    InvalidPowerState(String),

    /// A hex color string could not be parsed.
    #[error("invalid hex color: {0}")]
    InvalidHexColor(String),

    /// The device id cannot be used as a topic segment.
    #[error("invalid device id: {0:?}")]
    InvalidDeviceId(String),

    /// The connection status code is neither 0 nor 2.
    #[error("invalid connection status: {0}")]
    InvalidConnectionStatus(u8),
}

/// Errors raised by the message transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to decoding and validating payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed, including schema violations.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload names a different device than its topic.
    #[error("payload for {payload} arrived on topic of {topic}")]
    DeviceMismatch {
        /// Device id taken from the topic.
        topic: DeviceId,
        /// Device id carried in the payload.
        payload: DeviceId,
    },

    /// Unexpected payload format.
    #[error("unexpected payload format: {0}")]
    UnexpectedFormat(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
