// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic layout of the LED bus.
//!
//! Every per-device topic has the shape `<namespace>/<device id>/<segment>`:
//!
//! ```text
//! ledsync/L1/connected   device -> system   reachability (last will)
//! ledsync/L1/state       device -> system   reported live state
//! ledsync/L1/effects     device -> system   supported effect names
//! ledsync/L1/config      device -> system   hardware configuration
//! ledsync/L1/command     system -> device   requested state change
//! ledsync/L1/hello       device -> system   answer to a discovery ping
//! ledsync/discovery      system -> all      discovery ping
//! ```

use std::fmt;

use crate::event::DeviceId;

/// Kind of message carried by a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Reachability report, also used as the device's last will.
    Connected,
    /// Reported live state.
    State,
    /// Supported effect names.
    EffectList,
    /// Hardware configuration.
    Config,
    /// Outbound state change request.
    Command,
    /// Broadcast discovery ping.
    Discovery,
    /// A device answering a discovery ping.
    DiscoveryResponse,
}

impl MessageKind {
    /// Every kind, in wire order.
    pub const ALL: [Self; 7] = [
        Self::Connected,
        Self::State,
        Self::EffectList,
        Self::Config,
        Self::Command,
        Self::Discovery,
        Self::DiscoveryResponse,
    ];

    /// The four kinds a device is subscribed to once registered.
    pub const DEVICE_SUBSCRIPTIONS: [Self; 4] =
        [Self::Connected, Self::State, Self::EffectList, Self::Config];

    /// Returns the last topic segment for this kind.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::State => "state",
            Self::EffectList => "effects",
            Self::Config => "config",
            Self::Command => "command",
            Self::Discovery => "discovery",
            Self::DiscoveryResponse => "hello",
        }
    }

    /// Parses a topic segment.
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.segment() == segment)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A per-device topic split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTopic {
    /// Device the topic belongs to.
    pub device_id: DeviceId,
    /// Kind of message carried.
    pub kind: MessageKind,
}

/// Builds and parses topics under one namespace.
///
/// # Examples
///
/// ```
/// use ledsync_lib::event::DeviceId;
/// use ledsync_lib::protocol::{MessageKind, Topics};
///
/// let topics = Topics::new("ledsync");
/// let id = DeviceId::new("L1");
///
/// let topic = topics.device(MessageKind::State, &id);
/// assert_eq!(topic, "ledsync/L1/state");
///
/// let decoded = topics.decode(&topic).unwrap();
/// assert_eq!(decoded.kind, MessageKind::State);
/// assert_eq!(decoded.device_id, id);
///
/// assert!(topics.decode("other/L1/state").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    namespace: String,
}

impl Topics {
    /// Creates a codec for `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Returns the namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns `<namespace>/<id>/<segment>`.
    #[must_use]
    pub fn device(&self, kind: MessageKind, id: &DeviceId) -> String {
        format!("{}/{}/{}", self.namespace, id, kind.segment())
    }

    /// Returns the broadcast discovery topic, `<namespace>/discovery`.
    #[must_use]
    pub fn discovery(&self) -> String {
        format!("{}/{}", self.namespace, MessageKind::Discovery.segment())
    }

    /// Returns the wildcard matching every discovery answer,
    /// `<namespace>/+/hello`.
    #[must_use]
    pub fn discovery_wildcard(&self) -> String {
        format!(
            "{}/+/{}",
            self.namespace,
            MessageKind::DiscoveryResponse.segment()
        )
    }

    /// Splits a per-device topic into device id and kind.
    ///
    /// Returns `None` for any topic outside the namespace, with a segment
    /// count other than three, an empty device id or an unknown kind.
    #[must_use]
    pub fn decode(&self, topic: &str) -> Option<DecodedTopic> {
        let rest = topic
            .strip_prefix(self.namespace.as_str())?
            .strip_prefix('/')?;
        let (device, segment) = rest.split_once('/')?;
        if device.is_empty() || segment.contains('/') {
            return None;
        }

        Some(DecodedTopic {
            device_id: DeviceId::new(device),
            kind: MessageKind::from_segment(segment)?,
        })
    }
}
