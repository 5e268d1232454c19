// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The publish/subscribe seam under the gateway.

use std::future::Future;

use crate::error::Result;

/// Something that happened on the underlying connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection to the bus was (re)established.
    Connected,
    /// The connection to the bus was lost.
    Disconnected,
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message was published to.
        topic: String,
        /// Raw payload.
        payload: Vec<u8>,
    },
}

/// A topic-based, at-most-once publish/subscribe connection.
///
/// Implementations report connection transitions and inbound messages as
/// [`TransportEvent`]s through a channel handed out at construction time;
/// this trait only covers the outbound half. Reconnection is the
/// implementation's business: the gateway only observes transitions.
pub trait Transport: Send + Sync + 'static {
    /// Returns `true` while the connection is up.
    fn is_connected(&self) -> bool;

    /// Subscribes to `topic`.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<()>> + Send;

    /// Unsubscribes from `topic`.
    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<()>> + Send;

    /// Publishes `payload` to `topic`.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> impl Future<Output = Result<()>> + Send;
}
