// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request/response correlation over the fire-and-forget bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::event::DeviceId;
use crate::protocol::{CommandMessage, Gateway, ResponseListener, StateMessage, Transport};
use crate::state::StatePatch;

use super::PendingCommand;

/// Default time a device has to answer a command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

/// Turns a published command into an awaitable call.
///
/// Each command carries a `mutationId` from a wrapping counter; the pair
/// (device id, `mutationId`) is the correlation key. An id still pending for
/// the same device is skipped, so two in-flight commands never share a key.
///
/// The call settles exactly once, on whichever comes first of: the
/// matching report arriving, the deadline passing, or the publish failing.
/// The response listener is a drop guard and the deadline a
/// `tokio::time::timeout_at`, so all three paths leave nothing behind.
pub struct Correlator<T> {
    gateway: Arc<Gateway<T>>,
    timeout: Duration,
    next_id: AtomicU32,
}

impl<T: Transport> Correlator<T> {
    /// Creates a correlator waiting `timeout` for each answer.
    #[must_use]
    pub fn new(gateway: Arc<Gateway<T>>, timeout: Duration) -> Self {
        Self {
            gateway,
            timeout,
            next_id: AtomicU32::new(1),
        }
    }

    /// Sets the `mutationId` of the next command.
    #[must_use]
    pub fn with_first_mutation_id(self, mutation_id: u32) -> Self {
        self.next_id.store(mutation_id, Ordering::Relaxed);
        self
    }

    /// Returns the answer timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends the device-settable fields of `patch` to `device_id` and waits
    /// for the state the device reports back.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` if the bus is down; nothing is published.
    /// - The transport error if publishing fails.
    /// - `Error::Timeout` if no matching report arrives in time.
    pub async fn send(&self, device_id: &DeviceId, patch: &StatePatch) -> Result<StateMessage> {
        if !self.gateway.is_connected() {
            return Err(Error::NotConnected);
        }

        // Registered before publishing so a fast answer cannot be missed.
        let mut listener = self.register(device_id);
        let pending = PendingCommand::new(
            CommandMessage::new(device_id, listener.mutation_id(), patch),
            self.timeout,
        );

        self.gateway.publish_command(pending.command()).await?;

        match tokio::time::timeout_at(pending.deadline(), listener.recv()).await {
            Ok(Ok(report)) => {
                tracing::debug!(
                    device = %pending.device_id(),
                    mutation_id = pending.mutation_id(),
                    "Command acknowledged"
                );
                Ok(report)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    device = %pending.device_id(),
                    mutation_id = pending.mutation_id(),
                    "Command timed out"
                );
                // Safe: timeout in practical use will never exceed u64::MAX milliseconds
                #[allow(clippy::cast_possible_truncation)]
                let after_ms = self.timeout.as_millis() as u64;
                Err(Error::Timeout {
                    device_id: device_id.clone(),
                    mutation_id: pending.mutation_id(),
                    after_ms,
                })
            }
        }
    }

    /// Picks the next id not pending for `device_id` and registers its
    /// listener.
    fn register(&self, device_id: &DeviceId) -> ResponseListener {
        loop {
            let mutation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if let Some(listener) = self.gateway.expect_response(device_id, mutation_id) {
                return listener;
            }
            tracing::trace!(device = %device_id, mutation_id, "Mutation id still pending, skipping");
        }
    }
}

impl<T> std::fmt::Debug for Correlator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("timeout", &self.timeout)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
