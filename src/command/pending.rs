// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-flight command record.

use std::time::Duration;

use tokio::time::Instant;

use crate::event::DeviceId;
use crate::protocol::CommandMessage;

/// A command that was published and is waiting for its answer.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    command: CommandMessage,
    deadline: Instant,
}

impl PendingCommand {
    /// Creates a record for `command`, expiring `timeout` from now.
    #[must_use]
    pub fn new(command: CommandMessage, timeout: Duration) -> Self {
        Self {
            command,
            deadline: Instant::now() + timeout,
        }
    }

    /// Returns the correlation id.
    #[must_use]
    pub fn mutation_id(&self) -> u32 {
        self.command.mutation_id
    }

    /// Returns the target device.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.command.name
    }

    /// Returns the outbound payload.
    #[must_use]
    pub fn command(&self) -> &CommandMessage {
        &self.command
    }

    /// Returns the instant the command gives up.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}
