// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Correlated commands.
//!
//! A command is a `command` message carrying a `mutationId`; the device
//! answers with a `state` message echoing it. The [`Correlator`] pairs the
//! two and gives up after a timeout.

mod correlator;
mod pending;

pub use correlator::{Correlator, DEFAULT_COMMAND_TIMEOUT};
pub use pending::PendingCommand;
