// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration of the device service.

use std::time::Duration;

use crate::command::DEFAULT_COMMAND_TIMEOUT;
use crate::discovery::DEFAULT_DISCOVERY_WINDOW;
use crate::event::DEFAULT_CAPACITY;

/// Default topic namespace.
pub const DEFAULT_NAMESPACE: &str = "ledsync";

/// Configuration for a [`DeviceService`](super::DeviceService).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ledsync_lib::manager::ServiceConfig;
///
/// let config = ServiceConfig::default()
///     .with_namespace("home/leds")
///     .with_command_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.namespace, "home/leds");
/// assert_eq!(config.discovery_window, Duration::from_millis(1500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// First segment of every topic.
    pub namespace: String,
    /// How long a device has to answer a command.
    pub command_timeout: Duration,
    /// How long discovery answers are collected.
    pub discovery_window: Duration,
    /// Notifications buffered per subscriber before it lags.
    pub notification_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            discovery_window: DEFAULT_DISCOVERY_WINDOW,
            notification_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Sets the topic namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the discovery window.
    #[must_use]
    pub fn with_discovery_window(mut self, window: Duration) -> Self {
        self.discovery_window = window;
        self
    }

    /// Sets the notification buffer size.
    #[must_use]
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.namespace, "ledsync");
        assert_eq!(config.command_timeout, Duration::from_secs(3));
        assert_eq!(config.discovery_window, Duration::from_millis(1500));
        assert_eq!(config.notification_capacity, 256);
    }

    #[test]
    fn setters() {
        let config = ServiceConfig::default()
            .with_namespace("lab")
            .with_command_timeout(Duration::from_millis(250))
            .with_discovery_window(Duration::from_secs(2))
            .with_notification_capacity(8);

        assert_eq!(config.namespace, "lab");
        assert_eq!(config.command_timeout, Duration::from_millis(250));
        assert_eq!(config.discovery_window, Duration::from_secs(2));
        assert_eq!(config.notification_capacity, 8);
    }
}
