// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Partial state updates.
//!
//! A [`StatePatch`] carries only the fields that changed. It is what a
//! caller asks a device to become, what a `state` report contributes to the
//! cache, and what a `connected` report or a bus outage flips.

use crate::types::{Brightness, RgbColor, Speed};

/// A partial [`LiveState`](super::LiveState): every `None` field is left
/// untouched by a merge and omitted from an outbound command.
///
/// # Examples
///
/// ```
/// use ledsync_lib::state::StatePatch;
/// use ledsync_lib::types::{Brightness, Speed};
///
/// let patch = StatePatch::new()
///     .with_brightness(Brightness::new(40).unwrap())
///     .with_speed(Speed::new(2).unwrap());
/// assert!(!patch.is_empty());
/// assert!(patch.on.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    /// Reachability on the bus. Never sent to a device.
    pub connected: Option<bool>,
    /// Lit or dark.
    pub on: Option<bool>,
    /// Brightness level.
    pub brightness: Option<Brightness>,
    /// Strip color.
    pub color: Option<RgbColor>,
    /// Effect name.
    pub effect: Option<String>,
    /// Effect speed.
    pub speed: Option<Speed>,
}

impl StatePatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that only marks the device (un)reachable.
    #[must_use]
    pub fn connection(connected: bool) -> Self {
        Self::new().with_connected(connected)
    }

    /// Sets the connected flag.
    #[must_use]
    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = Some(connected);
        self
    }

    /// Sets the on/off state.
    #[must_use]
    pub fn with_on(mut self, on: bool) -> Self {
        self.on = Some(on);
        self
    }

    /// Sets the brightness.
    #[must_use]
    pub fn with_brightness(mut self, brightness: Brightness) -> Self {
        self.brightness = Some(brightness);
        self
    }

    /// Sets the color.
    #[must_use]
    pub fn with_color(mut self, color: RgbColor) -> Self {
        self.color = Some(color);
        self
    }

    /// Sets the effect.
    #[must_use]
    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effect = Some(effect.into());
        self
    }

    /// Sets the effect speed.
    #[must_use]
    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Returns `true` if the patch carries no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connected.is_none() && !self.has_device_fields()
    }

    /// Returns `true` if the patch carries a field a device can change.
    #[must_use]
    pub fn has_device_fields(&self) -> bool {
        self.on.is_some()
            || self.brightness.is_some()
            || self.color.is_some()
            || self.effect.is_some()
            || self.speed.is_some()
    }
}
