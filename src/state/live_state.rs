// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live state tracking.

use serde::{Deserialize, Serialize};

use crate::types::{Brightness, PowerState, RgbColor, Speed};

use super::StatePatch;

/// Name of the effect a freshly registered device starts with.
pub const DEFAULT_EFFECT: &str = "None";

/// Last known live state of one LED controller.
///
/// Unlike the persisted device record, this snapshot only exists in memory
/// and is rebuilt from bus traffic. A default state means "registered but
/// not heard from yet": disconnected, off, white at full brightness.
///
/// # Examples
///
/// ```
/// use ledsync_lib::state::{LiveState, StatePatch};
/// use ledsync_lib::types::Brightness;
///
/// let mut state = LiveState::default();
/// assert!(!state.is_connected());
///
/// let patch = StatePatch::new().with_on(true).with_brightness(Brightness::new(40).unwrap());
/// assert!(state.apply(&patch));
/// assert!(state.is_on());
/// assert_eq!(state.brightness().value(), 40);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState {
    connected: bool,
    on: bool,
    brightness: Brightness,
    color: RgbColor,
    effect: String,
    speed: Speed,
}

impl Default for LiveState {
    fn default() -> Self {
        Self {
            connected: false,
            on: false,
            brightness: Brightness::MAX,
            color: RgbColor::WHITE,
            effect: DEFAULT_EFFECT.to_string(),
            speed: Speed::DEFAULT,
        }
    }
}

impl LiveState {
    /// Returns whether the device is currently reachable on the bus.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns whether the strip is lit.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Returns the power state as sent on the wire.
    #[must_use]
    pub fn power(&self) -> PowerState {
        PowerState::from(self.on)
    }

    /// Returns the brightness.
    #[must_use]
    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    /// Returns the color.
    #[must_use]
    pub fn color(&self) -> RgbColor {
        self.color
    }

    /// Returns the running effect name.
    #[must_use]
    pub fn effect(&self) -> &str {
        &self.effect
    }

    /// Returns the effect speed.
    #[must_use]
    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Shallow-merges the fields present in `patch`.
    ///
    /// Returns `true` if any field actually changed.
    pub fn apply(&mut self, patch: &StatePatch) -> bool {
        let before = self.clone();

        if let Some(connected) = patch.connected {
            self.connected = connected;
        }
        if let Some(on) = patch.on {
            self.on = on;
        }
        if let Some(brightness) = patch.brightness {
            self.brightness = brightness;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(effect) = &patch.effect {
            self.effect.clone_from(effect);
        }
        if let Some(speed) = patch.speed {
            self.speed = speed;
        }

        *self != before
    }
}
