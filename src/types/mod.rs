// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for LED controller state.
//!
//! Each type ensures its value is within the valid range at construction
//! time, and the same check runs when a payload is deserialized.
//!
//! # Types
//!
//! - [`PowerState`] - On/Off
//! - [`Brightness`] - Brightness level (0-100%)
//! - [`RgbColor`] - Color with 8-bit channels
//! - [`Speed`] - Effect speed (1-7)

mod brightness;
mod power;
mod rgb_color;
mod speed;

pub use brightness::Brightness;
pub use power::PowerState;
pub use rgb_color::RgbColor;
pub use speed::Speed;
