// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identifier type.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Stable identifier of a physical LED controller.
///
/// The id is the device's own name on the bus: it is the middle segment of
/// every per-device topic (`<namespace>/<id>/<kind>`) and the `name` field of
/// its payloads. It is cheap to clone.
///
/// # Examples
///
/// ```
/// use ledsync_lib::event::DeviceId;
///
/// let id = DeviceId::new("L1");
/// assert_eq!(id.as_str(), "L1");
/// assert!(DeviceId::parse("kitchen/strip").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    /// Creates a device identifier without validating it.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Creates a device identifier that is safe to use as a topic segment.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidDeviceId` if the id is empty or contains
    /// `/`, `+` or `#`.
    pub fn parse(id: impl AsRef<str>) -> Result<Self, ValueError> {
        let id = Self::new(id);
        if id.is_topic_safe() {
            Ok(id)
        } else {
            Err(ValueError::InvalidDeviceId(id.0.to_string()))
        }
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id can be embedded in a topic path.
    #[must_use]
    pub fn is_topic_safe(&self) -> bool {
        !self.0.is_empty() && !self.0.contains(['/', '+', '#'])
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
