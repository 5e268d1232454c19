// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state management types.
//!
//! [`LiveState`] is the last known state of one controller, [`StatePatch`]
//! a partial update of it, and [`StateCache`] the single owner of every
//! live state entry.
//!
//! # Examples
//!
//! ```
//! use ledsync_lib::event::DeviceId;
//! use ledsync_lib::state::{StateCache, StatePatch};
//!
//! let cache = StateCache::new();
//! let id = DeviceId::new("L1");
//! cache.initialize(&id);
//!
//! let state = cache.merge(&id, &StatePatch::new().with_on(true)).unwrap();
//! assert!(state.is_on());
//! ```

mod cache;
mod live_state;
mod state_patch;

pub use cache::StateCache;
pub use live_state::{DEFAULT_EFFECT, LiveState};
pub use state_patch::StatePatch;
