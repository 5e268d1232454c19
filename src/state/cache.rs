// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory cache of live device state.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{Error, Result};
use crate::event::DeviceId;

use super::{LiveState, StatePatch};

/// Map from device id to its last known [`LiveState`].
///
/// An entry exists only for devices that were explicitly initialized:
/// [`merge`](Self::merge) never creates one. Operations on different ids
/// land on different shards and do not block each other; a merge holds the
/// shard guard for its whole read-modify-write.
///
/// # Examples
///
/// ```
/// use ledsync_lib::event::DeviceId;
/// use ledsync_lib::state::{StateCache, StatePatch};
///
/// let cache = StateCache::new();
/// let id = DeviceId::new("L1");
///
/// assert!(cache.merge(&id, &StatePatch::connection(true)).is_err());
///
/// cache.initialize(&id);
/// let state = cache.merge(&id, &StatePatch::connection(true)).unwrap();
/// assert!(state.is_connected());
/// ```
#[derive(Debug, Default)]
pub struct StateCache {
    entries: DashMap<DeviceId, LiveState>,
}

impl StateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the default entry for `id`.
    ///
    /// Returns `false` and keeps the current state if the device was already
    /// initialized.
    pub fn initialize(&self, id: &DeviceId) -> bool {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(LiveState::default());
                true
            }
        }
    }

    /// Returns a snapshot of the state of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the device was never initialized.
    pub fn get(&self, id: &DeviceId) -> Result<LiveState> {
        self.entries
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::DeviceNotFound(id.clone()))
    }

    /// Shallow-merges `patch` into the state of `id` and returns the result.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the device was never initialized.
    pub fn merge(&self, id: &DeviceId, patch: &StatePatch) -> Result<LiveState> {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::DeviceNotFound(id.clone()))?;
        entry.apply(patch);
        Ok(entry.value().clone())
    }

    /// Removes the entry of `id`. Returns `true` if one existed.
    pub fn clear(&self, id: &DeviceId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Returns `true` if `id` has an entry.
    #[must_use]
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns the ids of every initialized device.
    #[must_use]
    pub fn ids(&self) -> Vec<DeviceId> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no device is initialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::Brightness;

    #[test]
    fn merge_never_upserts() {
        let cache = StateCache::new();
        let id = DeviceId::new("ghost");

        let err = cache
            .merge(&id, &StatePatch::new().with_on(true))
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(!cache.contains(&id));
        assert!(cache.is_empty());
    }

    #[test]
    fn get_unknown_is_not_found() {
        let cache = StateCache::new();
        assert!(cache.get(&DeviceId::new("L1")).unwrap_err().is_not_found());
    }

    #[test]
    fn initialize_creates_default() {
        let cache = StateCache::new();
        let id = DeviceId::new("L1");

        assert!(cache.initialize(&id));
        assert_eq!(cache.get(&id).unwrap(), LiveState::default());
    }

    #[test]
    fn initialize_keeps_existing_state() {
        let cache = StateCache::new();
        let id = DeviceId::new("L1");
        cache.initialize(&id);
        cache.merge(&id, &StatePatch::new().with_on(true)).unwrap();

        assert!(!cache.initialize(&id));
        assert!(cache.get(&id).unwrap().is_on());
    }

    #[test]
    fn merge_is_shallow() {
        let cache = StateCache::new();
        let id = DeviceId::new("L1");
        cache.initialize(&id);

        cache
            .merge(&id, &StatePatch::new().with_brightness(Brightness::clamped(40)))
            .unwrap();
        let state = cache.merge(&id, &StatePatch::new().with_on(true)).unwrap();

        assert!(state.is_on());
        assert_eq!(state.brightness().value(), 40);
    }

    #[test]
    fn clear_removes_entry() {
        let cache = StateCache::new();
        let id = DeviceId::new("L1");
        cache.initialize(&id);

        assert!(cache.clear(&id));
        assert!(!cache.clear(&id));
        assert!(cache.get(&id).is_err());
    }

    #[test]
    fn ids_lists_initialized_devices() {
        let cache = StateCache::new();
        cache.initialize(&DeviceId::new("A"));
        cache.initialize(&DeviceId::new("B"));

        let mut ids = cache.ids();
        ids.sort();
        assert_eq!(ids, vec![DeviceId::new("A"), DeviceId::new("B")]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_merges_on_same_id_do_not_interleave() {
        let cache = Arc::new(StateCache::new());
        let id = DeviceId::new("L1");
        cache.initialize(&id);

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let on = i % 2 == 0;
                        cache
                            .merge(
                                &id,
                                &StatePatch::new()
                                    .with_on(on)
                                    .with_brightness(Brightness::clamped(if on { 100 } else { 0 })),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = cache.get(&id).unwrap();
        let expected = if state.is_on() { 100 } else { 0 };
        assert_eq!(state.brightness().value(), expected);
    }
}
