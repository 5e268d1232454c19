// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device registry seam.
//!
//! Durable device records live outside this library. The service only needs
//! the operations of [`DeviceRegistry`]; [`InMemoryRegistry`] implements
//! them for hosts without persistence.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::DeviceId;
use crate::protocol::DeviceInfo;

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Configuration reported by the device.
    pub info: DeviceInfo,
    /// Effects the device supports, empty until it reports them.
    #[serde(default)]
    pub effects: Vec<String>,
}

impl DeviceRecord {
    /// Creates a record without effects.
    #[must_use]
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            effects: Vec::new(),
        }
    }

    /// Returns the device id.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.info.id
    }
}

/// Storage of registered devices.
///
/// Errors from an implementation are surfaced as `Error::Registry` or
/// `Error::DeviceNotFound`.
pub trait DeviceRegistry: Send + Sync + 'static {
    /// Returns the ids of every registered device.
    fn list_device_ids(&self) -> impl Future<Output = Result<Vec<DeviceId>>> + Send;

    /// Returns `true` if `id` is registered.
    fn exists(&self, id: &DeviceId) -> impl Future<Output = Result<bool>> + Send;

    /// Returns the record of `id`, if registered.
    fn get(&self, id: &DeviceId) -> impl Future<Output = Result<Option<DeviceRecord>>> + Send;

    /// Registers a new device.
    fn insert(&self, record: DeviceRecord) -> impl Future<Output = Result<()>> + Send;

    /// Deregisters `id`. Returns `false` if it was not registered.
    fn remove(&self, id: &DeviceId) -> impl Future<Output = Result<bool>> + Send;

    /// Replaces the effect list of `id`.
    fn update_effect_list(
        &self,
        id: &DeviceId,
        effects: Vec<String>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Replaces the configuration of `info.id`.
    fn update_info(&self, info: DeviceInfo) -> impl Future<Output = Result<()>> + Send;
}

/// A [`DeviceRegistry`] kept in memory.
///
/// # Examples
///
/// ```
/// use ledsync_lib::event::DeviceId;
/// use ledsync_lib::manager::{DeviceRecord, DeviceRegistry, InMemoryRegistry};
/// use ledsync_lib::protocol::DeviceInfo;
///
/// # async fn example() -> ledsync_lib::Result<()> {
/// let registry = InMemoryRegistry::new();
/// registry
///     .insert(DeviceRecord::new(DeviceInfo::new(DeviceId::new("L1"), "Desk")))
///     .await?;
/// assert!(registry.exists(&DeviceId::new("L1")).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    records: RwLock<HashMap<DeviceId, DeviceRecord>>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `records`.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id().clone(), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Returns the number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl DeviceRegistry for InMemoryRegistry {
    async fn list_device_ids(&self) -> Result<Vec<DeviceId>> {
        Ok(self.records.read().keys().cloned().collect())
    }

    async fn exists(&self, id: &DeviceId) -> Result<bool> {
        Ok(self.records.read().contains_key(id))
    }

    async fn get(&self, id: &DeviceId) -> Result<Option<DeviceRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn insert(&self, record: DeviceRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(record.id()) {
            return Err(Error::Registry(format!(
                "device {} is already registered",
                record.id()
            )));
        }
        records.insert(record.id().clone(), record);
        Ok(())
    }

    async fn remove(&self, id: &DeviceId) -> Result<bool> {
        Ok(self.records.write().remove(id).is_some())
    }

    async fn update_effect_list(&self, id: &DeviceId, effects: Vec<String>) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| Error::DeviceNotFound(id.clone()))?;
        record.effects = effects;
        Ok(())
    }

    async fn update_info(&self, info: DeviceInfo) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&info.id)
            .ok_or_else(|| Error::DeviceNotFound(info.id.clone()))?;
        record.info = info;
        Ok(())
    }
}
