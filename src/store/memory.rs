//! In-memory resource store
//!
//! Keeps serialized records keyed by (kind, name) with a monotonically
//! increasing resource version. Used in standalone mode and by the unit tests.
//! Finalizers behave as on the API server: deleting a record that still has
//! finalizers only marks it for deletion, and the record disappears once an
//! update clears them.

use super::{kind_of, name_of, ResourceStore, StoredResource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Store operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Read,
    Update,
    Delete,
    List,
}

/// Versioned in-memory resource store
pub struct MemoryStore {
    namespace: String,
    records: RwLock<HashMap<(String, String), serde_json::Value>>,
    version: AtomicU64,
    faults: Mutex<HashMap<(StoreOp, String), usize>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("default")
    }
}

impl MemoryStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            records: RwLock::new(HashMap::new()),
            version: AtomicU64::new(1),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records of a kind
    pub fn count<K: StoredResource>(&self) -> usize {
        let kind = kind_of::<K>();
        self.records.read().keys().filter(|(k, _)| *k == kind).count()
    }

    /// Make the next `op` on kind `K` fail with a store error
    #[cfg(test)]
    pub fn fail_next<K: StoredResource>(&self, op: StoreOp) {
        *self.faults.lock().entry((op, kind_of::<K>())).or_insert(0) += 1;
    }

    fn check_fault<K: StoredResource>(&self, op: StoreOp) -> Result<()> {
        let mut faults = self.faults.lock();
        if let Some(remaining) = faults.get_mut(&(op, kind_of::<K>())) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Store(format!(
                    "injected {:?} failure for {}",
                    op,
                    kind_of::<K>()
                )));
            }
        }
        Ok(())
    }

    fn next_version(&self) -> String {
        self.version.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create<K: StoredResource>(&self, obj: &K) -> Result<K> {
        self.check_fault::<K>(StoreOp::Create)?;
        let name = name_of(obj)?;
        let key = (kind_of::<K>(), name.clone());

        let mut records = self.records.write();
        if records.contains_key(&key) {
            return Err(Error::ResourceExists {
                kind: key.0,
                name,
            });
        }

        let mut created = obj.clone();
        let meta = created.meta_mut();
        meta.namespace = Some(self.namespace.clone());
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.creation_timestamp = Some(Time(Utc::now()));
        meta.deletion_timestamp = None;
        meta.resource_version = Some(self.next_version());

        records.insert(key, serde_json::to_value(&created)?);
        trace!(kind = %kind_of::<K>(), name = %name, "Record created");
        Ok(created)
    }

    async fn read<K: StoredResource>(&self, name: &str) -> Result<K> {
        self.check_fault::<K>(StoreOp::Read)?;
        let records = self.records.read();
        let value = records
            .get(&(kind_of::<K>(), name.to_string()))
            .ok_or_else(|| Error::not_found(kind_of::<K>(), name))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    async fn update<K: StoredResource>(&self, obj: &K) -> Result<K> {
        self.check_fault::<K>(StoreOp::Update)?;
        let name = name_of(obj)?;
        let key = (kind_of::<K>(), name.clone());

        let mut records = self.records.write();
        let current: K = match records.get(&key) {
            Some(value) => serde_json::from_value(value.clone())?,
            None => return Err(Error::not_found(key.0, name)),
        };

        let current_meta = current.meta();
        if let Some(version) = obj.meta().resource_version.as_ref() {
            if current_meta.resource_version.as_ref() != Some(version) {
                return Err(Error::conflict(key.0, name));
            }
        }

        let mut updated = obj.clone();
        let meta = updated.meta_mut();
        meta.namespace = current_meta.namespace.clone();
        meta.uid = current_meta.uid.clone();
        meta.creation_timestamp = current_meta.creation_timestamp.clone();
        meta.deletion_timestamp = current_meta.deletion_timestamp.clone();

        let finalizers_cleared = meta.finalizers.as_ref().map_or(true, |f| f.is_empty());
        if meta.deletion_timestamp.is_some() && finalizers_cleared {
            records.remove(&key);
            trace!(kind = %kind_of::<K>(), name = %name, "Record finalized");
            return Ok(updated);
        }

        meta.resource_version = Some(self.next_version());
        records.insert(key, serde_json::to_value(&updated)?);
        Ok(updated)
    }

    async fn delete<K: StoredResource>(&self, name: &str) -> Result<()> {
        self.check_fault::<K>(StoreOp::Delete)?;
        let key = (kind_of::<K>(), name.to_string());

        let mut records = self.records.write();
        let mut current: K = match records.get(&key) {
            Some(value) => serde_json::from_value(value.clone())?,
            None => return Err(Error::not_found(key.0, name)),
        };

        let has_finalizers = current
            .meta()
            .finalizers
            .as_ref()
            .map_or(false, |f| !f.is_empty());
        if !has_finalizers {
            records.remove(&key);
            return Ok(());
        }

        let meta = current.meta_mut();
        if meta.deletion_timestamp.is_none() {
            meta.deletion_timestamp = Some(Time(Utc::now()));
            meta.resource_version = Some(self.next_version());
            records.insert(key, serde_json::to_value(&current)?);
        }
        Ok(())
    }

    async fn list<K: StoredResource>(&self) -> Result<Vec<K>> {
        self.check_fault::<K>(StoreOp::List)?;
        let kind = kind_of::<K>();
        let records = self.records.read();

        let mut items = records
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, name), value)| {
                serde_json::from_value::<K>(value.clone()).map(|obj| (name.clone(), obj))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items.into_iter().map(|(_, obj)| obj).collect())
    }
}
