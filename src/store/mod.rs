//! Resource Store
//!
//! Typed create/read/update/delete/list over the controller's versioned
//! resource records. Updates are optimistic: a record whose resource version
//! changed since it was read is rejected with [`Error::Conflict`].
//!
//! [`Error::Conflict`]: crate::error::Error::Conflict

pub mod kubernetes;
pub mod memory;

pub use self::kubernetes::KubeStore;
pub use self::memory::{MemoryStore, StoreOp};

use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A namespaced record kind the store can hold
pub trait StoredResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoredResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Port for the resource store holding Drive, Volume, LogicalVolumeGroup and
/// AvailableCapacity records in the controller namespace
#[async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    /// Create a record; fails with `ResourceExists` when the name is taken
    async fn create<K: StoredResource>(&self, obj: &K) -> Result<K>;

    /// Read a record by name
    async fn read<K: StoredResource>(&self, name: &str) -> Result<K>;

    /// Replace a record, checking its resource version
    async fn update<K: StoredResource>(&self, obj: &K) -> Result<K>;

    /// Delete a record by name
    async fn delete<K: StoredResource>(&self, name: &str) -> Result<()>;

    /// List all records of a kind
    async fn list<K: StoredResource>(&self) -> Result<Vec<K>>;
}

/// Kind name of a record type
pub fn kind_of<K: StoredResource>() -> String {
    K::kind(&()).to_string()
}

/// Name of a record, required for every store operation
pub fn name_of<K: StoredResource>(obj: &K) -> Result<String> {
    obj.meta()
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Store(format!("{} record has no name", kind_of::<K>())))
}
