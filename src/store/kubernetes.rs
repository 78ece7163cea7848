//! Kubernetes-backed resource store
//!
//! Maps store operations onto a namespaced `kube::Api` and classifies API
//! status codes into the controller's error taxonomy.

use super::{kind_of, name_of, ResourceStore, StoredResource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::debug;

/// Resource store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    namespace: String,
}

impl KubeStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn api<K: StoredResource>(&self) -> Api<K> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    Create,
    Read,
    Replace,
    Delete,
}

fn classify<K: StoredResource>(err: kube::Error, name: &str, verb: Verb) -> Error {
    match (&err, verb) {
        (kube::Error::Api(ae), _) if ae.code == 404 => Error::not_found(kind_of::<K>(), name),
        (kube::Error::Api(ae), Verb::Create) if ae.code == 409 => Error::ResourceExists {
            kind: kind_of::<K>(),
            name: name.to_string(),
        },
        (kube::Error::Api(ae), Verb::Replace) if ae.code == 409 => {
            Error::conflict(kind_of::<K>(), name)
        }
        _ => Error::Kube(err),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn create<K: StoredResource>(&self, obj: &K) -> Result<K> {
        let name = name_of(obj)?;
        debug!(kind = %kind_of::<K>(), name = %name, "Creating record");
        self.api::<K>()
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| classify::<K>(e, &name, Verb::Create))
    }

    async fn read<K: StoredResource>(&self, name: &str) -> Result<K> {
        self.api::<K>()
            .get(name)
            .await
            .map_err(|e| classify::<K>(e, name, Verb::Read))
    }

    async fn update<K: StoredResource>(&self, obj: &K) -> Result<K> {
        let name = name_of(obj)?;
        self.api::<K>()
            .replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| classify::<K>(e, &name, Verb::Replace))
    }

    async fn delete<K: StoredResource>(&self, name: &str) -> Result<()> {
        debug!(kind = %kind_of::<K>(), name = %name, "Deleting record");
        self.api::<K>()
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify::<K>(e, name, Verb::Delete))
    }

    async fn list<K: StoredResource>(&self) -> Result<Vec<K>> {
        let list = self
            .api::<K>()
            .list(&ListParams::default())
            .await
            .map_err(Error::Kube)?;
        Ok(list.items)
    }
}
