// src/instance/backend.rs
use super::resolve::{resolve, CachedId, Resolution};
use super::server::InstanceServer;
use super::{Instance, StatSource};
use crate::aggregate::InstanceScoped;
use crate::error::Result;
use crate::stats::{BackendStats, StatRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// A backend as seen by one instance.
#[derive(Debug)]
pub struct InstanceBackend {
    instance: Arc<Instance>,
    name: String,
    iid: CachedId,
}

impl InstanceBackend {
    pub fn new(instance: Arc<Instance>, name: String, iid: Option<u64>) -> Self {
        Self {
            instance,
            name,
            iid: CachedId::new(iid),
        }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn cached_iid(&self) -> Option<u64> {
        self.iid.get()
    }

    pub(crate) fn cached_id(&self) -> &CachedId {
        &self.iid
    }

    pub async fn iid(&self) -> Result<Option<u64>> {
        self.resolve().await?;
        Ok(self.iid.get())
    }

    /// Locate the backend's own row.
    pub async fn resolve(&self) -> Result<Resolution<StatRecord>> {
        resolve(
            "backend",
            &self.name,
            &self.iid,
            |iid| async move {
                self.instance
                    .backends_stats(iid)
                    .await
                    .map(|mut backends| backends.remove(&self.name).and_then(|entry| entry.stats))
            },
            |record: &StatRecord| record.id("iid"),
        )
        .await
    }

    /// Per-process server handles of this backend, optionally limited to one
    /// server name. Empty when the backend is gone from this instance.
    pub async fn servers(self: &Arc<Self>, name: Option<&str>) -> Result<Vec<Arc<InstanceServer>>> {
        let entry = resolve(
            "backend",
            &self.name,
            &self.iid,
            |iid| async move {
                self.instance
                    .backend_with_servers(&self.name, iid, None)
                    .await
            },
            |entry: &BackendStats| {
                entry
                    .stats
                    .as_ref()
                    .and_then(|record| record.id("iid"))
                    .or_else(|| entry.servers.values().find_map(|record| record.id("iid")))
            },
        )
        .await?
        .into_inner()
        .unwrap_or_default();

        Ok(entry
            .servers
            .into_iter()
            .filter(|(srv_name, _)| name.map_or(true, |n| n == srv_name))
            .map(|(srv_name, record)| {
                Arc::new(InstanceServer::new(self.clone(), srv_name, record.id("sid")))
            })
            .collect())
    }
}

impl InstanceScoped for InstanceBackend {
    fn instance_id(&self) -> usize {
        self.instance.id()
    }
}

#[async_trait]
impl StatSource for InstanceBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn record(&self) -> Result<Option<StatRecord>> {
        Ok(self.resolve().await?.into_inner())
    }

    async fn command(&self, command: &str) -> Result<String> {
        self.instance.command(command).await
    }
}
