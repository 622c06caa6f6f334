// src/instance/server.rs
use super::backend::InstanceBackend;
use super::resolve::{resolve, CachedId, Resolution};
use super::{Instance, StatSource};
use crate::aggregate::InstanceScoped;
use crate::error::Result;
use crate::stats::StatRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// A server of a backend as seen by one instance.
#[derive(Debug)]
pub struct InstanceServer {
    backend: Arc<InstanceBackend>,
    name: String,
    sid: CachedId,
}

impl InstanceServer {
    pub fn new(backend: Arc<InstanceBackend>, name: String, sid: Option<u64>) -> Self {
        Self {
            backend,
            name,
            sid: CachedId::new(sid),
        }
    }

    pub fn backend(&self) -> &Arc<InstanceBackend> {
        &self.backend
    }

    pub fn instance(&self) -> &Arc<Instance> {
        self.backend.instance()
    }

    pub fn cached_sid(&self) -> Option<u64> {
        self.sid.get()
    }

    pub async fn sid(&self) -> Result<Option<u64>> {
        self.resolve().await?;
        Ok(self.sid.get())
    }

    /// Locate the server's row, scoped by the cached backend id and server id.
    ///
    /// A rescan also refreshes the backend's cached id from the row's `iid`.
    pub async fn resolve(&self) -> Result<Resolution<StatRecord>> {
        let backend_name = self.backend.name();

        let resolution = resolve(
            "server",
            &self.name,
            &self.sid,
            |sid| {
                let iid = sid.and(self.backend.cached_iid());
                async move {
                    self.instance()
                        .backend_with_servers(backend_name, iid, sid)
                        .await
                        .map(|entry| entry.and_then(|mut entry| entry.servers.remove(&self.name)))
                }
            },
            |record: &StatRecord| record.id("sid"),
        )
        .await?;

        if let Resolution::StaleRescan(record) = &resolution {
            if let Some(iid) = record.id("iid") {
                self.backend.cached_id().set(iid);
            }
        }

        Ok(resolution)
    }
}

impl InstanceScoped for InstanceServer {
    fn instance_id(&self) -> usize {
        self.backend.instance_id()
    }
}

#[async_trait]
impl StatSource for InstanceServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn record(&self) -> Result<Option<StatRecord>> {
        Ok(self.resolve().await?.into_inner())
    }

    async fn command(&self, command: &str) -> Result<String> {
        self.instance().command(command).await
    }
}
