// src/instance/frontend.rs
use super::resolve::{resolve, CachedId, Resolution};
use super::{Instance, StatSource};
use crate::aggregate::InstanceScoped;
use crate::error::Result;
use crate::stats::StatRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// A frontend as seen by one instance.
#[derive(Debug)]
pub struct InstanceFrontend {
    instance: Arc<Instance>,
    name: String,
    iid: CachedId,
}

impl InstanceFrontend {
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

    /// Last known proxy id, without touching the socket.
    pub fn cached_iid(&self) -> Option<u64> {
        self.iid.get()
    }

    /// Current proxy id, refreshed from the instance.
    pub async fn iid(&self) -> Result<Option<u64>> {
        self.resolve().await?;
        Ok(self.iid.get())
    }

    pub async fn resolve(&self) -> Result<Resolution<StatRecord>> {
        resolve(
            "frontend",
            &self.name,
            &self.iid,
            |iid| async move {
                self.instance
                    .frontends_stats(iid)
                    .await
                    .map(|mut frontends| frontends.remove(&self.name))
            },
            |record: &StatRecord| record.id("iid"),
        )
        .await
    }
}

impl InstanceScoped for InstanceFrontend {
    fn instance_id(&self) -> usize {
        self.instance.id()
    }
}

#[async_trait]
impl StatSource for InstanceFrontend {
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
