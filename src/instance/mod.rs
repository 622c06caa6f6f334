// src/instance/mod.rs
//
// One running HAProxy process and the per-process view of its proxies.

mod backend;
mod frontend;
mod resolve;
mod server;

pub use backend::InstanceBackend;
pub use frontend::InstanceFrontend;
pub use resolve::{CachedId, Resolution};
pub use server::InstanceServer;

use crate::aggregate::InstanceScoped;
use crate::config::{InstanceConfig, InstanceDefaults};
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::retry::RetryPolicy;
use crate::stats::{parse_info, parse_stats, BackendStats, StatRecord, StatsDump};
use crate::transport::{Endpoint, TcpEndpoint, Transport, UnixEndpoint};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

/// Object types selectable in `show stat`, OR-able.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectKinds(i32);

impl ObjectKinds {
    pub const FRONTEND: ObjectKinds = ObjectKinds(1);
    pub const BACKEND: ObjectKinds = ObjectKinds(2);
    pub const SERVER: ObjectKinds = ObjectKinds(4);
    pub const ALL: ObjectKinds = ObjectKinds(-1);
}

impl BitOr for ObjectKinds {
    type Output = ObjectKinds;

    fn bitor(self, rhs: Self) -> Self {
        if self == Self::ALL || rhs == Self::ALL {
            Self::ALL
        } else {
            ObjectKinds(self.0 | rhs.0)
        }
    }
}

impl fmt::Display for ObjectKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render an optional id the way `show stat` expects (`-1` = everything).
fn scope(id: Option<u64>) -> String {
    id.map_or_else(|| "-1".to_string(), |id| id.to_string())
}

/// A single HAProxy process reachable through its own stats socket.
pub struct Instance {
    id: usize,
    transport: Transport,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("endpoint", &self.transport.endpoint())
            .finish()
    }
}

impl Instance {
    pub fn new(id: usize, transport: Transport) -> Self {
        Self { id, transport }
    }

    pub fn from_config(
        id: usize,
        config: &InstanceConfig,
        defaults: &InstanceDefaults,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Result<Self> {
        let endpoint: Arc<dyn Endpoint> = match (&config.socket, &config.address) {
            (Some(path), None) => Arc::new(UnixEndpoint::new(path)),
            (None, Some(addr)) => Arc::new(TcpEndpoint::new(addr.clone())),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "instance {} needs exactly one of socket or address",
                    id
                )))
            }
        };

        let invalid = |what: &str, e: std::time::TryFromFloatSecsError| {
            Error::InvalidArgument(format!("instance {} has an invalid {}: {}", id, what, e))
        };
        let interval = config
            .retry_interval(defaults)
            .map_err(|e| invalid("retry interval", e))?;
        let timeout = config.timeout(defaults).map_err(|e| invalid("timeout", e))?;

        let mut transport = Transport::new(
            endpoint,
            RetryPolicy::from_setting(config.retry(defaults)),
            interval,
            timeout,
        );
        if let Some(metrics) = metrics {
            transport = transport.with_metrics(metrics);
        }

        Ok(Self::new(id, transport))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// First line of the reply.
    pub async fn command(&self, command: &str) -> Result<String> {
        self.transport.command(command).await
    }

    /// Whole reply.
    pub async fn command_lines(&self, command: &str) -> Result<Vec<String>> {
        self.transport.command_lines(command).await
    }

    pub async fn info(&self) -> Result<BTreeMap<String, String>> {
        let lines = self.command_lines("show info").await?;
        Ok(parse_info(&lines))
    }

    pub async fn info_value(&self, name: &str) -> Result<Option<String>> {
        Ok(self.info().await?.remove(name))
    }

    /// `Process_num` as reported by the process itself.
    pub async fn process_number(&self) -> Result<u32> {
        let raw = self
            .info_value("Process_num")
            .await?
            .ok_or_else(|| Error::Protocol("show info lacks Process_num".to_string()))?;
        raw.trim()
            .parse()
            .map_err(|_| Error::Protocol(format!("bad Process_num {:?}", raw)))
    }

    pub async fn stats(
        &self,
        iid: Option<u64>,
        kinds: ObjectKinds,
        sid: Option<u64>,
    ) -> Result<StatsDump> {
        let command = format!("show stat {} {} {}", scope(iid), kinds, scope(sid));
        let lines = self.command_lines(&command).await?;
        parse_stats(&lines)
    }

    pub async fn frontends_stats(&self, iid: Option<u64>) -> Result<BTreeMap<String, StatRecord>> {
        Ok(self.stats(iid, ObjectKinds::FRONTEND, None).await?.frontends)
    }

    pub async fn backends_stats(&self, iid: Option<u64>) -> Result<BTreeMap<String, BackendStats>> {
        Ok(self.stats(iid, ObjectKinds::BACKEND, None).await?.backends)
    }

    /// Rows of `backend` and its servers, if `backend` is in the dump.
    pub async fn backend_with_servers(
        &self,
        backend: &str,
        iid: Option<u64>,
        sid: Option<u64>,
    ) -> Result<Option<BackendStats>> {
        let mut dump = self
            .stats(iid, ObjectKinds::BACKEND | ObjectKinds::SERVER, sid)
            .await?;
        Ok(dump.backends.remove(backend))
    }

    /// Per-process frontend handles, optionally limited to one name.
    pub async fn frontends(
        self: &Arc<Self>,
        name: Option<&str>,
    ) -> Result<Vec<Arc<InstanceFrontend>>> {
        let frontends = self.frontends_stats(None).await?;
        Ok(frontends
            .into_iter()
            .filter(|(fe_name, _)| name.map_or(true, |n| n == fe_name))
            .map(|(fe_name, record)| {
                Arc::new(InstanceFrontend::new(self.clone(), fe_name, record.id("iid")))
            })
            .collect())
    }

    /// Per-process backend handles, optionally limited to one name.
    pub async fn backends(
        self: &Arc<Self>,
        name: Option<&str>,
    ) -> Result<Vec<Arc<InstanceBackend>>> {
        let backends = self.backends_stats(None).await?;
        Ok(backends
            .into_iter()
            .filter(|(be_name, _)| name.map_or(true, |n| n == be_name))
            .map(|(be_name, entry)| {
                let iid = entry.stats.as_ref().and_then(|r| r.id("iid"));
                Arc::new(InstanceBackend::new(self.clone(), be_name, iid))
            })
            .collect())
    }
}

impl InstanceScoped for Instance {
    fn instance_id(&self) -> usize {
        self.id
    }
}

/// Read side shared by per-instance frontends, backends and servers.
#[async_trait]
pub trait StatSource: InstanceScoped + Send + Sync + 'static {
    fn name(&self) -> &str;

    /// The object's current row, `None` if it is gone from this instance.
    async fn record(&self) -> Result<Option<StatRecord>>;

    async fn command(&self, command: &str) -> Result<String>;

    /// One field of the current row.
    async fn metric(&self, field: &str) -> Result<Option<String>> {
        Ok(self
            .record()
            .await?
            .and_then(|record| record.get(field).map(str::to_string)))
    }

    /// All fields of the current row, empty if the object is gone.
    async fn stats(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .record()
            .await?
            .map(|record| record.to_map())
            .unwrap_or_default())
    }
}
