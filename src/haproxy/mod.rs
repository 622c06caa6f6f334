//
// src/haproxy/mod.rs
//
// Entry point: every configured instance seen as one load balancer.
//
mod runtime;

pub use runtime::ListRef;

use crate::aggregate::{calculate, check_command, compare_values, run_across, to_number, MetricKind};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::metrics::MetricsCollector;
use crate::proxy::{exactly_one, group_by_name, require_name, Backend, Frontend, Server};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// `show info` fields accepted by [`HaProxy::metric`].
pub const HAPROXY_METRICS: &[&str] = &[
    "SslFrontendMaxKeyRate",
    "Hard_maxconn",
    "SessRateLimit",
    "Process_num",
    "Memmax_MB",
    "CompressBpsRateLim",
    "MaxSslConns",
    "ConnRateLimit",
    "SslRateLimit",
    "MaxConnRate",
    "CumConns",
    "SslBackendKeyRate",
    "SslCacheLookups",
    "CurrSslConns",
    "Run_queue",
    "Maxpipes",
    "Idle_pct",
    "SslFrontendKeyRate",
    "Tasks",
    "MaxZlibMemUsage",
    "SslFrontendSessionReuse_pct",
    "CurrConns",
    "SslCacheMisses",
    "SslRate",
    "CumSslConns",
    "PipesUsed",
    "Maxconn",
    "CompressBpsIn",
    "ConnRate",
    "Ulimit-n",
    "SessRate",
    "SslBackendMaxKeyRate",
    "CumReq",
    "PipesFree",
    "ZlibMemUsage",
    "CompressBpsOut",
    "Maxsock",
    "MaxSslRate",
    "MaxSessRate",
];

/// All configured HAProxy instances, addressed as one.
#[derive(Debug, Clone)]
pub struct HaProxy {
    instances: Vec<Arc<Instance>>,
}

impl HaProxy {
    pub fn new(instances: Vec<Instance>) -> Result<Self> {
        if instances.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one instance is required".to_string(),
            ));
        }
        Ok(Self {
            instances: instances.into_iter().map(Arc::new).collect(),
        })
    }

    /// Build one instance per configured endpoint; ids follow config order.
    pub fn from_config(config: &Config, metrics: Option<Arc<MetricsCollector>>) -> Result<Self> {
        let instances = config
            .instances
            .iter()
            .enumerate()
            .map(|(id, instance)| {
                Instance::from_config(id, instance, &config.defaults, metrics.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Managing {} HAProxy instance(s)", instances.len());
        for instance in &instances {
            debug!("Instance {} at {}", instance.id(), instance.endpoint());
        }
        Self::new(instances)
    }

    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    fn first(&self) -> Result<&Arc<Instance>> {
        self.instances
            .first()
            .ok_or_else(|| Error::InvalidArgument("no instances configured".to_string()))
    }

    pub async fn frontends(&self, name: Option<&str>) -> Result<Vec<Frontend>> {
        let wanted = name.map(str::to_string);
        let per_instance = run_across(&self.instances, move |instance| {
            let wanted = wanted.clone();
            async move { instance.frontends(wanted.as_deref()).await }
        })
        .await?;

        Ok(group_by_name(per_instance)
            .into_iter()
            .map(|(name, members)| Frontend::new(name, members))
            .collect())
    }

    pub async fn frontend(&self, name: &str) -> Result<Frontend> {
        require_name("frontend", name)?;
        let found = self.frontends(Some(name)).await?;
        exactly_one("frontend", name, found)
    }

    pub async fn backends(&self, name: Option<&str>) -> Result<Vec<Backend>> {
        let wanted = name.map(str::to_string);
        let per_instance = run_across(&self.instances, move |instance| {
            let wanted = wanted.clone();
            async move { instance.backends(wanted.as_deref()).await }
        })
        .await?;

        Ok(group_by_name(per_instance)
            .into_iter()
            .map(|(name, members)| Backend::new(name, members))
            .collect())
    }

    pub async fn backend(&self, name: &str) -> Result<Backend> {
        require_name("backend", name)?;
        let found = self.backends(Some(name)).await?;
        exactly_one("backend", name, found)
    }

    /// Every server, optionally only those of one backend.
    pub async fn servers(&self, backend: Option<&str>) -> Result<Vec<Server>> {
        let backends = self.backends(backend).await?;
        let servers = try_join_all(backends.iter().map(|backend| backend.servers(None))).await?;
        Ok(servers.into_iter().flatten().collect())
    }

    /// Servers called `name`. A name used in several backends yields one
    /// server per backend.
    pub async fn server(&self, name: &str, backend: Option<&str>) -> Result<Vec<Server>> {
        require_name("server", name)?;
        let backends = self.backends(backend).await?;
        let servers =
            try_join_all(backends.iter().map(|backend| backend.servers(Some(name)))).await?;
        Ok(servers.into_iter().flatten().collect())
    }

    /// `show info` of every instance.
    pub async fn info(&self) -> Result<Vec<(usize, BTreeMap<String, String>)>> {
        run_across(&self.instances, |instance| async move { instance.info().await }).await
    }

    async fn info_values(&self, field: &'static str) -> Result<Vec<(usize, String)>> {
        let values = run_across(&self.instances, move |instance| async move {
            instance.info_value(field).await
        })
        .await?;
        Ok(values
            .into_iter()
            .filter_map(|(id, value)| value.map(|value| (id, value)))
            .collect())
    }

    async fn uniform_info(&self, field: &'static str) -> Result<String> {
        let values = self.info_values(field).await?;
        compare_values(field, &values)
    }

    async fn first_info(&self, field: &'static str) -> Result<String> {
        self.first()?
            .info_value(field)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "info field",
                name: field.to_string(),
            })
    }

    /// A process-wide `show info` metric, summed or averaged over instances.
    pub async fn metric(&self, name: &str) -> Result<f64> {
        if !HAPROXY_METRICS.contains(&name) {
            return Err(Error::UnknownMetric(name.to_string()));
        }
        MetricKind::classify(name)?;

        let owned = name.to_string();
        let values = run_across(&self.instances, move |instance| {
            let name = owned.clone();
            async move { instance.info_value(&name).await }
        })
        .await?;

        let numbers: Vec<f64> = values
            .into_iter()
            .filter_map(|(_, raw)| raw.map(|raw| to_number(&raw)))
            .collect();
        calculate(name, &numbers)
    }

    /// Requests processed by HAProxy (`CumReq`). A client request passes
    /// through twice: once on its frontend and once on its backend.
    pub async fn total_requests(&self) -> Result<u64> {
        Ok(self.metric("CumReq").await? as u64)
    }

    pub async fn max_conn(&self) -> Result<u64> {
        Ok(self.metric("Maxconn").await? as u64)
    }

    pub async fn rate_limit_conn(&self) -> Result<u64> {
        Ok(self.metric("ConnRateLimit").await? as u64)
    }

    pub async fn rate_limit_sess(&self) -> Result<u64> {
        Ok(self.metric("SessRateLimit").await? as u64)
    }

    pub async fn rate_limit_ssl_sess(&self) -> Result<u64> {
        Ok(self.metric("SslRateLimit").await? as u64)
    }

    /// Requests processed by all frontends.
    pub async fn requests(&self) -> Result<u64> {
        let frontends = self.frontends(None).await?;
        let requests = try_join_all(frontends.iter().map(|frontend| frontend.requests())).await?;
        Ok(requests.into_iter().sum())
    }

    /// OS process id of every instance.
    pub async fn process_ids(&self) -> Result<Vec<(usize, u32)>> {
        self.info_values("Pid")
            .await?
            .into_iter()
            .map(|(id, raw)| {
                raw.trim()
                    .parse()
                    .map(|pid| (id, pid))
                    .map_err(|_| Error::Protocol(format!("bad Pid {:?}", raw)))
            })
            .collect()
    }

    pub async fn version(&self) -> Result<String> {
        self.uniform_info("Version").await
    }

    pub async fn release_date(&self) -> Result<String> {
        self.uniform_info("Release_date").await
    }

    pub async fn node_name(&self) -> Result<String> {
        self.uniform_info("node").await
    }

    pub async fn description(&self) -> Result<String> {
        self.uniform_info("description").await
    }

    /// Uptime of the first instance, as HAProxy formats it.
    pub async fn uptime(&self) -> Result<String> {
        self.first_info("Uptime").await
    }

    pub async fn uptime_sec(&self) -> Result<u64> {
        let raw = self.first_info("Uptime_sec").await?;
        Ok(to_number(&raw) as u64)
    }

    /// Send `command` to every instance unchanged and return each full reply.
    /// Nothing is checked.
    pub async fn command(&self, command: &str) -> Result<Vec<(usize, Vec<String>)>> {
        let command = command.to_string();
        run_across(&self.instances, move |instance| {
            let command = command.clone();
            async move { instance.command_lines(&command).await }
        })
        .await
    }

    /// Last request and response errors, optionally for one proxy id.
    pub async fn errors(&self, iid: Option<u64>) -> Result<Vec<(usize, Vec<String>)>> {
        match iid {
            Some(iid) => self.command(&format!("show errors {}", iid)).await,
            None => self.command("show errors").await,
        }
    }

    /// Send a write command everywhere and require the same success reply.
    pub(crate) async fn dispatch(&self, command: String) -> Result<()> {
        debug!("Dispatching {:?} to {} instance(s)", command, self.instances.len());
        let replies = run_across(&self.instances, move |instance| {
            let command = command.clone();
            async move { instance.command(&command).await }
        })
        .await?;
        check_command(&replies)
    }
}
