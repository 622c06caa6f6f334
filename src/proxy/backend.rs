// src/proxy/backend.rs
use super::server::Server;
use super::{
    calculated, exactly_one, group_by_name, per_instance_metric, per_instance_stats,
    require_name, uniform,
};
use crate::aggregate::{run_across, InstanceScoped};
use crate::error::Result;
use crate::instance::InstanceBackend;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const BACKEND_METRICS: &[&str] = &[
    "act",
    "bck",
    "bin",
    "bout",
    "chkdown",
    "cli_abrt",
    "comp_byp",
    "comp_in",
    "comp_out",
    "comp_rsp",
    "ctime",
    "downtime",
    "dreq",
    "dresp",
    "econ",
    "eresp",
    "hrsp_1xx",
    "hrsp_2xx",
    "hrsp_3xx",
    "hrsp_4xx",
    "hrsp_5xx",
    "hrsp_other",
    "lastchg",
    "lastsess",
    "lbtot",
    "qcur",
    "qmax",
    "qtime",
    "rate",
    "rate_max",
    "rtime",
    "scur",
    "slim",
    "smax",
    "srv_abrt",
    "stot",
    "ttime",
    "weight",
    "wredis",
    "wretr",
];

/// A backend across every instance that runs it.
#[derive(Debug, Clone)]
pub struct Backend {
    name: String,
    members: Vec<Arc<InstanceBackend>>,
}

impl Backend {
    pub(crate) fn new(name: String, members: Vec<Arc<InstanceBackend>>) -> Self {
        Self { name, members }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iid(&self) -> Option<u64> {
        self.members.first().and_then(|member| member.cached_iid())
    }

    pub fn instance_ids(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.instance_id()).collect()
    }

    pub fn members(&self) -> &[Arc<InstanceBackend>] {
        &self.members
    }

    pub async fn status(&self) -> Result<String> {
        uniform("backend", &self.name, &self.members, "status").await
    }

    pub async fn metric(&self, name: &str) -> Result<f64> {
        calculated("backend", &self.name, &self.members, BACKEND_METRICS, name).await
    }

    /// Total sessions handled (`stot`).
    pub async fn requests(&self) -> Result<u64> {
        Ok(self.metric("stot").await? as u64)
    }

    pub async fn requests_per_instance(&self) -> Result<Vec<(usize, u64)>> {
        Ok(per_instance_metric(&self.members, "stot")
            .await?
            .into_iter()
            .map(|(id, value)| (id, value as u64))
            .collect())
    }

    pub async fn stats_per_instance(&self) -> Result<Vec<(usize, BTreeMap<String, String>)>> {
        per_instance_stats(&self.members).await
    }

    /// Servers of this backend merged by name, optionally limited to one name.
    pub async fn servers(&self, name: Option<&str>) -> Result<Vec<Server>> {
        let wanted = name.map(str::to_string);
        let per_instance = run_across(&self.members, move |member| {
            let wanted = wanted.clone();
            async move { member.servers(wanted.as_deref()).await }
        })
        .await?;

        Ok(group_by_name(per_instance)
            .into_iter()
            .map(|(srv_name, members)| Server::new(self.name.clone(), srv_name, members))
            .collect())
    }

    pub async fn server(&self, name: &str) -> Result<Server> {
        require_name("server", name)?;
        let found = self.servers(Some(name)).await?;
        exactly_one("server", name, found)
    }
}
