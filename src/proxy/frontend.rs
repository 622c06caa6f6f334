// src/proxy/frontend.rs
use super::{calculated, dispatch, per_instance_metric, per_instance_stats, uniform};
use crate::aggregate::InstanceScoped;
use crate::error::Result;
use crate::instance::InstanceFrontend;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Numeric fields a frontend exposes through [`Frontend::metric`].
pub const FRONTEND_METRICS: &[&str] = &[
    "bin",
    "bout",
    "comp_byp",
    "comp_in",
    "comp_out",
    "comp_rsp",
    "dreq",
    "dresp",
    "ereq",
    "hrsp_1xx",
    "hrsp_2xx",
    "hrsp_3xx",
    "hrsp_4xx",
    "hrsp_5xx",
    "hrsp_other",
    "rate",
    "rate_lim",
    "rate_max",
    "req_rate",
    "req_rate_max",
    "req_tot",
    "scur",
    "slim",
    "smax",
    "stot",
];

/// A frontend across every instance that runs it.
#[derive(Debug, Clone)]
pub struct Frontend {
    name: String,
    members: Vec<Arc<InstanceFrontend>>,
}

impl Frontend {
    pub(crate) fn new(name: String, members: Vec<Arc<InstanceFrontend>>) -> Self {
        Self { name, members }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Proxy id as last seen on the first member.
    pub fn iid(&self) -> Option<u64> {
        self.members.first().and_then(|member| member.cached_iid())
    }

    pub fn instance_ids(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.instance_id()).collect()
    }

    pub fn members(&self) -> &[Arc<InstanceFrontend>] {
        &self.members
    }

    pub async fn status(&self) -> Result<String> {
        uniform("frontend", &self.name, &self.members, "status").await
    }

    pub async fn metric(&self, name: &str) -> Result<f64> {
        calculated("frontend", &self.name, &self.members, FRONTEND_METRICS, name).await
    }

    pub async fn requests(&self) -> Result<u64> {
        Ok(self.metric("req_tot").await? as u64)
    }

    pub async fn requests_per_instance(&self) -> Result<Vec<(usize, u64)>> {
        Ok(per_instance_metric(&self.members, "req_tot")
            .await?
            .into_iter()
            .map(|(id, value)| (id, value as u64))
            .collect())
    }

    pub async fn stats_per_instance(&self) -> Result<Vec<(usize, BTreeMap<String, String>)>> {
        per_instance_stats(&self.members).await
    }

    /// Configured session limit (`slim`).
    pub async fn max_conn(&self) -> Result<u64> {
        Ok(self.metric("slim").await? as u64)
    }

    pub async fn set_max_conn(&self, value: u64) -> Result<()> {
        dispatch(
            &self.members,
            format!("set maxconn frontend {} {}", self.name, value),
        )
        .await
    }

    pub async fn enable(&self) -> Result<()> {
        dispatch(&self.members, format!("enable frontend {}", self.name)).await
    }

    pub async fn disable(&self) -> Result<()> {
        dispatch(&self.members, format!("disable frontend {}", self.name)).await
    }

    /// Stop the frontend for good. HAProxy drops it from the running
    /// configuration, so later operations on it fail.
    pub async fn shutdown(&self) -> Result<()> {
        dispatch(&self.members, format!("shutdown frontend {}", self.name)).await
    }
}
