// src/proxy/server.rs
use super::{
    calculated, dispatch, per_instance_metric, per_instance_stats, present_values, replies,
    uniform,
};
use crate::aggregate::{check_address_port, compare_values, to_number, InstanceScoped};
use crate::error::{Error, Result};
use crate::instance::InstanceServer;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const SERVER_METRICS: &[&str] = &[
    "act",
    "bck",
    "bin",
    "bout",
    "check_duration",
    "chkdown",
    "chkfail",
    "cli_abrt",
    "ctime",
    "downtime",
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
    "qlimit",
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
    "throttle",
    "ttime",
    "weight",
    "wredis",
    "wretr",
];

/// Administrative state a server can be put into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Mark the server up and re-enable checks.
    Enable,
    /// Mark the server down for maintenance with checks disabled.
    Disable,
    /// Out of load balancing, health checks disabled.
    Maint,
    /// Out of load balancing, existing sessions continue.
    Drain,
    /// Back to normal mode.
    Ready,
}

impl ServerState {
    pub const ALL: [ServerState; 5] = [
        ServerState::Enable,
        ServerState::Disable,
        ServerState::Maint,
        ServerState::Drain,
        ServerState::Ready,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Enable => "enable",
            ServerState::Disable => "disable",
            ServerState::Maint => "maint",
            ServerState::Drain => "drain",
            ServerState::Ready => "ready",
        }
    }

    fn command(&self, backend: &str, server: &str) -> String {
        match self {
            ServerState::Enable | ServerState::Disable => {
                format!("{} server {}/{}", self.as_str(), backend, server)
            }
            _ => format!("set server {}/{} state {}", backend, server, self.as_str()),
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<_> = Self::ALL.iter().map(ServerState::as_str).collect();
                Error::InvalidArgument(format!(
                    "wrong state {:?}, allowed states {}",
                    s,
                    allowed.join(", ")
                ))
            })
    }
}

/// Weight for `set weight`: absolute (0..=256) or relative to the
/// configured weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    Absolute(u32),
    Relative(u32),
}

impl Weight {
    pub const MAX_ABSOLUTE: u32 = 256;

    fn validate(self) -> Result<Self> {
        match self {
            Weight::Absolute(value) if value > Self::MAX_ABSOLUTE => Err(Error::InvalidArgument(
                format!(
                    "invalid weight {}, absolute weights are permitted between 0 and {}",
                    value,
                    Self::MAX_ABSOLUTE
                ),
            )),
            weight => Ok(weight),
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weight::Absolute(value) => write!(f, "{}", value),
            Weight::Relative(pct) => write!(f, "{}%", pct),
        }
    }
}

impl FromStr for Weight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidArgument(format!("invalid weight {:?}", s));
        let weight = match s.strip_suffix('%') {
            Some(pct) => Weight::Relative(pct.parse().map_err(|_| invalid())?),
            None => Weight::Absolute(s.parse().map_err(|_| invalid())?),
        };
        weight.validate()
    }
}

/// Split `address:port` at the last colon. Without a colon the whole
/// value is the address.
fn split_addr(raw: &str) -> (&str, &str) {
    raw.rsplit_once(':').unwrap_or((raw, ""))
}

/// A backend server across every instance that runs it.
#[derive(Debug, Clone)]
pub struct Server {
    backend_name: String,
    name: String,
    members: Vec<Arc<InstanceServer>>,
}

impl Server {
    pub(crate) fn new(
        backend_name: String,
        name: String,
        members: Vec<Arc<InstanceServer>>,
    ) -> Self {
        Self {
            backend_name,
            name,
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Server id as last seen on the first member.
    pub fn sid(&self) -> Option<u64> {
        self.members.first().and_then(|member| member.cached_sid())
    }

    pub fn instance_ids(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.instance_id()).collect()
    }

    pub fn members(&self) -> &[Arc<InstanceServer>] {
        &self.members
    }

    fn target(&self) -> String {
        format!("{}/{}", self.backend_name, self.name)
    }

    pub async fn status(&self) -> Result<String> {
        uniform("server", &self.name, &self.members, "status").await
    }

    pub async fn weight(&self) -> Result<u64> {
        let raw = uniform("server", &self.name, &self.members, "weight").await?;
        Ok(to_number(&raw) as u64)
    }

    pub async fn set_weight(&self, weight: Weight) -> Result<()> {
        let weight = weight.validate()?;
        dispatch(
            &self.members,
            format!("set weight {} {}", self.target(), weight),
        )
        .await
    }

    pub async fn check_code(&self) -> Result<String> {
        uniform("server", &self.name, &self.members, "check_code").await
    }

    pub async fn check_status(&self) -> Result<String> {
        uniform("server", &self.name, &self.members, "check_status").await
    }

    /// Last health check contents or textual error.
    pub async fn last_status(&self) -> Result<String> {
        uniform("server", &self.name, &self.members, "last_chk").await
    }

    pub async fn last_agent_check(&self) -> Result<String> {
        uniform("server", &self.name, &self.members, "last_agt").await
    }

    async fn addr_halves(&self) -> Result<Vec<(usize, String, String)>> {
        let values = present_values(&self.members, "addr").await?;
        if values.is_empty() {
            return Err(Error::NotFound {
                kind: "server",
                name: self.name.clone(),
            });
        }
        Ok(values
            .iter()
            .map(|(id, raw)| {
                let (address, port) = split_addr(raw);
                (*id, address.to_string(), port.to_string())
            })
            .collect())
    }

    /// Assigned address. Instances only need to agree on the address half.
    pub async fn address(&self) -> Result<String> {
        let halves: Vec<_> = self
            .addr_halves()
            .await?
            .into_iter()
            .map(|(id, address, _)| (id, address))
            .collect();
        compare_values("address", &halves)
    }

    /// Assigned port. Instances only need to agree on the port half.
    pub async fn port(&self) -> Result<String> {
        let halves: Vec<_> = self
            .addr_halves()
            .await?
            .into_iter()
            .map(|(id, _, port)| (id, port))
            .collect();
        compare_values("port", &halves)
    }

    async fn set_addr_port(&self, address: &str, port: &str) -> Result<()> {
        let command = format!("set server {} addr {} port {}", self.target(), address, port);
        let replies = replies(&self.members, command).await?;
        check_address_port(&replies)
    }

    /// Change the address, keeping the current port.
    pub async fn set_address(&self, address: &str) -> Result<()> {
        if address.trim().is_empty() || address.contains(char::is_whitespace) {
            return Err(Error::InvalidArgument(format!("invalid address {:?}", address)));
        }
        let port = self.port().await?;
        self.set_addr_port(address, &port).await
    }

    /// Change the port, keeping the current address.
    pub async fn set_port(&self, port: u16) -> Result<()> {
        let address = self.address().await?;
        self.set_addr_port(&address, &port.to_string()).await
    }

    /// Put the server into `state`. Unknown states fail before any command
    /// is sent.
    pub async fn set_state(&self, state: &str) -> Result<()> {
        let state: ServerState = state.parse()?;
        dispatch(&self.members, state.command(&self.backend_name, &self.name)).await
    }

    /// Terminate every session attached to the server.
    pub async fn shutdown(&self) -> Result<()> {
        dispatch(
            &self.members,
            format!("shutdown sessions server {}", self.target()),
        )
        .await
    }

    pub async fn metric(&self, name: &str) -> Result<f64> {
        calculated("server", &self.name, &self.members, SERVER_METRICS, name).await
    }

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
}
