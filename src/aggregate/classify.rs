// src/aggregate/classify.rs
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::sync::LazyLock;

/// How a numeric metric combines across instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Sum,
    Average,
}

impl MetricKind {
    pub fn classify(name: &str) -> Result<Self> {
        if SUM_METRICS.contains(name) {
            Ok(MetricKind::Sum)
        } else if AVERAGE_METRICS.contains(name) {
            Ok(MetricKind::Average)
        } else {
            Err(Error::UnknownMetric(name.to_string()))
        }
    }
}

pub static SUM_METRICS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "CompressBpsIn",
        "CompressBpsOut",
        "CompressBpsRateLim",
        "ConnRate",
        "ConnRateLimit",
        "CumConns",
        "CumReq",
        "CumSslConns",
        "CurrConns",
        "CurrSslConns",
        "Hard_maxconn",
        "Idle_pct",
        "MaxConnRate",
        "MaxSessRate",
        "MaxSslConns",
        "MaxSslRate",
        "MaxZlibMemUsage",
        "Maxconn",
        "Maxpipes",
        "Maxsock",
        "Memmax_MB",
        "PipesFree",
        "PipesUsed",
        "Process_num",
        "Run_queue",
        "SessRate",
        "SessRateLimit",
        "SslBackendKeyRate",
        "SslBackendMaxKeyRate",
        "SslCacheLookups",
        "SslCacheMisses",
        "SslFrontendKeyRate",
        "SslFrontendMaxKeyRate",
        "SslFrontendSessionReuse_pct",
        "SslRate",
        "SslRateLimit",
        "Tasks",
        "Ulimit-n",
        "ZlibMemUsage",
        "bin",
        "bout",
        "chkdown",
        "chkfail",
        "cli_abrt",
        "comp_byp",
        "comp_in",
        "comp_out",
        "comp_rsp",
        "dreq",
        "dresp",
        "econ",
        "ereq",
        "eresp",
        "hrsp_1xx",
        "hrsp_2xx",
        "hrsp_3xx",
        "hrsp_4xx",
        "hrsp_5xx",
        "hrsp_other",
        "lbtot",
        "qcur",
        "qmax",
        "rate",
        "rate_lim",
        "rate_max",
        "req_rate",
        "req_rate_max",
        "req_tot",
        "scur",
        "slim",
        "smax",
        "srv_abrt",
        "stot",
        "wredis",
        "wretr",
    ]
    .into_iter()
    .collect()
});

pub static AVERAGE_METRICS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "act",
        "bck",
        "check_duration",
        "ctime",
        "downtime",
        "lastchg",
        "lastsess",
        "qlimit",
        "qtime",
        "rtime",
        "throttle",
        "ttime",
        "weight",
    ]
    .into_iter()
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sets_are_disjoint() {
        assert!(SUM_METRICS.is_disjoint(&AVERAGE_METRICS));
    }

    #[test]
    fn test_classify() {
        assert_eq!(MetricKind::classify("stot").unwrap(), MetricKind::Sum);
        assert_eq!(MetricKind::classify("weight").unwrap(), MetricKind::Average);
        assert!(matches!(
            MetricKind::classify("status"),
            Err(Error::UnknownMetric(name)) if name == "status"
        ));
    }
}
