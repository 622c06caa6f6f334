// src/main.rs
use anyhow::{Context, Result};
use haproxy_admin::{config, metrics::MetricsRegistry, HaProxy};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct Summary {
    version: String,
    node: String,
    frontends: Vec<FrontendSummary>,
    backends: Vec<BackendSummary>,
}

#[derive(Debug, Serialize)]
struct FrontendSummary {
    name: String,
    status: String,
    requests: u64,
}

#[derive(Debug, Serialize)]
struct BackendSummary {
    name: String,
    status: String,
    servers: Vec<ServerSummary>,
}

#[derive(Debug, Serialize)]
struct ServerSummary {
    name: String,
    status: String,
    weight: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "haproxy-admin.yaml".to_string());

    let config = config::load_config(&config_path).await?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("haproxy_admin={}", config.logging.level).parse()?),
        )
        .init();

    info!("Loaded configuration from: {}", config_path);

    let registry = if config.metrics.enabled {
        Some(MetricsRegistry::new()?)
    } else {
        None
    };

    let haproxy = HaProxy::from_config(&config, registry.as_ref().map(|r| r.collector()))
        .context("Failed to set up instances")?;

    let summary = summarize(&haproxy).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(registry) = registry {
        let exposition = registry.gather()?;
        print!("{}", String::from_utf8_lossy(&exposition));
    }

    Ok(())
}

async fn summarize(haproxy: &HaProxy) -> Result<Summary> {
    let version = haproxy.version().await.context("Failed to read version")?;
    let node = haproxy.node_name().await.context("Failed to read node name")?;

    let mut frontends = Vec::new();
    for frontend in haproxy.frontends(None).await? {
        frontends.push(FrontendSummary {
            name: frontend.name().to_string(),
            status: frontend.status().await?,
            requests: frontend.requests().await?,
        });
    }

    let mut backends = Vec::new();
    for backend in haproxy.backends(None).await? {
        let mut servers = Vec::new();
        for server in backend.servers(None).await? {
            servers.push(ServerSummary {
                name: server.name().to_string(),
                status: server.status().await?,
                weight: server.weight().await?,
            });
        }
        let status = match backend.status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Backend {} status unavailable: {}", backend.name(), e);
                "UNKNOWN".to_string()
            }
        };
        backends.push(BackendSummary {
            name: backend.name().to_string(),
            status,
            servers,
        });
    }

    Ok(Summary {
        version,
        node,
        frontends,
        backends,
    })
}
