// tests/common/mod.rs
//
// A fake HAProxy stats socket: a mutable table of stat rows and replies,
// reachable in memory, over TCP, or over a Unix socket.
#![allow(dead_code)]

use async_trait::async_trait;
use haproxy_admin::instance::Instance;
use haproxy_admin::retry::RetryPolicy;
use haproxy_admin::transport::{Endpoint, Transport};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub const HEADER: &str = "# pxname,svname,iid,sid,status,weight,addr,req_tot,stot,slim,";

#[derive(Debug, Clone)]
pub struct Row {
    pub proxy: String,
    pub svname: String,
    pub iid: u64,
    pub sid: u64,
    pub status: String,
    pub weight: String,
    pub addr: String,
    pub req_tot: String,
    pub stot: String,
    pub slim: String,
}

impl Row {
    pub fn frontend(name: &str, iid: u64, req_tot: u64) -> Self {
        Self {
            proxy: name.to_string(),
            svname: "FRONTEND".to_string(),
            iid,
            sid: 0,
            status: "OPEN".to_string(),
            weight: String::new(),
            addr: String::new(),
            req_tot: req_tot.to_string(),
            stot: req_tot.to_string(),
            slim: "2000".to_string(),
        }
    }

    pub fn backend(name: &str, iid: u64, stot: u64) -> Self {
        Self {
            proxy: name.to_string(),
            svname: "BACKEND".to_string(),
            iid,
            sid: 0,
            status: "UP".to_string(),
            weight: "2".to_string(),
            addr: String::new(),
            req_tot: String::new(),
            stot: stot.to_string(),
            slim: "200".to_string(),
        }
    }

    pub fn server(backend: &str, name: &str, iid: u64, sid: u64, addr: &str) -> Self {
        Self {
            proxy: backend.to_string(),
            svname: name.to_string(),
            iid,
            sid,
            status: "UP".to_string(),
            weight: "1".to_string(),
            addr: addr.to_string(),
            req_tot: String::new(),
            stot: "10".to_string(),
            slim: String::new(),
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn with_stot(mut self, stot: u64) -> Self {
        self.stot = stot.to_string();
        self
    }

    fn kind_bit(&self) -> i64 {
        match self.svname.as_str() {
            "FRONTEND" => 1,
            "BACKEND" => 2,
            _ => 4,
        }
    }

    fn render(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},",
            self.proxy,
            self.svname,
            self.iid,
            self.sid,
            self.status,
            self.weight,
            self.addr,
            self.req_tot,
            self.stot,
            self.slim
        )
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub rows: Vec<Row>,
    pub info: Vec<(String, String)>,
    pub replies: HashMap<String, String>,
    pub received: Vec<String>,
}

/// Shared, mutable state of one fake instance.
#[derive(Debug, Clone, Default)]
pub struct FakeHaProxy {
    state: Arc<Mutex<FakeState>>,
}

impl FakeHaProxy {
    pub fn new(rows: Vec<Row>) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.rows = rows;
            state.info = vec![
                ("Name".to_string(), "HAProxy".to_string()),
                ("Version".to_string(), "2.8.3".to_string()),
                ("Release_date".to_string(), "2023/09/08".to_string()),
                ("node".to_string(), "lb1".to_string()),
                ("Uptime_sec".to_string(), "3600".to_string()),
                ("Maxconn".to_string(), "4000".to_string()),
                ("CumReq".to_string(), "100".to_string()),
            ];
        }
        fake
    }

    pub fn set_info(&self, key: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        match state.info.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => state.info.push((key.to_string(), value.to_string())),
        }
    }

    pub fn reply(&self, command: &str, reply: &str) {
        self.state
            .lock()
            .unwrap()
            .replies
            .insert(command.to_string(), reply.to_string());
    }

    pub fn update_rows(&self, f: impl FnOnce(&mut Vec<Row>)) {
        f(&mut self.state.lock().unwrap().rows);
    }

    pub fn received(&self) -> Vec<String> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn answer(&self, command: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.received.push(command.to_string());

        if command == "show info" {
            let mut out = String::new();
            for (key, value) in &state.info {
                out.push_str(&format!("{}: {}\n", key, value));
            }
            out.push('\n');
            return out;
        }

        if let Some(args) = command.strip_prefix("show stat ") {
            return show_stat(&state.rows, args);
        }

        state
            .replies
            .get(command)
            .cloned()
            .unwrap_or_else(|| "\n".to_string())
    }

    /// An in-memory endpoint backed by this fake.
    pub fn endpoint(&self) -> Arc<dyn Endpoint> {
        Arc::new(InMemory { fake: self.clone() })
    }

    pub fn instance(&self, id: usize) -> Instance {
        Instance::new(id, transport(self.endpoint()))
    }

    /// Serve this fake on an ephemeral TCP port, one command per connection.
    pub async fn serve_tcp(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let fake = self.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let fake = fake.clone();
                tokio::spawn(async move { serve_one(stream, fake).await });
            }
        });
        addr
    }

    #[cfg(unix)]
    pub fn serve_unix(&self, path: &std::path::Path) {
        let listener = tokio::net::UnixListener::bind(path).unwrap();
        let fake = self.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let fake = fake.clone();
                tokio::spawn(async move { serve_one(stream, fake).await });
            }
        });
    }
}

async fn serve_one<S>(stream: S, fake: FakeHaProxy)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    if reader.read_line(&mut line).await.is_err() {
        return;
    }
    let reply = fake.answer(line.trim_end());
    let mut stream = reader.into_inner();
    let _ = stream.write_all(reply.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn show_stat(rows: &[Row], args: &str) -> String {
    let parts: Vec<i64> = args
        .split_whitespace()
        .map(|p| p.parse().unwrap())
        .collect();
    let (iid, kinds, sid) = (parts[0], parts[1], parts[2]);

    let mut out = format!("{}\n", HEADER);
    for row in rows {
        if iid != -1 && row.iid as i64 != iid {
            continue;
        }
        if kinds != -1 && kinds & row.kind_bit() == 0 {
            continue;
        }
        if sid != -1 && (row.kind_bit() != 4 || row.sid as i64 != sid) {
            continue;
        }
        out.push_str(&row.render());
        out.push('\n');
    }
    out.push('\n');
    out
}

struct InMemory {
    fake: FakeHaProxy,
}

#[async_trait]
impl Endpoint for InMemory {
    async fn exchange(&self, command: &str) -> io::Result<String> {
        Ok(self.fake.answer(command))
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

pub fn transport(endpoint: Arc<dyn Endpoint>) -> Transport {
    Transport::new(
        endpoint,
        RetryPolicy::Never,
        Duration::from_millis(10),
        Duration::from_secs(2),
    )
}
