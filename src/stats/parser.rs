// src/stats/parser.rs
use super::record::{StatRecord, StatsDump};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

const FRONTEND: &str = "FRONTEND";
const BACKEND: &str = "BACKEND";

/// Build a [`StatsDump`] from `show stat` CSV output.
///
/// The first line is the header: a two character marker (`# `) followed by
/// comma separated field names. In every other line column 0 is the proxy
/// name and column 1 is `FRONTEND`, `BACKEND` or a server name. Server rows
/// may come before or after their backend's own row.
pub fn parse_stats<S: AsRef<str>>(lines: &[S]) -> Result<StatsDump> {
    let (header, rows) = lines
        .split_first()
        .ok_or_else(|| Error::Protocol("empty stats dump".to_string()))?;

    let fields: Arc<[String]> = header
        .as_ref()
        .get(2..)
        .ok_or_else(|| Error::Protocol(format!("malformed stats header {:?}", header.as_ref())))?
        .trim()
        .split(',')
        .map(str::to_string)
        .collect();

    let mut dump = StatsDump::default();

    for line in rows {
        let line: &str = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<String> = line.split(',').map(str::to_string).collect();
        if parts.len() < 2 {
            return Err(Error::Protocol(format!("stats row without svname: {:?}", line)));
        }
        if parts.len() != fields.len() {
            return Err(Error::Protocol(format!(
                "stats row has {} columns, header has {}",
                parts.len(),
                fields.len()
            )));
        }

        let pxname = parts[0].clone();
        let svname = parts[1].clone();
        let record = StatRecord::new(fields.clone(), parts);

        match svname.as_str() {
            FRONTEND => {
                dump.frontends.insert(pxname, record);
            }
            BACKEND => {
                dump.backends.entry(pxname).or_default().stats = Some(record);
            }
            _ => {
                dump.backends
                    .entry(pxname)
                    .or_default()
                    .servers
                    .insert(svname, record);
            }
        }
    }

    Ok(dump)
}

/// Build a flat map from `show info` output.
///
/// Each line is split on the first `": "`; lines without it are ignored.
pub fn parse_info<S: AsRef<str>>(lines: &[S]) -> BTreeMap<String, String> {
    lines
        .iter()
        .filter_map(|line| line.as_ref().trim().split_once(": "))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
