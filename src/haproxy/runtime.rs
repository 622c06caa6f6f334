// src/haproxy/runtime.rs
//
// ACLs, maps, stick tables and global limits.

use super::HaProxy;
use crate::aggregate::check_output;
use crate::error::{Error, Result};
use std::fmt;

/// An ACL or map, addressed by numeric id or by the file it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListRef {
    Id(u32),
    File(String),
}

impl fmt::Display for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListRef::Id(id) => write!(f, "#{}", id),
            ListRef::File(file) => f.write_str(file),
        }
    }
}

impl From<u32> for ListRef {
    fn from(id: u32) -> Self {
        ListRef::Id(id)
    }
}

impl From<&str> for ListRef {
    fn from(file: &str) -> Self {
        ListRef::File(file.to_string())
    }
}

impl From<String> for ListRef {
    fn from(file: String) -> Self {
        ListRef::File(file)
    }
}

/// Entry reference as accepted by `del`/`set`: keys given as `0x...` are
/// entry ids and take a `#` prefix.
fn entry_key(key: &str) -> String {
    if key.starts_with("0x") {
        format!("#{}", key)
    } else {
        key.to_string()
    }
}

fn require(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::InvalidArgument(format!("{} must be specified", what)))
    } else {
        Ok(())
    }
}

impl HaProxy {
    /// Dump output from the first instance, rejected if it starts with an
    /// error reply. A lone blank line reads as empty.
    async fn dump(&self, command: &str) -> Result<Vec<String>> {
        let lines = self.first()?.command_lines(command).await?;
        check_output(&lines)?;
        if lines.len() == 1 && lines[0].is_empty() {
            return Ok(Vec::new());
        }
        Ok(lines)
    }

    /// List the ACLs, or the entries of one ACL.
    pub async fn show_acl(&self, acl: Option<&ListRef>) -> Result<Vec<String>> {
        match acl {
            Some(acl) => self.dump(&format!("show acl {}", acl)).await,
            None => Ok(self.dump("show acl").await?.into_iter().skip(1).collect()),
        }
    }

    /// Patterns of `acl` matching `value`.
    pub async fn get_acl(&self, acl: &ListRef, value: &str) -> Result<Vec<String>> {
        self.dump(&format!("get acl {} {}", acl, value)).await
    }

    pub async fn add_acl(&self, acl: &ListRef, pattern: &str) -> Result<()> {
        require("pattern", pattern)?;
        self.dispatch(format!("add acl {} {}", acl, pattern)).await
    }

    pub async fn del_acl(&self, acl: &ListRef, key: &str) -> Result<()> {
        require("key", key)?;
        self.dispatch(format!("del acl {} {}", acl, entry_key(key))).await
    }

    pub async fn clear_acl(&self, acl: &ListRef) -> Result<()> {
        self.dispatch(format!("clear acl {}", acl)).await
    }

    /// List the maps, or the entries of one map.
    pub async fn show_map(&self, map: Option<&ListRef>) -> Result<Vec<String>> {
        match map {
            Some(map) => self.dump(&format!("show map {}", map)).await,
            None => Ok(self.dump("show map").await?.into_iter().skip(1).collect()),
        }
    }

    pub async fn get_map(&self, map: &ListRef, value: &str) -> Result<Vec<String>> {
        self.dump(&format!("get map {} {}", map, value)).await
    }

    pub async fn add_map(&self, map: &ListRef, key: &str, value: &str) -> Result<()> {
        require("key", key)?;
        self.dispatch(format!("add map {} {} {}", map, key, value)).await
    }

    pub async fn set_map(&self, map: &ListRef, key: &str, value: &str) -> Result<()> {
        require("key", key)?;
        self.dispatch(format!("set map {} {} {}", map, entry_key(key), value)).await
    }

    pub async fn del_map(&self, map: &ListRef, key: &str) -> Result<()> {
        require("key", key)?;
        self.dispatch(format!("del map {} {}", map, entry_key(key))).await
    }

    pub async fn clear_map(&self, map: &ListRef) -> Result<()> {
        self.dispatch(format!("clear map {}", map)).await
    }

    /// List the stick tables, or dump one table.
    pub async fn show_table(&self, table: Option<&str>) -> Result<Vec<String>> {
        match table {
            Some(table) => self.dump(&format!("show table {}", table)).await,
            None => self.dump("show table").await,
        }
    }

    /// Entry of `table` for `key`, without the table header line.
    pub async fn get_table(&self, table: &str, key: &str) -> Result<Vec<String>> {
        require("table name", table)?;
        require("key", key)?;
        let lines = self.dump(&format!("show table {} key {}", table, key)).await?;
        Ok(lines.into_iter().skip(1).collect())
    }

    /// Update the data of `key` in `table`, e.g. `data.gpc0 1`.
    pub async fn set_table(&self, table: &str, key: &str, data: Option<&str>) -> Result<()> {
        require("table name", table)?;
        require("key", key)?;
        let command = match data {
            Some(data) => format!("set table {} key {} {}", table, key, data),
            None => format!("set table {} key {}", table, key),
        };
        self.dispatch(command).await
    }

    pub async fn del_table(&self, table: &str, key: &str) -> Result<()> {
        require("table name", table)?;
        require("key", key)?;
        self.dispatch(format!("clear table {} key {}", table, key)).await
    }

    pub async fn clear_table(&self, table: Option<&str>) -> Result<()> {
        match table {
            Some(table) => self.dispatch(format!("clear table {}", table)).await,
            None => self.dispatch("clear table".to_string()).await,
        }
    }

    /// Reset counters; `all` also resets maximum and cumulative ones.
    pub async fn clear_counters(&self, all: bool) -> Result<()> {
        let command = if all { "clear counters all" } else { "clear counters" };
        self.dispatch(command.to_string()).await
    }

    pub async fn set_max_conn(&self, value: u64) -> Result<()> {
        self.dispatch(format!("set maxconn global {}", value)).await
    }

    pub async fn set_rate_limit_conn(&self, value: u64) -> Result<()> {
        self.dispatch(format!("set rate-limit connections global {}", value)).await
    }

    pub async fn set_rate_limit_session(&self, value: u64) -> Result<()> {
        self.dispatch(format!("set rate-limit sessions global {}", value)).await
    }

    pub async fn set_rate_limit_ssl_session(&self, value: u64) -> Result<()> {
        self.dispatch(format!("set rate-limit ssl-sessions global {}", value)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ref_render() {
        assert_eq!(ListRef::from(3).to_string(), "#3");
        assert_eq!(
            ListRef::from("/etc/haproxy/blocked.lst").to_string(),
            "/etc/haproxy/blocked.lst"
        );
    }

    #[test]
    fn test_entry_key() {
        assert_eq!(entry_key("0x55d7c3c4a1b0"), "#0x55d7c3c4a1b0");
        assert_eq!(entry_key("10.0.0.1"), "10.0.0.1");
    }
}
