// src/stats/record.rs
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One data row of a stats dump, keyed by the header's field names.
///
/// All rows of a dump share the same header allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    fields: Arc<[String]>,
    values: Vec<String>,
}

impl StatRecord {
    pub(crate) fn new(fields: Arc<[String]>, values: Vec<String>) -> Self {
        debug_assert_eq!(fields.len(), values.len());
        Self { fields, values }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .position(|f| f == field)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    /// Parse a numeric id column such as `iid` or `sid`.
    pub fn id(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(|v| v.trim().parse().ok())
    }

    /// Proxy name (`pxname` column).
    pub fn proxy_name(&self) -> Option<&str> {
        self.get("pxname")
    }

    /// Field/value pairs in header order, skipping unnamed columns.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .zip(self.values.iter())
            .filter(|(f, _)| !f.is_empty())
            .map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect()
    }
}

impl Serialize for StatRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (field, value) in self.iter() {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// A backend's own row plus the rows of its servers.
///
/// `stats` stays `None` when the dump was scoped to servers only.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BackendStats {
    pub stats: Option<StatRecord>,
    pub servers: BTreeMap<String, StatRecord>,
}

/// Parsed `show stat` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatsDump {
    pub frontends: BTreeMap<String, StatRecord>,
    pub backends: BTreeMap<String, BackendStats>,
}
