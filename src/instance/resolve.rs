// src/instance/resolve.rs
//
// Numeric proxy/server ids are reassigned whenever the configuration is
// reloaded, so a stored id is only a hint. Every lookup is validated by name
// and falls back to a scan of the whole namespace when the hint misses.

use crate::error::Result;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const UNKNOWN: u64 = u64::MAX;

/// Last known numeric id of an object on one instance.
#[derive(Debug)]
pub struct CachedId(AtomicU64);

impl CachedId {
    pub fn new(id: Option<u64>) -> Self {
        Self(AtomicU64::new(id.unwrap_or(UNKNOWN)))
    }

    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Acquire) {
            UNKNOWN => None,
            id => Some(id),
        }
    }

    pub fn set(&self, id: u64) {
        self.0.store(id, Ordering::Release);
    }
}

/// Outcome of locating an object by cached id, then by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    /// The cached id still names our object.
    Resolved(T),
    /// The cached id missed; a full scan found the object under a new id.
    StaleRescan(T),
    /// The object is not present on this instance.
    Missing,
}

impl<T> Resolution<T> {
    pub fn into_inner(self) -> Option<T> {
        match self {
            Resolution::Resolved(value) | Resolution::StaleRescan(value) => Some(value),
            Resolution::Missing => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Resolution::StaleRescan(_))
    }
}

/// Look an object up through `fetch`, first scoped to the cached id, then
/// unscoped. `fetch` must return the object only if its name matches.
pub(crate) async fn resolve<T, F, Fut>(
    kind: &'static str,
    name: &str,
    cached: &CachedId,
    fetch: F,
    id_of: impl Fn(&T) -> Option<u64>,
) -> Result<Resolution<T>>
where
    F: Fn(Option<u64>) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    if let Some(id) = cached.get() {
        if let Some(found) = fetch(Some(id)).await? {
            return Ok(Resolution::Resolved(found));
        }
        debug!(kind, name, id, "cached id is stale, rescanning all objects");
    }

    match fetch(None).await? {
        Some(found) => {
            if let Some(new_id) = id_of(&found) {
                debug!(kind, name, new_id, "relocated by name");
                cached.set(new_id);
            }
            Ok(Resolution::StaleRescan(found))
        }
        None => {
            debug!(kind, name, "not present on this instance");
            Ok(Resolution::Missing)
        }
    }
}
