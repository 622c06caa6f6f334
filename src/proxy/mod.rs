//
// src/proxy/mod.rs
//
// Logical frontends, backends and servers: one facade per name, backed by
// the same-named object on every instance where it exists.
//
mod backend;
mod frontend;
mod server;

pub use backend::{Backend, BACKEND_METRICS};
pub use frontend::{Frontend, FRONTEND_METRICS};
pub use server::{Server, ServerState, Weight, SERVER_METRICS};

use crate::aggregate::{calculate, check_command, compare_values, run_across, to_number, MetricKind};
use crate::error::{Error, Result};
use crate::instance::StatSource;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fail with `UnknownMetric` unless `metric` is both offered by the entity
/// and classified for aggregation.
pub(crate) fn validate_metric(allowed: &[&str], metric: &str) -> Result<MetricKind> {
    if !allowed.contains(&metric) {
        return Err(Error::UnknownMetric(metric.to_string()));
    }
    MetricKind::classify(metric)
}

/// Value of `field` that every member reports identically.
///
/// Members whose object vanished are left out; if none is left the entity
/// is reported as not found.
pub(crate) async fn uniform<T: StatSource>(
    kind: &'static str,
    name: &str,
    members: &[Arc<T>],
    field: &'static str,
) -> Result<String> {
    let present = present_values(members, field).await?;
    if present.is_empty() {
        return Err(Error::NotFound {
            kind,
            name: name.to_string(),
        });
    }
    compare_values(field, &present)
}

/// Sum or average of a numeric metric over the members that report it.
pub(crate) async fn calculated<T: StatSource>(
    kind: &'static str,
    name: &str,
    members: &[Arc<T>],
    allowed: &[&str],
    metric: &str,
) -> Result<f64> {
    validate_metric(allowed, metric)?;

    let owned = metric.to_string();
    let values = run_across(members, move |member| {
        let metric = owned.clone();
        async move { member.metric(&metric).await }
    })
    .await?;

    let numbers: Vec<f64> = values
        .into_iter()
        .filter_map(|(_, raw)| raw.map(|raw| to_number(&raw)))
        .collect();

    if numbers.is_empty() {
        return Err(Error::NotFound {
            kind,
            name: name.to_string(),
        });
    }
    calculate(metric, &numbers)
}

/// `field` per instance, skipping instances where the object is gone.
pub(crate) async fn present_values<T: StatSource>(
    members: &[Arc<T>],
    field: &'static str,
) -> Result<Vec<(usize, String)>> {
    let values =
        run_across(members, move |member| async move { member.metric(field).await }).await?;
    Ok(values
        .into_iter()
        .filter_map(|(id, value)| value.map(|value| (id, value)))
        .collect())
}

/// Numeric `field` per instance.
pub(crate) async fn per_instance_metric<T: StatSource>(
    members: &[Arc<T>],
    field: &'static str,
) -> Result<Vec<(usize, f64)>> {
    Ok(present_values(members, field)
        .await?
        .into_iter()
        .map(|(id, raw)| (id, to_number(&raw)))
        .collect())
}

pub(crate) async fn per_instance_stats<T: StatSource>(
    members: &[Arc<T>],
) -> Result<Vec<(usize, BTreeMap<String, String>)>> {
    run_across(members, |member| async move { member.stats().await }).await
}

/// Send `command` through every member and require the same success reply.
pub(crate) async fn dispatch<T: StatSource>(members: &[Arc<T>], command: String) -> Result<()> {
    let replies = replies(members, command).await?;
    check_command(&replies)
}

pub(crate) async fn replies<T: StatSource>(
    members: &[Arc<T>],
    command: String,
) -> Result<Vec<(usize, String)>> {
    run_across(members, move |member| {
        let command = command.clone();
        async move { member.command(&command).await }
    })
    .await
}

/// Merge per-instance handles into name -> handles, in name order.
pub(crate) fn group_by_name<T: StatSource>(
    per_instance: Vec<(usize, Vec<Arc<T>>)>,
) -> BTreeMap<String, Vec<Arc<T>>> {
    let mut grouped: BTreeMap<String, Vec<Arc<T>>> = BTreeMap::new();
    for (_, handles) in per_instance {
        for handle in handles {
            grouped
                .entry(handle.name().to_string())
                .or_default()
                .push(handle);
        }
    }
    grouped
}

/// The single element of a lookup by name.
pub(crate) fn exactly_one<T>(kind: &'static str, name: &str, mut found: Vec<T>) -> Result<T> {
    match found.len() {
        0 => Err(Error::NotFound {
            kind,
            name: name.to_string(),
        }),
        1 => Ok(found.remove(0)),
        count => Err(Error::Ambiguous {
            kind,
            name: name.to_string(),
            count,
        }),
    }
}

pub(crate) fn require_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(Error::InvalidArgument(format!("{} name must be specified", what)))
    } else {
        Ok(())
    }
}
