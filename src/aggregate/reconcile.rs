// src/aggregate/reconcile.rs
//
// Policies for turning one answer per instance into a single answer.

use super::classify::MetricKind;
use crate::error::{Error, Result};
use std::fmt::Display;

/// Replies that mean a write command was accepted.
pub const SUCCESS_OUTPUT: &[&str] = &[
    "",
    "Done.",
    "Frontend is already enabled.",
    "Frontend is already disabled.",
    "Frontend was previously shut down, cannot enable.",
    "Frontend was already shut down.",
];

/// Leading text of replies that report a rejected command.
pub const ERROR_OUTPUT: &[&str] = &[
    "No such backend.",
    "No such server.",
    "No such frontend.",
    "No such table",
    "Unknown command",
    "Require 'backend/server'.",
    "Require 'frontend'.",
    "Proxy is disabled.",
    "Key not found.",
    "Missing ACL identifier and/or key.",
    "Missing map identifier and/or key.",
    "Missing ACL identifier.",
    "Missing map identifier.",
    "Unknown ACL identifier.",
    "Unknown map identifier.",
    "Invalid",
    "Permission denied",
];

/// Fragments present in a successful `set server ... addr ... port ...` reply.
pub const ADDRESS_PORT_SUCCESS: &[&str] = &[
    "IP changed from",
    "port changed from",
    "no need to change",
];

/// Return the value every instance agrees on.
///
/// Never majority-votes: a single dissenting instance fails the read.
pub fn compare_values<T>(field: &str, pairs: &[(usize, T)]) -> Result<T>
where
    T: PartialEq + Clone + Display,
{
    let (_, first) = pairs.first().ok_or_else(|| Error::NotFound {
        kind: "value",
        name: field.to_string(),
    })?;

    if pairs.iter().all(|(_, value)| value == first) {
        Ok(first.clone())
    } else {
        Err(Error::Inconsistent {
            field: field.to_string(),
            values: pairs
                .iter()
                .map(|(id, value)| (*id, value.to_string()))
                .collect(),
        })
    }
}

/// Sum or average `values` according to the metric's fixed classification.
///
/// Unknown names fail before looking at the values; no values yields zero.
pub fn calculate(name: &str, values: &[f64]) -> Result<f64> {
    let kind = MetricKind::classify(name)?;
    if values.is_empty() {
        return Ok(0.0);
    }

    let total: f64 = values.iter().sum();
    Ok(match kind {
        MetricKind::Sum => total,
        MetricKind::Average => total / values.len() as f64,
    })
}

/// Numeric reading of a raw stats value.
///
/// Integers parse as-is, decimals truncate toward zero, anything else
/// (including the empty string) reads as zero.
pub fn to_number(raw: &str) -> f64 {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return value as f64;
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(f64::trunc)
        .unwrap_or(0.0)
}

/// Accept a write command only if every instance gave the same recognised
/// success reply.
pub fn check_command(pairs: &[(usize, String)]) -> Result<()> {
    let reply = uniform_reply(pairs)?;
    if SUCCESS_OUTPUT.contains(&reply) {
        Ok(())
    } else {
        Err(Error::CommandFailed(reply.to_string()))
    }
}

/// Same as [`check_command`] for address/port changes, whose replies carry
/// the old and new values.
pub fn check_address_port(pairs: &[(usize, String)]) -> Result<()> {
    let reply = uniform_reply(pairs)?;
    if ADDRESS_PORT_SUCCESS.iter().any(|frag| reply.contains(frag)) {
        Ok(())
    } else {
        Err(Error::CommandFailed(reply.to_string()))
    }
}

/// Reject dump output whose first line is an error reply.
pub fn check_output(lines: &[String]) -> Result<()> {
    match lines.first() {
        Some(first) if ERROR_OUTPUT.iter().any(|err| first.starts_with(err)) => {
            Err(Error::CommandFailed(first.clone()))
        }
        _ => Ok(()),
    }
}

fn uniform_reply(pairs: &[(usize, String)]) -> Result<&str> {
    let (_, first) = pairs
        .first()
        .ok_or_else(|| Error::CommandFailed("no instance answered".to_string()))?;

    if pairs.iter().all(|(_, reply)| reply == first) {
        Ok(first.as_str())
    } else {
        Err(Error::CommandFailed(format!(
            "instances replied differently: {:?}",
            pairs
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::classify::{AVERAGE_METRICS, SUM_METRICS};
    use proptest::prelude::*;

    #[test]
    fn test_compare_values_agreeing() {
        let pairs = vec![(1, "UP".to_string()), (2, "UP".to_string())];
        assert_eq!(compare_values("status", &pairs).unwrap(), "UP");
    }

    #[test]
    fn test_compare_values_disagreeing() {
        let pairs = vec![(1, "UP".to_string()), (2, "DOWN".to_string())];
        match compare_values("status", &pairs).unwrap_err() {
            Error::Inconsistent { field, values } => {
                assert_eq!(field, "status");
                assert_eq!(values.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_compare_values_empty() {
        let pairs: Vec<(usize, String)> = Vec::new();
        assert!(matches!(
            compare_values("status", &pairs),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_calculate_unknown_metric() {
        assert!(matches!(
            calculate("status", &[1.0, 2.0]),
            Err(Error::UnknownMetric(_))
        ));
        assert!(matches!(calculate("bogus", &[]), Err(Error::UnknownMetric(_))));
    }

    #[test]
    fn test_calculate_empty_is_zero() {
        assert_eq!(calculate("stot", &[]).unwrap(), 0.0);
        assert_eq!(calculate("weight", &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number("42"), 42.0);
        assert_eq!(to_number(" 7 "), 7.0);
        assert_eq!(to_number("3.9"), 3.0);
        assert_eq!(to_number("-3.9"), -3.0);
        assert_eq!(to_number(""), 0.0);
        assert_eq!(to_number("UP"), 0.0);
    }

    #[test]
    fn test_check_command() {
        let ok = vec![(1, "Done.".to_string()), (2, "Done.".to_string())];
        assert!(check_command(&ok).is_ok());

        let empty = vec![(1, String::new()), (2, String::new())];
        assert!(check_command(&empty).is_ok());

        let diverging = vec![(1, "Done.".to_string()), (2, String::new())];
        assert!(matches!(check_command(&diverging), Err(Error::CommandFailed(_))));

        let failed = vec![(1, "No such server.".to_string()), (2, "No such server.".to_string())];
        match check_command(&failed).unwrap_err() {
            Error::CommandFailed(text) => assert_eq!(text, "No such server."),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_address_port() {
        let reply = "IP changed from '10.0.0.1' to '10.0.0.2', \
                     no need to change the port by 'stats socket command'";
        let ok = vec![(1, reply.to_string()), (2, reply.to_string())];
        assert!(check_address_port(&ok).is_ok());

        let bad = vec![(1, "No such server.".to_string())];
        assert!(check_address_port(&bad).is_err());
    }

    #[test]
    fn test_check_output() {
        assert!(check_output(&["0x1 10.0.0.1".to_string()]).is_ok());
        assert!(check_output(&[]).is_ok());
        assert!(matches!(
            check_output(&["Unknown ACL identifier. Please use #<id> or <file>.".to_string()]),
            Err(Error::CommandFailed(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_sum_metrics_add(a in 0u32..1_000_000, b in 0u32..1_000_000, c in 0u32..1_000_000) {
            let values = [a as f64, b as f64, c as f64];
            for name in SUM_METRICS.iter() {
                prop_assert_eq!(calculate(name, &values).unwrap(), values.iter().sum::<f64>());
            }
        }

        #[test]
        fn prop_average_metrics_divide(
            a in 0u32..1_000_000,
            b in 0u32..1_000_000,
            c in 0u32..1_000_000,
        ) {
            let values = [a as f64, b as f64, c as f64];
            let expected = (values[0] + values[1] + values[2]) / 3.0;
            for name in AVERAGE_METRICS.iter() {
                prop_assert_eq!(calculate(name, &values).unwrap(), expected);
            }
        }
    }
}
