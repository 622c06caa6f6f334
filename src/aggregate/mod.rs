// src/aggregate/mod.rs
mod classify;
mod reconcile;

pub use classify::{MetricKind, AVERAGE_METRICS, SUM_METRICS};
pub use reconcile::{
    calculate, check_address_port, check_command, check_output, compare_values, to_number,
    ADDRESS_PORT_SUCCESS, ERROR_OUTPUT, SUCCESS_OUTPUT,
};

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Anything bound to a single instance.
pub trait InstanceScoped {
    fn instance_id(&self) -> usize;
}

/// Run `op` once per member, each on its own task, and collect
/// `(instance id, result)` pairs in member order.
///
/// Every task is joined before anything is returned. Any failed member, or a
/// task that panicked, fails the whole call.
pub async fn run_across<T, R, F, Fut>(members: &[Arc<T>], op: F) -> Result<Vec<(usize, R)>>
where
    T: InstanceScoped + Send + Sync + 'static,
    F: Fn(Arc<T>) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    let tasks: Vec<_> = members
        .iter()
        .map(|member| {
            let id = member.instance_id();
            let fut = op(member.clone());
            tokio::spawn(async move { fut.await.map(|result| (id, result)) })
        })
        .collect();

    let joined = futures::future::join_all(tasks).await;

    joined
        .into_iter()
        .map(|outcome| match outcome {
            Ok(Ok(pair)) => Ok(pair),
            Ok(Err(e)) => {
                warn!("Instance operation failed: {}", e);
                Err(e)
            }
            Err(e) => Err(Error::Task(e.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Member {
        id: usize,
        delay_ms: u64,
        fail: bool,
    }

    impl InstanceScoped for Member {
        fn instance_id(&self) -> usize {
            self.id
        }
    }

    fn members(layout: &[(usize, u64, bool)]) -> Vec<Arc<Member>> {
        layout
            .iter()
            .map(|&(id, delay_ms, fail)| Arc::new(Member { id, delay_ms, fail }))
            .collect()
    }

    async fn answer(member: Arc<Member>) -> Result<String> {
        tokio::time::sleep(Duration::from_millis(member.delay_ms)).await;
        if member.fail {
            Err(Error::Protocol(format!("instance {} broke", member.id)))
        } else {
            Ok(format!("reply-{}", member.id))
        }
    }

    #[tokio::test]
    async fn test_results_keep_member_order() {
        let members = members(&[(1, 30, false), (2, 0, false), (3, 10, false)]);
        let results = run_across(&members, answer).await.unwrap();

        assert_eq!(
            results,
            vec![
                (1, "reply-1".to_string()),
                (2, "reply-2".to_string()),
                (3, "reply-3".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_members_run_concurrently() {
        let members = members(&[(1, 100, false), (2, 100, false), (3, 100, false)]);
        let started = std::time::Instant::now();
        run_across(&members, answer).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(280));
    }

    #[tokio::test]
    async fn test_one_failure_fails_the_aggregate() {
        let members = members(&[(1, 0, false), (2, 0, true), (3, 0, false)]);
        let err = run_across(&members, answer).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg == "instance 2 broke"));
    }

    #[tokio::test]
    async fn test_panicking_task_is_a_task_error() {
        let members = members(&[(1, 0, false)]);
        let err = run_across(&members, |_m| async move {
            if true {
                panic!("boom");
            }
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Task(_)));
    }
}
