// src/transport/client.rs
use super::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::retry::{RetryDecision, RetryPolicy, RetryStrategy};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Sends commands to one stats socket with per-attempt timeout and retries.
#[derive(Clone)]
pub struct Transport {
    endpoint: Arc<dyn Endpoint>,
    label: String,
    retry: RetryStrategy,
    timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Transport {
    pub fn new(
        endpoint: Arc<dyn Endpoint>,
        policy: RetryPolicy,
        retry_interval: Duration,
        timeout: Duration,
    ) -> Self {
        let label = endpoint.describe();
        Self {
            endpoint,
            label,
            retry: RetryStrategy::new(policy, retry_interval),
            timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.label
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a command and return the first line of the response.
    ///
    /// Used for single-status commands (`enable`, `set ...`) that answer with
    /// one line, possibly empty.
    pub async fn command(&self, command: &str) -> Result<String> {
        let lines = self.command_lines(command).await?;
        Ok(lines.into_iter().next().unwrap_or_default())
    }

    /// Send a command and return the whole response, one entry per line.
    pub async fn command_lines(&self, command: &str) -> Result<Vec<String>> {
        if command.contains('\n') {
            return Err(Error::InvalidArgument(format!(
                "command must be a single line: {:?}",
                command
            )));
        }

        let started = Instant::now();
        let attempts = AtomicU64::new(0);

        let result = self
            .retry
            .execute_with_decision(
                || {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    self.attempt(command)
                },
                |err: &Error| {
                    if err.is_retryable() {
                        RetryDecision::Retry
                    } else {
                        RetryDecision::NoRetry
                    }
                },
            )
            .await;

        if let Some(metrics) = &self.metrics {
            let retries = attempts.load(Ordering::Relaxed).saturating_sub(1);
            metrics.record_retries(&self.label, retries);
            metrics.record_command(&self.label, result.is_ok(), started.elapsed());
        }

        result
    }

    async fn attempt(&self, command: &str) -> Result<Vec<String>> {
        debug!(endpoint = %self.label, command, "sending command");

        let raw = timeout(self.timeout, self.endpoint.exchange(command))
            .await
            .map_err(|_| {
                Error::transport(
                    self.label.clone(),
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no response within {:?}", self.timeout),
                    ),
                )
            })?
            .map_err(|e| Error::transport(self.label.clone(), e))?;

        split_response(&raw)
    }
}

/// Split a raw response into lines.
///
/// The protocol terminates multi-line dumps with one extra blank line; exactly
/// one such line is dropped when more than one line is present.
pub fn split_response(raw: &str) -> Result<Vec<String>> {
    if raw.is_empty() {
        return Err(Error::Protocol("no data received".to_string()));
    }

    let body = raw.strip_suffix('\n').unwrap_or(raw);
    let mut lines: Vec<String> = body
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();

    if lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Fails every exchange and records when each attempt happened.
    struct Refusing {
        attempts: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl Endpoint for Refusing {
        async fn exchange(&self, _command: &str) -> io::Result<String> {
            self.attempts.lock().unwrap().push(Instant::now());
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }

        fn describe(&self) -> String {
            "refusing".to_string()
        }
    }

    struct Stalling;

    #[async_trait]
    impl Endpoint for Stalling {
        async fn exchange(&self, _command: &str) -> io::Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        }

        fn describe(&self) -> String {
            "stalling".to_string()
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl Endpoint for Fixed {
        async fn exchange(&self, _command: &str) -> io::Result<String> {
            Ok(self.0.to_string())
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    #[test]
    fn test_split_single_status_line() {
        assert_eq!(split_response("Done.\n").unwrap(), vec!["Done."]);
        assert_eq!(split_response("\n").unwrap(), vec![""]);
    }

    #[test]
    fn test_split_strips_one_trailing_blank_line() {
        let lines = split_response("# pxname,svname\nfe,FRONTEND\n\n").unwrap();
        assert_eq!(lines, vec!["# pxname,svname", "fe,FRONTEND"]);

        let lines = split_response("a\nb\n\n\n").unwrap();
        assert_eq!(lines, vec!["a", "b", ""]);
    }

    #[test]
    fn test_split_empty_response_is_protocol_error() {
        assert!(matches!(split_response(""), Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_retry_two_makes_three_spaced_attempts() {
        let endpoint = Arc::new(Refusing {
            attempts: Mutex::new(Vec::new()),
        });
        let interval = Duration::from_millis(40);
        let transport = Transport::new(
            endpoint.clone(),
            RetryPolicy::from_setting(Some(2)),
            interval,
            Duration::from_secs(1),
        );

        let err = transport.command("show info").await.unwrap_err();
        match err {
            Error::Transport { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::ConnectionRefused)
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let attempts = endpoint.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 3);
        for pair in attempts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= interval);
        }
    }

    #[tokio::test]
    async fn test_no_retry_setting_makes_single_attempt() {
        let endpoint = Arc::new(Refusing {
            attempts: Mutex::new(Vec::new()),
        });
        let transport = Transport::new(
            endpoint.clone(),
            RetryPolicy::from_setting(None),
            Duration::from_millis(10),
            Duration::from_secs(1),
        );

        assert!(transport.command("show info").await.is_err());
        assert_eq!(endpoint.attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_a_transport_error() {
        let transport = Transport::new(
            Arc::new(Stalling),
            RetryPolicy::Never,
            Duration::from_millis(1),
            Duration::from_millis(20),
        );

        match transport.command("show info").await.unwrap_err() {
            Error::Transport { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::TimedOut)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_line_and_full_output() {
        let transport = Transport::new(
            Arc::new(Fixed("first\nsecond\n\n")),
            RetryPolicy::Never,
            Duration::from_millis(1),
            Duration::from_secs(1),
        );

        assert_eq!(transport.command("show acl").await.unwrap(), "first");
        assert_eq!(
            transport.command_lines("show acl").await.unwrap(),
            vec!["first", "second"]
        );
    }

    #[tokio::test]
    async fn test_multi_line_command_is_rejected_before_io() {
        let endpoint = Arc::new(Refusing {
            attempts: Mutex::new(Vec::new()),
        });
        let transport = Transport::new(
            endpoint.clone(),
            RetryPolicy::Limited(3),
            Duration::from_millis(1),
            Duration::from_secs(1),
        );

        let err = transport.command("show info\nshow stat").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(endpoint.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retries_are_counted_in_metrics() {
        let registry = crate::metrics::MetricsRegistry::new().unwrap();
        let transport = Transport::new(
            Arc::new(Refusing {
                attempts: Mutex::new(Vec::new()),
            }),
            RetryPolicy::Limited(1),
            Duration::from_millis(1),
            Duration::from_secs(1),
        )
        .with_metrics(registry.collector());

        assert!(transport.command("show info").await.is_err());

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("haproxy_admin_command_retries_total{instance=\"refusing\"} 1"));
    }
}
