//! Readiness polling against a booting daemon.

use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::probe;
use crate::domain::{HarnessError, RetryBudget};
use crate::ports::LogSink;
use crate::transport::insecure_client_config;

/// Successful readiness poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ready {
    /// Dial attempts made, including the successful one.
    pub attempts: u32,
    /// Wall time from the first attempt to success.
    pub elapsed: Duration,
}

/// Retries a dial until it succeeds or the budget runs out.
///
/// Readiness is proven only by an established connection, which is dropped
/// immediately. Every failed attempt is logged at debug level and reported to
/// the sink.
#[derive(Clone)]
pub struct ReadinessPoller {
    budget: RetryBudget,
    sink: Arc<dyn LogSink>,
}

impl ReadinessPoller {
    pub fn new(budget: RetryBudget, sink: Arc<dyn LogSink>) -> Self {
        Self { budget, sink }
    }

    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    /// Poll with an arbitrary dial closure.
    ///
    /// Fails with [`HarnessError::ReadinessTimeout`] once the interval
    /// schedule is exhausted or the wall clock passes `max_elapsed`.
    pub async fn await_ready<F, Fut, C, E>(
        &self,
        target: impl Display,
        mut dial: F,
    ) -> Result<Ready, HarnessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<C, E>>,
        E: Display,
    {
        let target = target.to_string();
        let started = Instant::now();
        let mut intervals = self.budget.intervals();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match dial().await {
                Ok(connection) => {
                    drop(connection);
                    let elapsed = started.elapsed();
                    info!(addr = %target, attempts, ?elapsed, "target is ready");
                    return Ok(Ready { attempts, elapsed });
                }
                Err(e) => {
                    debug!(addr = %target, attempt = attempts, error = %e, "dial failed");
                    self.sink
                        .record(&format!("Not able to connect to {}, err {}", target, e));

                    let next = intervals
                        .next()
                        .filter(|_| started.elapsed() < self.budget.max_elapsed);
                    match next {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(HarnessError::ReadinessTimeout {
                                target,
                                attempts,
                                elapsed: started.elapsed(),
                                last_error: e.to_string(),
                            })
                        }
                    }
                }
            }
        }
    }

    /// Poll until `addr` accepts a TCP connection.
    pub async fn await_tcp(&self, addr: SocketAddr) -> Result<Ready, HarnessError> {
        self.await_ready(addr, || probe::dial_tcp(addr)).await
    }

    /// Poll until `addr` completes a TLS handshake (no certificate checks).
    pub async fn await_tls(&self, addr: SocketAddr) -> Result<Ready, HarnessError> {
        let config = insecure_client_config().map_err(|e| HarnessError::Handshake {
            target: addr.to_string(),
            reason: e.to_string(),
        })?;
        self.await_ready(addr, || probe::dial_tls(addr, config.clone()))
            .await
    }
}

impl std::fmt::Debug for ReadinessPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessPoller")
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemorySink;
    use crate::testing::{closed_addr, TlsListener};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn poller(budget: RetryBudget) -> (ReadinessPoller, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (ReadinessPoller::new(budget, sink.clone()), sink)
    }

    fn quick() -> RetryBudget {
        RetryBudget::fixed(Duration::from_millis(10), Duration::from_millis(200))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let (poller, sink) = poller(RetryBudget::default());
        let calls = AtomicU32::new(0);

        let ready = poller
            .await_ready("daemon:8333", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err("connection refused")
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(ready.attempts, 4);
        assert_eq!(sink.len(), 3);
        assert!(sink
            .lines()
            .iter()
            .all(|l| l == "Not able to connect to daemon:8333, err connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_budget_is_exhausted() {
        let budget = RetryBudget::fixed(Duration::from_secs(1), Duration::from_secs(5));
        let (poller, sink) = poller(budget);

        let err = poller
            .await_ready("daemon:8334", || async { Err::<(), _>("refused") })
            .await
            .unwrap_err();

        match err {
            HarnessError::ReadinessTimeout {
                target,
                attempts,
                elapsed,
                last_error,
            } => {
                assert_eq!(target, "daemon:8334");
                assert_eq!(attempts as usize, budget.max_attempts());
                assert!(elapsed >= Duration::from_secs(5));
                assert!(elapsed < Duration::from_secs(6));
                assert_eq!(last_error, "refused");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.len(), budget.max_attempts());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_dials_once() {
        let (poller, _) = poller(RetryBudget::with_max_elapsed(Duration::ZERO));
        let calls = AtomicU32::new(0);

        let result = poller
            .await_ready("x", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("refused") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tcp_poll_against_listener() {
        let listener = TlsListener::spawn().await;
        let (poller, sink) = poller(quick());

        let ready = poller.await_tcp(listener.addr()).await.unwrap();
        assert_eq!(ready.attempts, 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_tls_poll_against_listener() {
        let listener = TlsListener::spawn().await;
        let (poller, _) = poller(quick());

        let ready = poller.await_tls(listener.addr()).await.unwrap();
        assert_eq!(ready.attempts, 1);
    }

    #[tokio::test]
    async fn test_tcp_poll_against_closed_port_times_out() {
        let addr = closed_addr().await;
        let (poller, sink) = poller(quick());

        let result = poller.await_tcp(addr).await;
        assert!(matches!(result, Err(HarnessError::ReadinessTimeout { .. })));
        assert!(sink.contains(&format!("Not able to connect to {}", addr)));
    }
}
