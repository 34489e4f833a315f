//! Concurrent provider fan-out under a global deadline.

use crate::core::commodity::{CommodityPrice, CommodityType};
use crate::core::crypto::CryptoPriceMap;
use crate::core::rates::RawRateMatrix;
use anyhow::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

/// Polling interval used to re-check the global deadline while waiting for
/// task completions.
pub const SLICE_INTERVAL: Duration = Duration::from_millis(200);

/// What a task was fetching, carrying the metadata the merger needs to fold
/// the value into the matrix.
#[derive(Debug, Clone)]
pub enum TaskKind {
    Base,
    Commodity {
        commodity: CommodityType,
    },
    Crypto {
        symbol: String,
        base_currency: String,
    },
    CryptoBatch {
        asset_count: usize,
    },
}

#[derive(Debug)]
pub enum TaskOutput {
    Base(RawRateMatrix),
    Commodity(CommodityPrice),
    Crypto(Decimal),
    CryptoBatch(CryptoPriceMap),
}

/// Exactly one result per task; failures are captured, never raised.
#[derive(Debug)]
pub struct TaskResult {
    pub id: u64,
    pub kind: TaskKind,
    pub outcome: Result<TaskOutput>,
}

/// One scheduled provider call. The wrapped future resolves to a
/// `TaskResult` on both success and failure, which makes every task
/// uniformly awaitable.
pub struct Task {
    future: BoxFuture<'static, TaskResult>,
}

impl Task {
    pub fn new<F>(id: u64, kind: TaskKind, call: F) -> Self
    where
        F: Future<Output = Result<TaskOutput>> + Send + 'static,
    {
        Self {
            future: async move {
                TaskResult {
                    id,
                    kind,
                    outcome: call.await,
                }
            }
            .boxed(),
        }
    }
}

/// Drives `tasks` to completion, streaming each result to `on_result` the
/// moment it arrives, until all tasks settle or `global_timeout` elapses.
///
/// The deadline is re-checked every [`SLICE_INTERVAL`]. When it passes,
/// tasks still pending are dropped, which cancels their in-flight provider
/// calls. Returns the number of abandoned tasks.
///
/// An already-expired timeout still gets one slice, so results that are
/// ready immediately are not thrown away after a slow setup.
pub async fn run_until_deadline(
    tasks: Vec<Task>,
    global_timeout: Duration,
    mut on_result: impl FnMut(TaskResult),
) -> usize {
    if tasks.is_empty() {
        return 0;
    }

    let deadline = Instant::now() + global_timeout;
    let mut pending: FuturesUnordered<_> = tasks.into_iter().map(|task| task.future).collect();
    let mut first_slice = true;

    while !pending.is_empty() {
        if !first_slice && Instant::now() >= deadline {
            warn!(
                "Global timeout ({:?}) reached; abandoning {} pending fetches",
                global_timeout,
                pending.len()
            );
            break;
        }
        first_slice = false;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let slice = if remaining.is_zero() {
            SLICE_INTERVAL
        } else {
            SLICE_INTERVAL.min(remaining)
        };

        tokio::select! {
            Some(result) = pending.next() => on_result(result),
            _ = tokio::time::sleep(slice) => {}
        }
    }

    pending.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn crypto_kind(symbol: &str) -> TaskKind {
        TaskKind::Crypto {
            symbol: symbol.to_string(),
            base_currency: "USD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_task_list_returns_immediately() {
        let start = Instant::now();
        let abandoned =
            run_until_deadline(Vec::new(), Duration::from_secs(5), |_| panic!("no results"))
                .await;
        assert_eq!(abandoned, 0);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_collects_all_fast_results() {
        let tasks = (0..3)
            .map(|i| {
                Task::new(i, crypto_kind("BTC"), async move {
                    Ok(TaskOutput::Crypto(Decimal::from(i)))
                })
            })
            .collect();

        let mut results = Vec::new();
        let abandoned = run_until_deadline(tasks, Duration::from_secs(1), |r| results.push(r)).await;

        assert_eq!(abandoned, 0);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.outcome.is_ok()));
    }

    #[tokio::test]
    async fn test_failure_is_captured_not_raised() {
        let tasks = vec![Task::new(1, TaskKind::Base, async {
            Err(anyhow!("provider down"))
        })];

        let mut results = Vec::new();
        run_until_deadline(tasks, Duration::from_secs(1), |r| results.push(r)).await;

        assert_eq!(results.len(), 1);
        let err = results[0].outcome.as_ref().unwrap_err();
        assert!(err.to_string().contains("provider down"));
    }

    #[tokio::test]
    async fn test_hanging_task_is_abandoned_within_deadline_plus_slice() {
        let tasks = vec![
            Task::new(1, crypto_kind("BTC"), async {
                Ok(TaskOutput::Crypto(Decimal::ONE))
            }),
            Task::new(2, crypto_kind("ETH"), async {
                futures::future::pending::<()>().await;
                unreachable!()
            }),
        ];

        let start = Instant::now();
        let mut results = Vec::new();
        let abandoned =
            run_until_deadline(tasks, Duration::from_millis(300), |r| results.push(r)).await;

        assert_eq!(abandoned, 1);
        assert_eq!(results.len(), 1);
        assert!(start.elapsed() >= Duration::from_millis(300));
        // One slice of grace beyond the deadline, plus scheduling noise
        assert!(start.elapsed() < Duration::from_millis(300) + SLICE_INTERVAL * 2);
    }

    #[tokio::test]
    async fn test_expired_timeout_still_gets_one_slice() {
        let tasks = vec![Task::new(1, crypto_kind("BTC"), async {
            Ok(TaskOutput::Crypto(Decimal::ONE))
        })];

        let mut results = Vec::new();
        let abandoned = run_until_deadline(tasks, Duration::ZERO, |r| results.push(r)).await;

        assert_eq!(abandoned, 0);
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_late_result_within_deadline_is_merged() {
        let tasks = vec![Task::new(1, crypto_kind("BTC"), async {
            tokio::time::sleep(Duration::from_millis(450)).await;
            Ok(TaskOutput::Crypto(Decimal::ONE))
        })];

        let mut results = Vec::new();
        let abandoned =
            run_until_deadline(tasks, Duration::from_secs(2), |r| results.push(r)).await;

        assert_eq!(abandoned, 0);
        assert_eq!(results.len(), 1);
    }
}
