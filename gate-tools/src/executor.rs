//! Deadline-bound, fault-isolated execution of tool handlers.

use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gate_primitives::Arguments;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::invocation::{ToolFailure, ToolOutput, error_codes};
use crate::registry::ToolEntry;

const DEFAULT_MAX_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(64).unwrap();

/// Maximum number of handlers allowed to run at once.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    max_concurrency: NonZeroUsize,
}

impl ExecutorConfig {
    /// Creates a new configuration with the supplied concurrency limit.
    #[must_use]
    pub const fn new(max_concurrency: NonZeroUsize) -> Self {
        Self { max_concurrency }
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub const fn max_concurrency(self) -> NonZeroUsize {
        self.max_concurrency
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

/// Runs each invocation as its own tokio task under a deadline.
///
/// A handler that errors, panics, or stalls only fails its own call: panics
/// are caught at the task boundary and expired calls are aborted, so
/// concurrently dispatched calls complete at their own pace.
#[derive(Debug, Clone)]
pub struct ConcurrencyExecutor {
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
    config: ExecutorConfig,
}

impl ConcurrencyExecutor {
    /// Constructs an executor using the provided configuration.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        let permits = config.max_concurrency().get();
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            closed: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Returns the number of calls that could start immediately.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns `true` if the executor has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops admitting new calls. In-flight calls run to completion.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.semaphore.close();
    }

    /// Runs `entry` with `arguments`, failing the call once `deadline` elapses.
    ///
    /// The deadline starts once a concurrency permit has been acquired and is
    /// enforced inside the handler task. Dropping the returned future aborts
    /// the handler and releases its permit.
    ///
    /// # Errors
    ///
    /// Returns the handler's own [`ToolFailure`], or a failure coded
    /// [`error_codes::TIMEOUT`], [`error_codes::PANIC`],
    /// [`error_codes::CANCELLED`] or [`error_codes::EXECUTOR_CLOSED`].
    pub async fn run(&self, entry: ToolEntry, arguments: Arguments, deadline: Duration) -> ToolOutput {
        if self.is_closed() {
            return Err(closed());
        }

        let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
            return Err(closed());
        };

        let tool = entry.metadata().name().to_owned();
        let mut task = AbortOnDrop(tokio::spawn(async move {
            let _permit = permit;
            tokio::time::timeout(deadline, entry.invoke(arguments)).await
        }));

        match (&mut task.0).await {
            Ok(Ok(output)) => output,
            Ok(Err(_elapsed)) => {
                let deadline_ms = deadline.as_millis();
                warn!(tool = %tool, deadline_ms, "tool call timed out");
                Err(ToolFailure::new(
                    error_codes::TIMEOUT,
                    format!("tool `{tool}` exceeded its {deadline_ms}ms deadline"),
                ))
            }
            Err(err) if err.is_panic() => {
                let message = panic_message(&*err.into_panic());
                warn!(tool = %tool, panic = %message, "tool handler panicked");
                Err(ToolFailure::new(error_codes::PANIC, message))
            }
            Err(_) => Err(ToolFailure::new(
                error_codes::CANCELLED,
                format!("tool `{tool}` was cancelled"),
            )),
        }
    }
}

/// Aborts the handler task when the awaiting caller goes away, so an
/// abandoned call cannot hold its permit past the deadline.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Default for ConcurrencyExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

fn closed() -> ToolFailure {
    ToolFailure::new(error_codes::EXECUTOR_CLOSED, "executor is closed")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use serde_json::{Value, json};

    use crate::registry::ToolMetadata;

    fn entry<F, Fut>(name: &str, handler: F) -> ToolEntry
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ToolOutput> + Send + 'static,
    {
        ToolEntry::new(ToolMetadata::new(name).unwrap(), handler)
    }

    fn sleeper(name: &str, delay: Duration) -> ToolEntry {
        entry(name, move |_args: Arguments| async move {
            tokio::time::sleep(delay).await;
            Ok(Value::from("done"))
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stalled_call_does_not_delay_fast_call() {
        let executor = ConcurrencyExecutor::default();
        let slow = sleeper("slow", Duration::from_secs(10));
        let fast = sleeper("fast", Duration::from_millis(20));

        let started = Instant::now();
        let (slow_out, fast_out) = tokio::join!(
            executor.run(slow, Arguments::new(), Duration::from_millis(200)),
            async {
                let out = executor
                    .run(fast, Arguments::new(), Duration::from_secs(5))
                    .await;
                (out, started.elapsed())
            },
        );

        let (fast_out, fast_elapsed) = fast_out;
        assert_eq!(fast_out.unwrap(), Value::from("done"));
        assert!(fast_elapsed < Duration::from_millis(150));

        let failure = slow_out.unwrap_err();
        assert_eq!(failure.code(), error_codes::TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn panics_become_failures() {
        let executor = ConcurrencyExecutor::default();
        let exploding = entry("explode", |_args: Arguments| async move {
            if true {
                panic!("kaboom");
            }
            Ok(Value::Null)
        });

        let failure = executor
            .run(exploding, Arguments::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(failure.code(), error_codes::PANIC);
        assert_eq!(failure.message(), "kaboom");

        let ok = executor
            .run(sleeper("after", Duration::ZERO), Arguments::new(), Duration::from_secs(1))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn respects_max_concurrency() {
        let executor = ConcurrencyExecutor::new(ExecutorConfig::new(NonZeroUsize::new(2).unwrap()));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let counted = {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            entry("counted", move |_args: Arguments| {
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(json!(current))
                }
            })
        };

        let calls = (0..3).map(|_| executor.run(counted.clone(), Arguments::new(), Duration::from_secs(1)));
        for output in futures::future::join_all(calls).await {
            output.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
        assert_eq!(executor.available_permits(), 2);
    }

    #[tokio::test]
    async fn close_rejects_new_calls() {
        let executor = ConcurrencyExecutor::default();
        executor.close();

        let failure = executor
            .run(sleeper("late", Duration::ZERO), Arguments::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(failure.code(), error_codes::EXECUTOR_CLOSED);
    }

    #[tokio::test]
    async fn abandoned_call_releases_its_permit() {
        let executor = ConcurrencyExecutor::new(ExecutorConfig::new(NonZeroUsize::new(1).unwrap()));
        let stall = sleeper("stall", Duration::from_secs(3600));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            executor.run(stall.clone(), Arguments::new(), Duration::from_millis(50)),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(executor.available_permits(), 1);

        let fast = tokio::time::timeout(
            Duration::from_secs(2),
            executor.run(sleeper("fast", Duration::ZERO), Arguments::new(), Duration::from_secs(1)),
        )
        .await
        .unwrap();
        assert_eq!(fast.unwrap(), Value::from("done"));
    }

    #[tokio::test]
    async fn timed_out_call_returns_its_permit() {
        let executor = ConcurrencyExecutor::new(ExecutorConfig::new(NonZeroUsize::new(1).unwrap()));
        let failure = executor
            .run(sleeper("stall", Duration::from_secs(3600)), Arguments::new(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(failure.code(), error_codes::TIMEOUT);
        assert_eq!(executor.available_permits(), 1);
    }
}
