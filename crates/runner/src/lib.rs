//! Runs long-lived service processes until shutdown, then executes closers.
//!
//! Processes share one cancellation token. The token is cancelled on
//! SIGINT/SIGTERM, when any process fails, or when the caller cancels it.
//! Closers then run concurrently under a timeout, whatever the outcome.
//!
//! ```no_run
//! use trackline_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_app_process("ticker", |ctx| async move {
//!             while !ctx.is_cancelled() {
//!                 tokio::time::sleep(Duration::from_secs(1)).await;
//!             }
//!             Ok(())
//!         })
//!         .with_closer("flush", || async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run_and_exit()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub type BoxedTask = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A long-running process. Receives the shared cancellation token.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedTask + Send>;

/// Cleanup run after every process has stopped
pub type Closer = Box<dyn FnOnce() -> BoxedTask + Send>;

pub struct Runner {
    app_processes: Vec<(String, AppProcess)>,
    closers: Vec<(String, Closer)>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// A runner with no processes and a 10 second closer timeout
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Add a process. If it returns an error every other process is cancelled.
    pub fn with_app_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.app_processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Add a process that is already boxed, as produced by service modules
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.app_processes.push((name.into(), process));
        self
    }

    /// Add a closer. All closers run even when some of them fail.
    pub fn with_closer<F, Fut>(mut self, name: impl Into<String>, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers
            .push((name.into(), Box::new(|| Box::pin(closer()))));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally owned token, so callers can trigger shutdown
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run until shutdown and return the process exit code:
    /// 0 on a clean stop, 1 when a process failed or panicked.
    pub async fn run(self) -> i32 {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.app_processes {
            let process_token = token.clone();
            tracing::info!(process = %name, "starting app process");
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        spawn_signal_handlers(token.clone());

        let mut failed = false;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "app process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        tracing::error!(
                            process = %name,
                            error = %format!("{:#}", err),
                            "app process failed"
                        );
                        failed = true;
                        token.cancel();
                    } else {
                        tracing::warn!(
                            process = %name,
                            error = %format!("{:#}", err),
                            "app process failed during shutdown"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "app process panicked");
                    failed = true;
                    token.cancel();
                }
            }
        }

        run_closers(self.closers, self.closer_timeout).await;

        if failed {
            tracing::error!("application exiting with error");
            1
        } else {
            tracing::info!("application exiting normally");
            0
        }
    }

    /// Run until shutdown, then exit the process with the resulting code
    pub async fn run_and_exit(self) {
        let code = self.run().await;
        std::process::exit(code);
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received SIGINT");
                ctrl_c_token.cancel();
            }
            Err(err) => tracing::error!(error = %err, "failed to listen for SIGINT"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("received SIGTERM");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to listen for SIGTERM"),
        }
    });
}

async fn run_closers(closers: Vec<(String, Closer)>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    tracing::info!(timeout_ms = timeout.as_millis() as u64, "running closers");

    let mut closer_set = JoinSet::new();
    for (name, closer) in closers {
        closer_set.spawn(async move { (name, closer().await) });
    }

    let drain = async {
        while let Some(joined) = closer_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => tracing::debug!(closer = %name, "closer completed"),
                Ok((name, Err(err))) => {
                    tracing::error!(closer = %name, error = %format!("{:#}", err), "closer failed")
                }
                Err(err) => tracing::error!(error = %err, "closer panicked"),
            }
        }
    };

    if tokio::time::timeout(timeout, drain).await.is_err() {
        tracing::error!(timeout_ms = timeout.as_millis() as u64, "closers timed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cancelled_runner_stops_processes_and_runs_closers() {
        let closer_called = Arc::new(AtomicBool::new(false));
        let flag = closer_called.clone();
        let token = CancellationToken::new();

        let runner = Runner::new()
            .with_app_process("waiter", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer("flag", move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .with_cancellation_token(token.clone());

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let code = runner.run().await;

        assert_eq!(code, 0);
        assert!(closer_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_process_cancels_siblings_and_exits_with_error() {
        let sibling_stopped = Arc::new(AtomicBool::new(false));
        let stopped = sibling_stopped.clone();

        let code = Runner::new()
            .with_app_process("failing", |_| async { Err(anyhow::anyhow!("boom")) })
            .with_app_process("sibling", move |ctx| async move {
                ctx.cancelled().await;
                stopped.store(true, Ordering::SeqCst);
                Ok(())
            })
            .run()
            .await;

        assert_eq!(code, 1);
        assert!(sibling_stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_every_closer_runs_even_when_one_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let first = calls.clone();
        let second = calls.clone();

        let code = Runner::new()
            .with_closer("failing", move || async move {
                first.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("close failed"))
            })
            .with_closer("ok", move || async move {
                second.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .run()
            .await;

        assert_eq!(code, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_closers_are_abandoned_after_timeout() {
        let started = tokio::time::Instant::now();

        let code = Runner::new()
            .with_closer("slow", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .with_closer_timeout(Duration::from_secs(2))
            .run()
            .await;

        assert_eq!(code, 0);
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
