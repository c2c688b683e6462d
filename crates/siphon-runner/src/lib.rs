//! Concurrent runner for the service's long-running processes.
//!
//! Registered processes run until one fails or a shutdown signal arrives;
//! then every process is cancelled through a shared token, closers run with
//! a timeout, and `run` returns the first failure so the binary owns the
//! exit code. In-flight work is given the chance to finish: cancellation is
//! cooperative, delivered only at the token.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;
type Process = Box<dyn FnOnce(CancellationToken) -> ProcessFuture + Send>;
type Closer = Box<dyn FnOnce() -> ProcessFuture + Send>;

pub struct Runner {
    processes: Vec<(&'static str, Process)>,
    closers: Vec<(&'static str, Closer)>,
    closer_timeout: Duration,
    token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            token: CancellationToken::new(),
        }
    }

    /// Register a named long-running process.
    ///
    /// The name appears in logs when the process stops or fails.
    pub fn with_process<F, Fut>(mut self, name: &'static str, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.processes
            .push((name, Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Register a named cleanup step, executed after every process stopped.
    pub fn with_closer<F, Fut>(mut self, name: &'static str, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push((name, Box::new(|| Box::pin(closer()))));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an external token, e.g. to drive shutdown from a test.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Run all processes until completion, failure, or a shutdown signal.
    ///
    /// Returns the first process error, if any; signal-initiated shutdown
    /// returns `Ok`.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let token = self.token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        spawn_signal_listeners(token.clone());

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    debug!(process = name, "process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!("process {} failed: {:#}", name, err);
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!(error = %err, "process panicked");
                    if !token.is_cancelled() {
                        first_error = Some(anyhow::anyhow!("process panicked: {}", err));
                        token.cancel();
                    }
                }
            }
        }

        run_closers(self.closers, self.closer_timeout).await;

        first_error.map_or(Ok(()), Err)
    }
}

fn spawn_signal_listeners(token: CancellationToken) {
    let interrupt_token = token.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install interrupt handler");
            return;
        }
        info!("received interrupt signal, shutting down");
        interrupt_token.cancel();
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
        info!("received SIGTERM, shutting down");
        token.cancel();
    });
}

async fn run_closers(closers: Vec<(&'static str, Closer)>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    let all = async {
        for (name, closer) in closers {
            match closer().await {
                Ok(()) => debug!(closer = name, "closer completed"),
                Err(err) => error!("closer {} failed: {:#}", name, err),
            }
        }
    };

    if tokio::time::timeout(timeout, all).await.is_err() {
        error!(timeout_secs = timeout.as_secs(), "closers timed out");
    }
}
