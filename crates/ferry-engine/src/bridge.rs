//! Blocking facade over one long-lived single-threaded scheduler.
//!
//! # Design
//! - One worker thread owns a current-thread runtime and the shared [`Session`].
//! - Callers enqueue boxed jobs over an unbounded channel and block on a std channel
//!   for the reply, so any thread may call in, including `spawn_blocking` threads.
//! - The only refused caller is the worker itself, which would wait on its own reply.
//! - Jobs run concurrently on the worker (a `JoinSet` interleaves them at I/O points),
//!   so a slow call never holds up the others.
//! - Dropping the bridge closes the queue, drains in-flight jobs, and joins the thread.

use std::fmt;
use std::sync::mpsc as reply_channel;
use std::thread::{self, JoinHandle, ThreadId};

use ferry_core::{RemoteError, RemoteResult};
use ferry_telemetry::Metrics;
use futures_util::future::BoxFuture;
use tokio::runtime::Builder;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::command::{Command, execute};
use crate::session::Session;

type Job = Box<dyn FnOnce(Session) -> BoxFuture<'static, ()> + Send>;

/// Thread-safe entry point for running async work from synchronous callers.
pub struct ExecutionBridge {
    name: String,
    sender: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl ExecutionBridge {
    /// Start the worker thread and its scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::BridgeStartup`] if the runtime or the thread cannot be
    /// created.
    pub fn start(name: impl Into<String>, session: Session) -> RemoteResult<Self> {
        let name = name.into();
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| RemoteError::BridgeStartup {
                detail: err.to_string(),
            })?;
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let worker_name = name.clone();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || runtime.block_on(serve(worker_name, session, receiver)))
            .map_err(|err| RemoteError::BridgeStartup {
                detail: err.to_string(),
            })?;
        debug!(bridge = %name, "execution bridge started");
        Ok(Self {
            name,
            sender: Some(sender),
            worker_id: worker.thread().id(),
            worker: Some(worker),
        })
    }

    /// Run `work` on the scheduler and block until it finishes.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::BlockingInAsyncContext`] when called from a job running on
    /// this bridge, bridge failures when the worker is gone, and otherwise the job's
    /// result.
    pub fn call<T, F>(&self, work: F) -> RemoteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Session) -> BoxFuture<'static, RemoteResult<T>> + Send + 'static,
    {
        if thread::current().id() == self.worker_id {
            return Err(RemoteError::BlockingInAsyncContext);
        }
        let sender = self.sender.as_ref().ok_or(RemoteError::BridgeClosed)?;
        let (reply, response) = reply_channel::sync_channel(1);
        let job: Job = Box::new(move |session: Session| {
            Box::pin(async move {
                let result = {
                    let _in_flight = InFlight::enter(session.metrics().cloned());
                    work(session).await
                };
                if reply.send(result).is_err() {
                    debug!("execution bridge caller went away before the reply");
                }
            })
        });
        sender.send(job).map_err(|_| RemoteError::BridgeClosed)?;
        response.recv().map_err(|_| RemoteError::BridgeJobLost)?
    }

    /// Execute `command` on the scheduler and block for its output.
    ///
    /// # Errors
    ///
    /// Returns the command's error or a bridge failure.
    pub fn execute<C>(&self, command: C) -> RemoteResult<C::Output>
    where
        C: Command + 'static,
    {
        self.call(move |session| Box::pin(async move { execute(command, &session).await }))
    }

    /// Thread name of the worker.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Counts one job in the in-flight gauge until dropped, panics included.
struct InFlight(Option<Metrics>);

impl InFlight {
    fn enter(metrics: Option<Metrics>) -> Self {
        if let Some(metrics) = &metrics {
            metrics.add_bridge_jobs(1);
        }
        Self(metrics)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(metrics) = &self.0 {
            metrics.add_bridge_jobs(-1);
        }
    }
}

async fn serve(name: String, session: Session, mut receiver: mpsc::UnboundedReceiver<Job>) {
    let mut jobs = JoinSet::new();
    loop {
        tokio::select! {
            job = receiver.recv() => match job {
                Some(job) => {
                    jobs.spawn(job(session.clone()));
                }
                None => break,
            },
            Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                if let Err(err) = joined {
                    warn!(bridge = %name, error = %err, "execution bridge job aborted");
                }
            }
        }
    }
    while let Some(joined) = jobs.join_next().await {
        if let Err(err) = joined {
            warn!(bridge = %name, error = %err, "execution bridge job aborted during shutdown");
        }
    }
    debug!(bridge = %name, "execution bridge stopped");
}

impl Drop for ExecutionBridge {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!(bridge = %self.name, "execution bridge worker panicked");
        }
    }
}

impl fmt::Debug for ExecutionBridge {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ExecutionBridge")
            .field("name", &self.name)
            .field("open", &self.sender.is_some())
            .finish_non_exhaustive()
    }
}
