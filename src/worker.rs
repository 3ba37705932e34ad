//! The render worker: one dedicated thread that runs every render job.
//!
//! Jobs are closures producing futures. They are sent to the worker thread,
//! run there one at a time on a current-thread Tokio runtime, and their
//! results come back through a [`oneshot`] channel. A job that itself asks
//! the worker for more work runs that work inline.
//!
//! Each queued job runs as its own task, so a job that panics is reported
//! as [`RenderError::WorkerPanicked`] and the worker keeps serving.
//!
//! Dropping the caller's future does not cancel a job; it finishes on the
//! worker and its result is discarded.

use std::any::Any;
use std::cell::Cell;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::thread;

use tokio::sync::{mpsc, oneshot};

use crate::error::RenderError;

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()>>> + Send>;

thread_local! {
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// A single-threaded executor for render work.
pub struct RenderWorker {
    sender: Option<mpsc::UnboundedSender<Job>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RenderWorker {
    /// Start the worker thread.
    pub fn spawn() -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let thread = thread::Builder::new()
            .name("render-worker".to_string())
            .spawn(move || {
                ON_WORKER.with(|flag| flag.set(true));
                runtime.block_on(async move {
                    while let Some(job) = receiver.recv().await {
                        job().await;
                    }
                });
                log::debug!("render worker stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// True on the worker thread.
    pub fn is_worker_thread() -> bool {
        ON_WORKER.with(Cell::get)
    }

    /// Run `job` on the worker and wait for its result.
    pub async fn run<F, Fut, T>(&self, job: F) -> Result<T, RenderError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if Self::is_worker_thread() {
            return Ok(job().await);
        }

        let sender = self.sender.as_ref().ok_or(RenderError::WorkerStopped)?;
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                // The loop awaits the task, so jobs still run one at a time.
                let outcome = tokio::spawn(async move { job().await }).await.map_err(|e| {
                    let message = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        e.to_string()
                    };
                    log::error!("render job panicked: {message}");
                    RenderError::WorkerPanicked(message)
                });
                let _ = tx.send(outcome);
            })
        });
        sender.send(job).map_err(|_| RenderError::WorkerStopped)?;
        rx.await.map_err(|_| RenderError::WorkerStopped)?
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once queued jobs finish.
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                log::warn!("render worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn jobs_run_on_the_worker_thread() {
        let worker = RenderWorker::spawn().unwrap();
        let caller = thread::current().id();
        let (on_worker, id) = worker
            .run(|| async { (RenderWorker::is_worker_thread(), thread::current().id()) })
            .await
            .unwrap();
        assert!(on_worker);
        assert_ne!(id, caller);
        assert!(!RenderWorker::is_worker_thread());
    }

    #[tokio::test]
    async fn jobs_run_one_at_a_time_on_one_thread() {
        let worker = RenderWorker::spawn().unwrap();
        let first = worker.run(|| async { thread::current().id() }).await.unwrap();
        let second = worker.run(|| async { thread::current().id() }).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn panicking_job_leaves_the_worker_running() {
        let worker = RenderWorker::spawn().unwrap();
        let err = worker.run(|| async { panic!("boom") }).await.map(|()| ()).unwrap_err();
        match err {
            RenderError::WorkerPanicked(message) => assert_eq!(message, "boom"),
            other => panic!("Expected WorkerPanicked, got {:?}", other),
        }
        assert_eq!(worker.run(|| async { 2 }).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn nested_jobs_run_inline() {
        let worker = Arc::new(RenderWorker::spawn().unwrap());
        let inner = Arc::clone(&worker);
        let value = worker
            .run(move || async move {
                let outer_thread = thread::current().id();
                let inner_thread = inner.run(|| async { thread::current().id() }).await.unwrap();
                outer_thread == inner_thread
            })
            .await
            .unwrap();
        assert!(value);
    }
}
