//! Background thread that runs every camera callback.
//!
//! Device, session and image callbacks are posted as tasks onto one ordered
//! queue and executed on one dedicated thread, so callbacks never run
//! concurrently with each other and never on the caller's thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle, ThreadId};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Messages sent to the worker thread.
enum Job {
    Run(Task),
    Quit,
}

/// Cloneable handle for posting tasks onto a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: Sender<Job>,
    thread_id: ThreadId,
}

impl WorkerHandle {
    /// Queue `task` behind everything already posted.
    ///
    /// Returns `false` (dropping the task) once the worker has quit.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Job::Run(Box::new(task))).is_ok()
    }

    /// Whether the calling thread is this worker's thread.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

/// Owner of the worker thread.
///
/// `start()` spawns the thread (no-op while running). `stop()` queues a quit
/// marker, waits for the tasks queued before it to run, and joins the thread.
/// Tasks posted after the quit marker are dropped without running.
pub struct BackgroundWorker {
    name: String,
    handle: Option<WorkerHandle>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: None,
            thread: None,
        }
    }

    /// Spawn the worker thread if it is not already running.
    pub fn start(&mut self) -> std::io::Result<WorkerHandle> {
        if let Some(handle) = self.handle.as_ref().filter(|_| self.is_running()) {
            return Ok(handle.clone());
        }

        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_worker(rx))?;
        let handle = WorkerHandle {
            tx,
            thread_id: thread.thread().id(),
        };
        log::debug!("Started worker thread '{}'", self.name);

        self.thread = Some(thread);
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Handle of the running worker, if any.
    pub fn handle(&self) -> Option<WorkerHandle> {
        self.handle.clone()
    }

    /// Check if the worker thread is currently running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Drain queued tasks and join the thread.
    ///
    /// Called from the worker thread itself this only queues the quit marker,
    /// since a thread cannot join itself.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = handle.tx.send(Job::Quit);

        let Some(thread) = self.thread.take() else {
            return;
        };
        if handle.is_worker_thread() {
            log::warn!(
                "Worker '{}' stopped from its own thread, not joining",
                self.name
            );
            return;
        }
        if thread.join().is_err() {
            log::error!("Worker thread '{}' panicked", self.name);
        }
        log::debug!("Stopped worker thread '{}'", self.name);
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(rx: Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Run(task) => {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    log::error!("Camera worker task panicked, continuing");
                }
            }
            Job::Quit => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_tasks_run_in_order_on_worker_thread() {
        let mut worker = BackgroundWorker::new("test-worker");
        let handle = worker.start().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let log = Arc::clone(&log);
            let h = handle.clone();
            assert!(handle.post(move || {
                assert!(h.is_worker_thread());
                log.lock().unwrap().push(i);
            }));
        }
        worker.stop();

        assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());
        assert!(!handle.is_worker_thread());
    }

    #[test]
    fn test_stop_drains_pending_tasks() {
        let mut worker = BackgroundWorker::new("drain-worker");
        let handle = worker.start().unwrap();
        let done = Arc::new(Mutex::new(false));

        let flag = Arc::clone(&done);
        handle.post(move || {
            std::thread::sleep(Duration::from_millis(50));
            *flag.lock().unwrap() = true;
        });
        worker.stop();

        assert!(*done.lock().unwrap());
        assert!(!worker.is_running());
    }

    #[test]
    fn test_post_after_stop_is_rejected() {
        let mut worker = BackgroundWorker::new("stopped-worker");
        let handle = worker.start().unwrap();
        worker.stop();
        assert!(!handle.post(|| {}));
        assert!(worker.handle().is_none());
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let mut worker = BackgroundWorker::new("panic-worker");
        let handle = worker.start().unwrap();
        let ran = Arc::new(Mutex::new(false));

        handle.post(|| panic!("boom"));
        let flag = Arc::clone(&ran);
        handle.post(move || *flag.lock().unwrap() = true);
        worker.stop();

        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn test_restart_after_stop() {
        let mut worker = BackgroundWorker::new("restart-worker");
        let first = worker.start().unwrap();
        worker.stop();
        let second = worker.start().unwrap();
        assert!(!first.post(|| {}));
        assert!(second.post(|| {}));
        worker.stop();
    }
}
