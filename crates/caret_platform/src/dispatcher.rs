//! Execution contexts and cross-thread task dispatch
//!
//! Two independent contexts exist at runtime: the logic thread (a
//! single-threaded cooperative scheduler owning all models) and the host UI
//! thread (owning all native widget handles). Work crosses between them as
//! fire-and-forget [`Task`]s. Neither side may block on the other except
//! through [`BlockingDispatcher::pump_until`], which keeps draining the
//! caller's own queue with a bounded receive timeout instead of sleeping
//! blind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crate::error::{PlatformError, Result};

/// A unit of work posted to an execution context
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Bounded interval between predicate re-checks while pumping
const PUMP_INTERVAL: Duration = Duration::from_millis(20);

/// Fire-and-forget task dispatch onto one execution context
pub trait Dispatcher: Send + Sync {
    /// Enqueue a task; returns immediately
    fn post(&self, task: Task);

    /// Whether the calling thread is this context's thread
    fn is_current(&self) -> bool;
}

/// A dispatcher whose own thread can wait for a condition without starving
/// its queue
pub trait BlockingDispatcher: Dispatcher {
    /// Run queued tasks until `done` returns true
    ///
    /// Must be called from this context's own thread. Between tasks the
    /// predicate is re-checked at least every few tens of milliseconds; the
    /// wait is unbounded in total (completion is user-driven) but never an
    /// indefinite single block.
    fn pump_until(&self, done: &(dyn Fn() -> bool + Sync));
}

struct SchedulerShared {
    queue: Mutex<Receiver<Task>>,
    running: AtomicBool,
    thread_id: OnceLock<ThreadId>,
}

/// A single-threaded cooperative scheduler backed by one named OS thread
///
/// Used for the logic thread, and by tests to stand in for the host UI
/// thread. Tasks run strictly in post order.
pub struct SingleThreadScheduler {
    tx: Sender<Task>,
    shared: Arc<SchedulerShared>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl SingleThreadScheduler {
    /// Spawn the scheduler thread
    pub fn new(name: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let shared = Arc::new(SchedulerShared {
            queue: Mutex::new(rx),
            running: AtomicBool::new(true),
            thread_id: OnceLock::new(),
        });

        let (ready_tx, ready_rx) = mpsc::channel();
        let loop_shared = Arc::clone(&shared);
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _ = loop_shared.thread_id.set(thread::current().id());
                let _ = ready_tx.send(());
                run_loop(&loop_shared);
            })
            .map_err(|e| PlatformError::SchedulerSpawn(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| PlatformError::SchedulerSpawn("thread exited during startup".into()))?;

        Ok(Self {
            tx,
            shared,
            join: Mutex::new(Some(join)),
        })
    }

    /// Stop the scheduler thread after the current task and join it
    ///
    /// Tasks still queued are dropped. No-op when called twice.
    pub fn shutdown(&self) {
        self.shared.running.store(false, Ordering::Release);
        // Wake the loop in case the queue is idle.
        let _ = self.tx.send(Box::new(|| {}));
        if let Some(join) = self.join.lock().unwrap().take() {
            if !self.is_current() {
                let _ = join.join();
            }
        }
    }
}

fn run_loop(shared: &SchedulerShared) {
    while shared.running.load(Ordering::Acquire) {
        let next = shared.queue.lock().unwrap().recv_timeout(PUMP_INTERVAL);
        match next {
            Ok(task) => task(),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

impl Dispatcher for SingleThreadScheduler {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::debug!("task posted to a stopped scheduler, dropped");
        }
    }

    fn is_current(&self) -> bool {
        self.shared.thread_id.get() == Some(&thread::current().id())
    }
}

impl BlockingDispatcher for SingleThreadScheduler {
    fn pump_until(&self, done: &(dyn Fn() -> bool + Sync)) {
        assert!(
            self.is_current(),
            "pump_until must run on the scheduler's own thread"
        );
        while !done() {
            let next = self.shared.queue.lock().unwrap().recv_timeout(PUMP_INTERVAL);
            match next {
                Ok(task) => task(),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("scheduler queue disconnected while pumping");
                    break;
                }
            }
        }
    }
}

impl Drop for SingleThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_tasks_run_in_post_order() {
        let scheduler = SingleThreadScheduler::new("test-order").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        for i in 0..5 {
            let log = Arc::clone(&log);
            scheduler.post(Box::new(move || log.lock().unwrap().push(i)));
        }
        scheduler.post(Box::new(move || {
            let _ = tx.send(());
        }));

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_is_current_only_on_scheduler_thread() {
        let scheduler = Arc::new(SingleThreadScheduler::new("test-current").unwrap());
        assert!(!scheduler.is_current());

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&scheduler);
        scheduler.post(Box::new(move || {
            let _ = tx.send(inner.is_current());
        }));
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_pump_until_drains_tasks_while_waiting() {
        let scheduler = Arc::new(SingleThreadScheduler::new("test-pump").unwrap());
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let pumping = Arc::clone(&scheduler);
        let seen = Arc::clone(&counter);
        scheduler.post(Box::new(move || {
            let watched = Arc::clone(&seen);
            pumping.pump_until(&move || watched.load(Ordering::Acquire) >= 3);
            let _ = tx.send(seen.load(Ordering::Acquire));
        }));

        // Posted after the pump started; only a live pump can run them.
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            scheduler.post(Box::new(move || {
                counter.fetch_add(1, Ordering::AcqRel);
            }));
        }

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 3);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let scheduler = SingleThreadScheduler::new("test-shutdown").unwrap();
        scheduler.shutdown();
        scheduler.shutdown();
        // Posting after shutdown must not panic.
        scheduler.post(Box::new(|| {}));
    }
}
