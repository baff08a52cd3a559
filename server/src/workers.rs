//! Bounded worker pool executing dispatcher tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Idle time after which a beyond-core worker retires.
const KEEP_ALIVE: Duration = Duration::from_secs(10 * 60);

/// A bounded task queue with a core set of resident workers.
///
/// Core workers are spawned eagerly and live until shutdown. When the
/// queue is full and fewer than `max` workers are live, an extra worker is
/// spawned; it retires after [`KEEP_ALIVE`] without work.
pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    rx: Receiver<Job>,
    live: Arc<AtomicUsize>,
    max: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool with `core` resident workers, growing up to `max`,
    /// over a queue of `queue_depth` pending tasks.
    pub fn new(core: usize, max: usize, queue_depth: usize) -> Self {
        let core = core.max(1);
        let max = max.max(core);
        let (tx, rx) = bounded::<Job>(queue_depth);
        let pool = Self {
            jobs: Some(tx),
            rx,
            live: Arc::new(AtomicUsize::new(0)),
            max,
            handles: Mutex::new(Vec::with_capacity(max)),
        };
        for id in 0..core {
            pool.live.fetch_add(1, Ordering::AcqRel);
            pool.spawn_worker(id, true);
        }
        pool
    }

    /// Spawn a worker thread. The caller has already reserved its slot in
    /// `live`; the worker releases the slot when it exits.
    fn spawn_worker(&self, id: usize, resident: bool) {
        let rx = self.rx.clone();
        let live = self.live.clone();
        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || {
                if resident {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                } else {
                    loop {
                        match rx.recv_timeout(KEEP_ALIVE) {
                            Ok(job) => job(),
                            Err(RecvTimeoutError::Timeout)
                            | Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                }
                live.fetch_sub(1, Ordering::AcqRel);
            })
            .expect("failed to spawn worker thread");
        self.handles.lock().push(handle);
    }

    /// Number of live worker threads.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Queue a task, growing the pool when the queue is full and capacity
    /// remains. Blocks once the queue is full and the pool is at maximum.
    pub fn execute<F: FnOnce() + Send + 'static>(&self, job: F) {
        let Some(jobs) = &self.jobs else { return };
        match jobs.try_send(Box::new(job)) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                // Reserve a slot and check the bound in one atomic step;
                // concurrent submitters must not push the pool past `max`.
                let max = self.max;
                let reserved = self
                    .live
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                        (live < max).then_some(live + 1)
                    });
                if let Ok(live) = reserved {
                    self.spawn_worker(live, false);
                }
                let _ = jobs.send(job);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Close the queue and wait for workers to finish, up to `timeout`.
    ///
    /// Pending tasks are still drained; workers exit once the queue is
    /// empty and disconnected.
    pub fn shutdown(mut self, timeout: Duration) {
        drop(self.jobs.take());
        let deadline = Instant::now() + timeout;
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::warn!("worker did not stop within shutdown timeout");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executes_queued_tasks() {
        let pool = WorkerPool::new(2, 4, 16);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.shutdown(Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_core_floor_is_one() {
        let pool = WorkerPool::new(0, 0, 4);
        assert_eq!(pool.live_workers(), 1);
        pool.shutdown(Duration::from_secs(5));
    }

    #[test]
    fn test_grows_past_core_under_load() {
        // Single core worker, depth-1 queue: parking the worker and
        // filling the queue forces a spawn on the next submit.
        let pool = WorkerPool::new(1, 4, 1);
        let gate = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let gate = gate.clone();
            pool.execute(move || {
                while gate.load(Ordering::SeqCst) == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            });
        }
        assert!(pool.live_workers() > 1);
        assert!(pool.live_workers() <= 4);

        gate.store(1, Ordering::SeqCst);
        pool.shutdown(Duration::from_secs(5));
    }
}
