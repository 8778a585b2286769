//! Bounded priority generation queue
//!
//! An injectable service, not process-global state: capacity, run width,
//! and the queue-level timeout are constructor parameters so tests can
//! instantiate isolated queues. Admission is checked up front (reject,
//! never queue unboundedly); waiting tasks run highest priority first,
//! FIFO within a priority; the timeout covers waiting plus running.

use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Errors raised by queue admission and execution
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity; the task was never admitted
    #[error("queue is at capacity")]
    Full,

    /// The task waited or ran past the queue timeout
    #[error("queued task timed out")]
    TimedOut,
}

/// Queue limits
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of waiting tasks
    pub max_size: usize,
    /// How many tasks may run at once
    pub width: usize,
    /// Limit on one task's wait plus run time
    pub timeout: Duration,
}

#[derive(Debug, PartialEq, Eq)]
struct Waiter {
    priority: u8,
    seq: u64,
}

impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // max-heap: highest priority first, then earliest arrival
        self.priority
            .cmp(&other.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct State {
    running: usize,
    waiting: BinaryHeap<Waiter>,
}

/// Gives a cancelled task's heap entry or run slot back on drop
struct AbandonGuard<'a> {
    queue: &'a GenerationQueue,
    seq: u64,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.queue.abandon(self.seq);
        }
    }
}

/// Bounded-concurrency priority queue for generation tasks
pub struct GenerationQueue {
    config: QueueConfig,
    state: Mutex<State>,
    notify: Notify,
    seq: AtomicU64,
}

impl GenerationQueue {
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                running: 0,
                waiting: BinaryHeap::new(),
            }),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Number of tasks currently waiting for a slot
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().waiting.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether admission would be refused right now
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.config.max_size
    }

    /// Run a task under the queue's limits
    ///
    /// Higher `priority` values dequeue first. Returns [`QueueError::Full`]
    /// without queueing when at capacity, [`QueueError::TimedOut`] when the
    /// wait plus run exceeds the configured timeout (a running task is
    /// dropped at its next suspension point).
    pub async fn run<F, T>(&self, priority: u8, task: F) -> Result<T, QueueError>
    where
        F: Future<Output = T>,
    {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.state.lock();
            if state.waiting.len() >= self.config.max_size {
                return Err(QueueError::Full);
            }
            state.waiting.push(Waiter { priority, seq });
        }
        // a caller dropping this future mid-wait must not strand its heap
        // entry: an unpopped head waiter blocks every task behind it
        let mut guard = AbandonGuard {
            queue: self,
            seq,
            armed: true,
        };

        let outcome = tokio::time::timeout(self.config.timeout, async {
            self.acquire(seq).await;
            task.await
        })
        .await;

        guard.armed = false;
        match outcome {
            Ok(value) => {
                self.release();
                Ok(value)
            }
            Err(_) => {
                self.abandon(seq);
                Err(QueueError::TimedOut)
            }
        }
    }

    /// Wait until this waiter is at the head and a run slot is free
    async fn acquire(&self, seq: u64) {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                let at_head = state.waiting.peek().is_some_and(|w| w.seq == seq);
                if at_head && state.running < self.config.width {
                    state.waiting.pop();
                    state.running += 1;
                    drop(state);
                    // another slot may be free for the next waiter
                    self.notify.notify_waiters();
                    return;
                }
            }
            notified.await;
        }
    }

    fn release(&self) {
        {
            let mut state = self.state.lock();
            state.running = state.running.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Remove a timed-out task, whichever side of acquisition it was on
    fn abandon(&self, seq: u64) {
        {
            let mut state = self.state.lock();
            let before = state.waiting.len();
            let remaining: BinaryHeap<Waiter> = state
                .waiting
                .drain()
                .filter(|w| w.seq != seq)
                .collect();
            state.waiting = remaining;
            if state.waiting.len() == before {
                // it had already started running
                state.running = state.running.saturating_sub(1);
            }
        }
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    fn queue(max_size: usize, width: usize, timeout: Duration) -> Arc<GenerationQueue> {
        Arc::new(GenerationQueue::new(QueueConfig {
            max_size,
            width,
            timeout,
        }))
    }

    #[tokio::test]
    async fn runs_a_task_and_returns_its_output() {
        let queue = queue(4, 1, Duration::from_secs(5));
        let out = queue.run(0, async { 41 + 1 }).await.unwrap();
        assert_eq!(out, 42);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn rejects_when_at_capacity() {
        let queue = queue(1, 1, Duration::from_secs(5));
        let (block_tx, block_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let runner = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .run(0, async {
                        let _ = started_tx.send(());
                        let _ = block_rx.await;
                    })
                    .await
                    .unwrap();
            })
        };
        started_rx.await.unwrap();

        // occupy the single waiting slot
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.run(0, async {}).await })
        };
        while !queue.is_full() {
            tokio::task::yield_now().await;
        }

        let err = queue.run(0, async {}).await.unwrap_err();
        assert_eq!(err, QueueError::Full);

        block_tx.send(()).unwrap();
        runner.await.unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn higher_priority_runs_first() {
        let queue = queue(8, 1, Duration::from_secs(5));
        let order = Arc::new(Mutex::new(Vec::new()));
        let (block_tx, block_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let blocker = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .run(2, async {
                        let _ = started_tx.send(());
                        let _ = block_rx.await;
                    })
                    .await
                    .unwrap();
            })
        };
        started_rx.await.unwrap();

        let mut tasks = Vec::new();
        for priority in [0u8, 1, 2] {
            let task_queue = queue.clone();
            let order = order.clone();
            tasks.push(tokio::spawn(async move {
                task_queue
                    .run(priority, async move {
                        order.lock().push(priority);
                    })
                    .await
                    .unwrap();
            }));
            // make arrival order deterministic
            while queue.len() < usize::from(priority) + 1 {
                tokio::task::yield_now().await;
            }
        }

        block_tx.send(()).unwrap();
        blocker.await.unwrap();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*order.lock(), [2, 1, 0]);
    }

    #[tokio::test]
    async fn fifo_within_equal_priority() {
        let queue = queue(8, 1, Duration::from_secs(5));
        let order = Arc::new(Mutex::new(Vec::new()));
        let (block_tx, block_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let blocker = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .run(0, async {
                        let _ = started_tx.send(());
                        let _ = block_rx.await;
                    })
                    .await
                    .unwrap();
            })
        };
        started_rx.await.unwrap();

        let mut tasks = Vec::new();
        for label in 0..3u8 {
            let task_queue = queue.clone();
            let order = order.clone();
            tasks.push(tokio::spawn(async move {
                task_queue
                    .run(1, async move {
                        order.lock().push(label);
                    })
                    .await
                    .unwrap();
            }));
            while queue.len() < usize::from(label) + 1 {
                tokio::task::yield_now().await;
            }
        }

        block_tx.send(()).unwrap();
        blocker.await.unwrap();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*order.lock(), [0, 1, 2]);
    }

    #[tokio::test]
    async fn cancelled_waiter_gives_back_its_place() {
        let queue = queue(8, 1, Duration::from_secs(1));
        let (block_tx, block_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let blocker = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .run(0, async {
                        let _ = started_tx.send(());
                        let _ = block_rx.await;
                    })
                    .await
                    .unwrap();
            })
        };
        started_rx.await.unwrap();

        let cancelled = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.run(0, async {}).await })
        };
        while queue.is_empty() {
            tokio::task::yield_now().await;
        }
        cancelled.abort();
        let _ = cancelled.await;

        block_tx.send(()).unwrap();
        blocker.await.unwrap();

        // the cancelled waiter left no entry at the head; new work runs
        let out = queue.run(0, async { 7 }).await.unwrap();
        assert_eq!(out, 7);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn task_that_never_acquires_times_out() {
        // width 0 means no slot ever frees up
        let queue = queue(4, 0, Duration::from_millis(100));
        let err = queue.run(0, async {}).await.unwrap_err();
        assert_eq!(err, QueueError::TimedOut);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn overlong_running_task_times_out_and_frees_the_slot() {
        let queue = queue(4, 1, Duration::from_millis(100));
        let err = queue
            .run(0, tokio::time::sleep(Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert_eq!(err, QueueError::TimedOut);

        // the slot was reclaimed; new work still runs
        let out = queue.run(0, async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }
}
