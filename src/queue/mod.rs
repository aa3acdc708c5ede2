// Per-identity FIFO task queue with a global concurrency cap

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, warn};

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("task submitted without a queue identity")]
    MissingIdentity,
}

type Task = BoxFuture<'static, ()>;

/// Pending work for one identity. Removed from the map once drained and idle.
#[derive(Default)]
struct EntityQueue {
    tasks: VecDeque<Task>,
    flushing: bool,
}

struct Inner {
    queues: Mutex<HashMap<String, EntityQueue>>,
    semaphore: Arc<Semaphore>,
    task_timeout: Duration,
    /// Signalled every time an identity's queue is destroyed
    drained: Notify,
    runtime: Handle,
}

impl Inner {
    fn queues(&self) -> MutexGuard<'_, HashMap<String, EntityQueue>> {
        // tasks never run while this lock is held
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Operations for one identity run strictly in submission order; different
/// identities run in parallel up to the concurrency cap.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    /// Must be called from within a tokio runtime; workers are spawned on it.
    pub fn new(concurrency: usize, task_timeout: Duration) -> Self {
        Self::with_runtime(concurrency, task_timeout, Handle::current())
    }

    pub fn with_runtime(concurrency: usize, task_timeout: Duration, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: Mutex::new(HashMap::new()),
                semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
                task_timeout,
                drained: Notify::new(),
                runtime,
            }),
        }
    }

    /// Append a task to `identity`'s queue and start its worker if idle.
    ///
    /// An empty identity is logged and the task dropped.
    pub fn add_task<F>(&self, identity: &str, task: F) -> Result<(), QueueError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if identity.is_empty() {
            error!("Dropping task: no queue identity given");
            return Err(QueueError::MissingIdentity);
        }

        let start_worker = {
            let mut queues = self.inner.queues();
            let queue = queues.entry(identity.to_string()).or_default();
            queue.tasks.push_back(Box::pin(task));
            if queue.flushing {
                false
            } else {
                queue.flushing = true;
                true
            }
        };

        if start_worker {
            let inner = self.inner.clone();
            let identity = identity.to_string();
            self.inner
                .runtime
                .spawn(async move { process_queue(inner, identity).await });
        }
        Ok(())
    }

    /// Number of tasks waiting (not yet started) for `identity`
    pub fn pending(&self, identity: &str) -> usize {
        self.inner
            .queues()
            .get(identity)
            .map(|q| q.tasks.len())
            .unwrap_or(0)
    }

    /// True when `identity` has neither pending nor running tasks
    pub fn is_idle(&self, identity: &str) -> bool {
        !self.inner.queues().contains_key(identity)
    }

    pub fn active_queues(&self) -> usize {
        self.inner.queues().len()
    }

    /// Wait for every queue to drain. Returns false if `timeout` elapsed first.
    pub async fn flush_all_tasks(&self, timeout: Duration) -> bool {
        let inner = self.inner.clone();
        self.wait_until(timeout, move || inner.queues().is_empty())
            .await
            .inspect_err(|remaining| {
                warn!(
                    "Gave up flushing after {:?}: {} queue(s) still busy",
                    timeout, remaining
                )
            })
            .is_ok()
    }

    /// Wait for one identity's queue to drain. Returns false on timeout.
    pub async fn flush_all_tasks_for_queue(&self, identity: &str, timeout: Duration) -> bool {
        let inner = self.inner.clone();
        let key = identity.to_string();
        self.wait_until(timeout, move || !inner.queues().contains_key(&key))
            .await
            .inspect_err(|_| {
                warn!(
                    "Gave up flushing queue '{}' after {:?}",
                    identity, timeout
                )
            })
            .is_ok()
    }

    async fn wait_until<C>(&self, timeout: Duration, done: C) -> Result<(), usize>
    where
        C: Fn() -> bool,
    {
        let wait = async {
            loop {
                let notified = self.inner.drained.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if done() {
                    return;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => Ok(()),
            Err(_) => Err(self.active_queues()),
        }
    }
}

/// Worker loop for one identity: take a slot, run one task under the timeout,
/// release the slot, repeat until the queue is empty.
async fn process_queue(inner: Arc<Inner>, identity: String) {
    loop {
        let task = {
            let mut queues = inner.queues();
            let next = queues.get_mut(&identity).and_then(|q| q.tasks.pop_front());
            match next {
                Some(task) => task,
                None => {
                    queues.remove(&identity);
                    drop(queues);
                    inner.drained.notify_waiters();
                    debug!("Queue '{}' drained", identity);
                    return;
                }
            }
        };

        let permit = match inner.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("Task semaphore closed; dropping queue '{}'", identity);
                inner.queues().remove(&identity);
                inner.drained.notify_waiters();
                return;
            }
        };

        // Spawned so a timed-out task keeps running detached instead of being dropped.
        let running = inner.runtime.spawn(task);
        match tokio::time::timeout(inner.task_timeout, running).await {
            Ok(Ok(())) => {}
            Ok(Err(join_error)) => {
                error!("Task in queue '{}' panicked: {}", identity, join_error)
            }
            Err(_) => warn!(
                "Task in queue '{}' timed out after {:?}; continuing with the next one",
                identity, inner.task_timeout
            ),
        }
        drop(permit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_identity_is_rejected() {
        let queue = TaskQueue::new(2, Duration::from_secs(1));
        assert_eq!(
            queue.add_task("", async {}),
            Err(QueueError::MissingIdentity)
        );
        assert_eq!(queue.active_queues(), 0);
    }

    #[tokio::test]
    async fn test_queue_is_destroyed_after_drain() {
        let queue = TaskQueue::new(2, Duration::from_secs(1));
        queue.add_task("spec", async {}).expect("queued");

        assert!(queue.flush_all_tasks(Duration::from_secs(1)).await);
        assert!(queue.is_idle("spec"));
        assert_eq!(queue.pending("spec"), 0);
    }
}
