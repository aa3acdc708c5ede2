// Task queue ordering, timeouts and flushing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use allure_relay::queue::TaskQueue;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Keeps the message of every warning
struct WarnRecorder {
    warnings: Arc<Mutex<Vec<String>>>,
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for WarnRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.warnings.lock().expect("warnings").push(message);
        }
    }
}

fn record(log: Log, delay_ms: u64, name: &'static str) -> impl Future<Output = ()> + Send + 'static {
    async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        log.lock().expect("log").push(name);
    }
}

#[tokio::test]
async fn test_identities_are_fifo_and_independent() {
    let queue = TaskQueue::new(5, Duration::from_secs(5));
    let log: Log = Arc::default();

    // A is slow, B is instant but queued behind A; C runs on its own queue
    queue.add_task("spec-1", record(log.clone(), 150, "fnA")).expect("queued");
    queue.add_task("spec-1", record(log.clone(), 0, "fnB")).expect("queued");
    queue.add_task("spec-2", record(log.clone(), 20, "fnC")).expect("queued");

    assert!(queue.flush_all_tasks(Duration::from_secs(5)).await);
    assert_eq!(*log.lock().expect("log"), vec!["fnC", "fnA", "fnB"]);
}

#[tokio::test]
async fn test_timed_out_task_does_not_block_the_queue() {
    // current-thread runtime: the queue's tasks see this thread's subscriber
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let recorder = WarnRecorder {
        warnings: warnings.clone(),
    };
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder));

    let queue = TaskQueue::new(2, Duration::from_millis(50));
    let log: Log = Arc::default();

    queue.add_task("spec", record(log.clone(), 2_000, "stuck")).expect("queued");
    queue.add_task("spec", record(log.clone(), 0, "next")).expect("queued");

    assert!(queue.flush_all_tasks_for_queue("spec", Duration::from_secs(1)).await);
    assert_eq!(*log.lock().expect("log"), vec!["next"]);
    assert!(queue.is_idle("spec"));

    let warnings = warnings.lock().expect("warnings");
    assert_eq!(warnings.len(), 1, "{:?}", *warnings);
    assert!(warnings[0].contains("Task in queue 'spec' timed out"), "{}", warnings[0]);
}

#[tokio::test]
async fn test_concurrency_cap_across_identities() {
    let queue = TaskQueue::new(1, Duration::from_secs(5));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for identity in ["a", "b", "c"] {
        let running = running.clone();
        let peak = peak.clone();
        queue
            .add_task(identity, async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .expect("queued");
    }

    assert!(queue.flush_all_tasks(Duration::from_secs(5)).await);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_flush_of_idle_queue_returns_immediately() {
    let queue = TaskQueue::new(5, Duration::from_secs(5));
    assert!(
        queue
            .flush_all_tasks_for_queue("never-used", Duration::from_millis(10))
            .await
    );
    assert!(queue.flush_all_tasks(Duration::from_millis(10)).await);
}

#[tokio::test]
async fn test_flush_gives_up_after_timeout() {
    let queue = TaskQueue::new(5, Duration::from_secs(5));
    let log: Log = Arc::default();
    queue.add_task("slow", record(log.clone(), 500, "slow")).expect("queued");

    assert!(!queue.flush_all_tasks(Duration::from_millis(30)).await);
    assert!(!queue.is_idle("slow"));

    // the queue keeps draining after the caller gave up
    assert!(queue.flush_all_tasks(Duration::from_secs(5)).await);
    assert_eq!(*log.lock().expect("log"), vec!["slow"]);
}

#[tokio::test]
async fn test_flush_one_identity_ignores_others() {
    let queue = TaskQueue::new(5, Duration::from_secs(5));
    let log: Log = Arc::default();
    queue.add_task("fast", record(log.clone(), 0, "fast")).expect("queued");
    queue.add_task("slow", record(log.clone(), 300, "slow")).expect("queued");

    assert!(
        queue
            .flush_all_tasks_for_queue("fast", Duration::from_millis(200))
            .await
    );
    assert!(queue.is_idle("fast"));
    assert!(!queue.is_idle("slow"));
}
