use super::{DispatchStatus, Job, JobDispatcher};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
struct Envelope {
    job: Job,
    attempt: u32,
}

struct Inner {
    tx: mpsc::UnboundedSender<Envelope>,
    /// Dedup keys of jobs that are queued, delayed or running.
    pending: Mutex<HashSet<String>>,
}

/// Producer side of the job queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

/// Consumer side, handed to [`spawn_workers`].
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl JobQueue {
    #[must_use]
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            inner: Arc::new(Inner {
                tx,
                pending: Mutex::new(HashSet::new()),
            }),
        };
        (queue, JobReceiver { rx })
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, key: &str) -> bool {
        self.pending().insert(key.to_string())
    }

    fn release(&self, key: &str) {
        self.pending().remove(key);
    }

    /// Queues `job` unless an equal job is already pending.
    ///
    /// Returns `false` when the job was dropped as a duplicate or the
    /// workers are gone.
    pub fn enqueue(&self, job: Job) -> bool {
        let key = job.dedup_key();
        if !self.reserve(&key) {
            debug!(job_name = job.name(), key = %key, "Job already pending, skipping");
            return false;
        }

        let job_name = job.name();
        if self.inner.tx.send(Envelope { job, attempt: 1 }).is_err() {
            self.release(&key);
            warn!(job_name, "Job queue closed, dropping job");
            return false;
        }

        metrics::counter!("jobs_enqueued_total", "job" => job_name).increment(1);
        true
    }

    /// Queues `job` once `delay` has elapsed. The dedup key is held for the
    /// whole wait.
    pub fn enqueue_after(&self, job: Job, delay: Duration) -> bool {
        if delay.is_zero() {
            return self.enqueue(job);
        }

        let key = job.dedup_key();
        if !self.reserve(&key) {
            debug!(job_name = job.name(), key = %key, "Job already pending, skipping");
            return false;
        }

        debug!(
            job_name = job.name(),
            delay_secs = delay.as_secs(),
            "Job scheduled"
        );
        self.send_later(Envelope { job, attempt: 1 }, delay);
        true
    }

    fn send_later(&self, envelope: Envelope, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let key = envelope.job.dedup_key();
            let job_name = envelope.job.name();
            if queue.inner.tx.send(envelope).is_err() {
                queue.release(&key);
                warn!(job_name, "Job queue closed, dropping delayed job");
            } else {
                metrics::counter!("jobs_enqueued_total", "job" => job_name).increment(1);
            }
        });
    }

    #[must_use]
    pub fn is_pending(&self, job: &Job) -> bool {
        self.pending().contains(&job.dedup_key())
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Polls until nothing is pending or `timeout` elapses. Returns whether
    /// the queue drained.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending_count() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Starts `workers` tasks draining `receiver` through `dispatcher`.
pub fn spawn_workers(
    receiver: JobReceiver,
    queue: JobQueue,
    dispatcher: Arc<dyn JobDispatcher>,
    workers: usize,
) -> WorkerPool {
    let rx = Arc::new(tokio::sync::Mutex::new(receiver.rx));
    let handles = (0..workers.max(1))
        .map(|worker_id| {
            let rx = Arc::clone(&rx);
            let queue = queue.clone();
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                loop {
                    let envelope = { rx.lock().await.recv().await };
                    let Some(envelope) = envelope else {
                        debug!(worker_id, "Job queue closed, worker exiting");
                        break;
                    };
                    run_job(&queue, dispatcher.as_ref(), envelope).await;
                }
            })
        })
        .collect();

    info!("Started {} job workers", workers.max(1));
    WorkerPool { handles }
}

async fn run_job(queue: &JobQueue, dispatcher: &dyn JobDispatcher, envelope: Envelope) {
    let Envelope { job, attempt } = envelope;
    let job_name = job.name();
    let key = job.dedup_key();
    let start = Instant::now();

    debug!(event = "job_started", job_name, attempt);

    let status = AssertUnwindSafe(dispatcher.dispatch(&job))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| DispatchStatus::Failed {
            error: "job panicked".to_string(),
        });

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    metrics::histogram!("job_duration_seconds", "job" => job_name)
        .record(start.elapsed().as_secs_f64());

    let outcome = match status {
        DispatchStatus::Success => {
            queue.release(&key);
            debug!(event = "job_finished", job_name, duration_ms);
            "success"
        }
        DispatchStatus::Reschedule(delay) => {
            // The key stays reserved across the wait.
            debug!(event = "job_finished", job_name, duration_ms, next_run_secs = delay.as_secs());
            queue.send_later(Envelope { job, attempt: 1 }, delay);
            "rescheduled"
        }
        DispatchStatus::Retry { error } => {
            let policy = job.retry_policy();
            if attempt < policy.max_attempts {
                warn!(event = "job_retry", job_name, attempt, error = %error, "Job failed, retrying");
                queue.send_later(
                    Envelope {
                        job,
                        attempt: attempt + 1,
                    },
                    policy.backoff.max(Duration::from_millis(1)),
                );
                "retry"
            } else {
                queue.release(&key);
                error!(event = "job_failed", job_name, attempt, error = %error, duration_ms);
                "failed"
            }
        }
        DispatchStatus::Failed { error } => {
            queue.release(&key);
            warn!(event = "job_failed", job_name, attempt, error = %error, duration_ms);
            "failed"
        }
    };

    metrics::counter!("jobs_processed_total", "job" => job_name, "outcome" => outcome)
        .increment(1);
}
