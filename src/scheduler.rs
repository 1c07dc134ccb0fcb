use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::errors::{Result, TelloError};

/// Runs the controller's background work: recurring jobs such as the
/// keep-alive, listeners, and one-shot blocking jobs such as video capture.
///
/// Cloning gives another handle to the same scheduler, so one scheduler can
/// be shared and shut down from anywhere.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>
}

#[derive(Debug)]
struct SchedulerInner {
    runtime: Handle,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>
}

impl Scheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                runtime,
                shutdown: CancellationToken::new(),
                tasks: Mutex::new(vec![])
            })
        }
    }

    /// A scheduler on the current Tokio runtime.
    ///
    /// Panics if called outside a runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Runs `job` every `period`, the first time after `initial_delay`.
    ///
    /// A run that overruns its slot delays the following ones rather than
    /// bunching them up.
    pub fn schedule_at_fixed_rate<F, Fut>(&self, initial_delay: Duration, period: Duration, mut job: F) -> Result<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
    {
        if period.is_zero() {
            return Err(TelloError::InvalidPeriod);
        }
        self.ensure_running()?;

        let shutdown = self.inner.shutdown.clone();
        let task = self.inner.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                job().await;
            }
        });

        debug!("[Scheduler] recurring job every {period:?}");
        self.track(task)
    }

    /// Runs `future` once in the background.
    pub fn submit<Fut>(&self, future: Fut) -> Result<()>
    where
        Fut: Future<Output = ()> + Send + 'static
    {
        self.ensure_running()?;
        let task = self.inner.runtime.spawn(future);
        self.track(task)
    }

    /// Runs blocking `job` once on the blocking thread pool.
    ///
    /// Blocking jobs cannot be aborted, they must watch their own stop
    /// signal. `shutdown` does not wait for them.
    pub fn submit_blocking<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static
    {
        self.ensure_running()?;
        drop(self.inner.runtime.spawn_blocking(job));
        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stops recurring jobs and aborts the other background tasks, then
    /// waits until none of them is running any more.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let tasks = std::mem::take(&mut *lock(&self.inner.tasks));
        debug!("[Scheduler] SHUTDOWN ({} tasks)", tasks.len());

        for task in tasks.iter() {
            task.abort();
        }
        for task in tasks {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!("[Scheduler] task panicked - {err}");
                }
            }
        }
    }

    /// Like `shutdown` but without waiting, for use where we can't await.
    pub fn abort(&self) {
        self.inner.shutdown.cancel();
        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shutdown() {
            Err(TelloError::SchedulerShutdown)
        }
        else {
            Ok(())
        }
    }

    fn track(&self, task: JoinHandle<()>) -> Result<()> {
        let mut tasks = lock(&self.inner.tasks);

        // shutdown may have drained the list while we were spawning
        if self.is_shutdown() {
            task.abort();
            return Err(TelloError::SchedulerShutdown);
        }

        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
        Ok(())
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    #[tokio::test]
    async fn recurring_job_runs_until_shutdown() {
        let scheduler = Scheduler::current();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        scheduler.schedule_at_fixed_rate(Duration::ZERO, Duration::from_millis(20), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }).unwrap();

        sleep(Duration::from_millis(150)).await;
        scheduler.shutdown().await;

        let after_shutdown = runs.load(Ordering::SeqCst);
        assert!(after_shutdown >= 2, "only {after_shutdown} runs");

        sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test]
    async fn initial_delay_is_honoured() {
        let scheduler = Scheduler::current();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        scheduler.schedule_at_fixed_rate(Duration::from_secs(60), Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }).unwrap();

        sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let scheduler = Scheduler::current();
        let r = scheduler.schedule_at_fixed_rate(Duration::ZERO, Duration::ZERO, || async {});
        assert!(matches!(r, Err(TelloError::InvalidPeriod)));
    }

    #[tokio::test]
    async fn rejects_work_after_shutdown() {
        let scheduler = Scheduler::current();
        scheduler.shutdown().await;

        assert!(scheduler.is_shutdown());
        assert!(matches!(scheduler.submit(async {}), Err(TelloError::SchedulerShutdown)));
        assert!(matches!(scheduler.submit_blocking(|| {}), Err(TelloError::SchedulerShutdown)));
        assert!(matches!(
            scheduler.schedule_at_fixed_rate(Duration::ZERO, Duration::from_secs(1), || async {}),
            Err(TelloError::SchedulerShutdown)
        ));
    }

    #[tokio::test]
    async fn shutdown_aborts_pending_tasks() {
        let scheduler = Scheduler::current();
        let (tx, rx) = oneshot::channel::<()>();

        scheduler.submit(async move {
            sleep(Duration::from_secs(60)).await;
            let _ = tx.send(());
        }).unwrap();

        scheduler.shutdown().await;

        // the sender was dropped with the aborted task
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn blocking_jobs_run() {
        let scheduler = Scheduler::current();
        let (tx, rx) = oneshot::channel();

        scheduler.submit_blocking(move || {
            let _ = tx.send(42);
        }).unwrap();

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let scheduler = Scheduler::current();
        let other = scheduler.clone();
        other.abort();
        assert!(scheduler.is_shutdown());
    }
}
