use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Bounded task pool: runs submitted futures with at most `limit` in flight
/// at once, so a wave of 27 letter pages (or a few thousand filer pages)
/// never opens more than a handful of connections to the remote server.
///
/// Each unit runs to completion independently; `drain` is the wave barrier
/// and hands every unit's `Result` back to the caller. A failed or panicked
/// unit surfaces as an `Err` in the drained results without disturbing its
/// siblings or the barrier. After a drain the pool is empty and can be
/// reused for the next wave.
pub struct TaskPool<T> {
    permits: Arc<Semaphore>,
    handles: Vec<JoinHandle<Result<T>>>,
}

impl<T: Send + 'static> TaskPool<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            handles: Vec::new(),
        }
    }

    /// Queue one unit of work. It starts as soon as a permit frees up.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            task.await
        }));
    }

    /// Wait for every queued and in-flight unit to finish and collect their
    /// results. Completion order follows submission order, but callers must
    /// not read anything into it: units complete in whatever order the
    /// network allows, and downstream sorts before persisting.
    pub async fn drain(&mut self) -> Vec<Result<T>> {
        let mut results = Vec::with_capacity(self.handles.len());
        for handle in self.handles.drain(..) {
            results.push(match handle.await {
                Ok(res) => res,
                Err(join_err) => Err(anyhow::anyhow!("scrape task panicked: {join_err}")),
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn never_exceeds_concurrency_limit() {
        let limit = 3;
        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let mut pool = TaskPool::new(limit);
        for _ in 0..20 {
            let in_flight = Arc::clone(&in_flight);
            let high_water = Arc::clone(&high_water);
            pool.spawn(async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let results = pool.drain().await;

        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(high_water.load(Ordering::SeqCst) <= limit);
    }

    #[tokio::test]
    async fn failed_unit_does_not_disturb_siblings() {
        let mut pool = TaskPool::new(2);
        for i in 0..6 {
            pool.spawn(async move {
                if i == 3 {
                    Err(anyhow!("detail page returned 500"))
                } else {
                    Ok(i)
                }
            });
        }
        let results = pool.drain().await;

        let successes: Vec<i32> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        let failures = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(successes, vec![0, 1, 2, 4, 5]);
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn panicked_unit_still_drains() {
        let mut pool = TaskPool::new(2);
        pool.spawn(async { Ok(1) });
        pool.spawn(async { panic!("boom") });
        pool.spawn(async { Ok(3) });

        let results = pool.drain().await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn reusable_across_waves() {
        let mut pool = TaskPool::new(4);

        pool.spawn(async { Ok("wave1") });
        let first = pool.drain().await;
        assert_eq!(first.len(), 1);

        pool.spawn(async { Ok("wave2a") });
        pool.spawn(async { Ok("wave2b") });
        let second = pool.drain().await;
        assert_eq!(second.len(), 2);
        assert!(second.iter().all(|r| r.is_ok()));
    }
}
