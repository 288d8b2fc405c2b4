//! Background page rendering.
//!
//! Requests are numbered; only the result of the most recent request is ever
//! handed back. Earlier renders still run to completion (pdfium cannot be
//! interrupted mid-page) but their results are dropped on arrival.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::cache::RenderCache;
use crate::{DocumentBackend, RenderImage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

struct RenderJob {
    id: RequestId,
    backend: Arc<dyn DocumentBackend>,
    page_index: usize,
    zoom: f32,
    /// Cache generation when the request was made.
    generation: u64,
}

pub struct RenderOutcome {
    pub id: RequestId,
    pub page_index: usize,
    pub zoom: f32,
    pub result: Result<Arc<RenderImage>>,
}

pub struct RenderScheduler {
    cache: Arc<RenderCache>,
    job_tx: Option<Sender<RenderJob>>,
    outcome_rx: Receiver<RenderOutcome>,
    latest: Arc<AtomicU64>,
    next_id: u64,
    worker: Option<JoinHandle<()>>,
}

impl RenderScheduler {
    pub fn spawn(cache: Arc<RenderCache>) -> Result<Self> {
        let (job_tx, job_rx) = flume::unbounded::<RenderJob>();
        let (outcome_tx, outcome_rx) = flume::unbounded();
        let latest = Arc::new(AtomicU64::new(0));

        let worker_latest = Arc::clone(&latest);
        let worker_cache = Arc::clone(&cache);
        let worker = std::thread::Builder::new()
            .name("pdfpick-render".to_owned())
            .spawn(move || render_worker(job_rx, outcome_tx, worker_cache, worker_latest))
            .context("failed to spawn render worker")?;

        Ok(Self {
            cache,
            job_tx: Some(job_tx),
            outcome_rx,
            latest,
            next_id: 1,
            worker: Some(worker),
        })
    }

    /// Queues a render and makes it the only request whose result counts.
    pub fn submit(
        &mut self,
        backend: Arc<dyn DocumentBackend>,
        page_index: usize,
        zoom: f32,
    ) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.latest.store(id.0, Ordering::SeqCst);

        let job = RenderJob {
            id,
            backend,
            page_index,
            zoom,
            generation: self.cache.generation(),
        };
        if let Some(tx) = &self.job_tx {
            if tx.send(job).is_err() {
                debug!(?id, "render worker is gone, dropping request");
            }
        }
        id
    }

    pub fn latest(&self) -> Option<RequestId> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            id => Some(RequestId(id)),
        }
    }

    /// Non-blocking: returns the latest request's result if it has arrived.
    pub fn poll(&mut self) -> Option<RenderOutcome> {
        let mut found = None;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            if self.is_latest(&outcome) {
                found = Some(outcome);
            }
        }
        found
    }

    /// Blocks until the latest request's result arrives or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Option<RenderOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.outcome_rx.recv_timeout(remaining) {
                Ok(outcome) if self.is_latest(&outcome) => return Some(outcome),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    fn is_latest(&self, outcome: &RenderOutcome) -> bool {
        let latest = self.latest.load(Ordering::SeqCst);
        if outcome.id.0 == latest {
            true
        } else {
            debug!(
                id = outcome.id.0,
                latest,
                page = outcome.page_index,
                "discarding superseded render"
            );
            false
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.job_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn render_worker(
    jobs: Receiver<RenderJob>,
    outcomes: Sender<RenderOutcome>,
    cache: Arc<RenderCache>,
    latest: Arc<AtomicU64>,
) {
    while let Ok(job) = jobs.recv() {
        if job.id.0 < latest.load(Ordering::SeqCst) {
            trace!(id = job.id.0, "skipping superseded render before it starts");
            continue;
        }
        let result = cache.get_for_generation(
            job.backend.as_ref(),
            job.page_index,
            job.zoom,
            job.generation,
        );
        let outcome = RenderOutcome {
            id: job.id,
            page_index: job.page_index,
            zoom: job.zoom,
            result,
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_pixel, FakeDocument};

    fn scheduler() -> (RenderScheduler, Arc<RenderCache>) {
        let cache = Arc::new(RenderCache::new(8, 8, 1.0, 150));
        (RenderScheduler::spawn(Arc::clone(&cache)).unwrap(), cache)
    }

    #[test]
    fn delivers_result_of_single_request() {
        let (mut scheduler, cache) = scheduler();
        let doc: Arc<dyn DocumentBackend> = Arc::new(FakeDocument::new("/docs/a.pdf", 3));

        let id = scheduler.submit(Arc::clone(&doc), 2, 1.0);
        let outcome = scheduler.wait(Duration::from_secs(5)).unwrap();

        assert_eq!(outcome.id, id);
        assert_eq!(outcome.page_index, 2);
        let image = outcome.result.unwrap();
        assert_eq!(&image.pixels[..4], &fake_pixel(2, 1.0));
        assert!(cache.contains(2, 1.0));
    }

    #[test]
    fn only_latest_request_is_applied() {
        let (mut scheduler, _cache) = scheduler();
        let doc: Arc<dyn DocumentBackend> = Arc::new(
            FakeDocument::new("/docs/a.pdf", 5).with_render_delay(Duration::from_millis(50)),
        );

        scheduler.submit(Arc::clone(&doc), 1, 1.0);
        scheduler.submit(Arc::clone(&doc), 2, 1.0);
        let last = scheduler.submit(Arc::clone(&doc), 3, 1.0);

        let outcome = scheduler.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.id, last);
        assert_eq!(outcome.page_index, 3);
        assert!(scheduler.poll().is_none());
    }

    #[test]
    fn stale_results_are_dropped_by_poll() {
        let (mut scheduler, _cache) = scheduler();
        let doc: Arc<dyn DocumentBackend> = Arc::new(FakeDocument::new("/docs/a.pdf", 5));

        scheduler.submit(Arc::clone(&doc), 1, 1.0);
        let first = scheduler.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(first.page_index, 1);

        let second = scheduler.submit(Arc::clone(&doc), 4, 1.0);
        let outcome = scheduler.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.id, second);
        assert_eq!(scheduler.latest(), Some(second));
    }

    #[test]
    fn requests_queued_before_a_reset_do_not_fill_the_cache() {
        let (mut scheduler, cache) = scheduler();
        let doc: Arc<dyn DocumentBackend> = Arc::new(
            FakeDocument::new("/docs/a.pdf", 3).with_render_delay(Duration::from_millis(200)),
        );

        scheduler.submit(Arc::clone(&doc), 1, 1.0);
        let queued = scheduler.submit(Arc::clone(&doc), 0, 1.0);
        cache.reset();

        let outcome = scheduler.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.id, queued);
        assert!(outcome.result.is_ok());
        assert!(!cache.contains(0, 1.0));
        assert!(!cache.contains(1, 1.0));
    }

    #[test]
    fn render_errors_are_reported_not_panicked() {
        let (mut scheduler, _cache) = scheduler();
        let doc: Arc<dyn DocumentBackend> =
            Arc::new(FakeDocument::new("/docs/a.pdf", 2).with_failing_page(1));

        scheduler.submit(doc, 1, 1.0);
        let outcome = scheduler.wait(Duration::from_secs(5)).unwrap();
        assert!(outcome.result.is_err());
    }

    #[test]
    fn nothing_submitted_means_nothing_to_poll() {
        let (mut scheduler, _cache) = scheduler();
        assert!(scheduler.latest().is_none());
        assert!(scheduler.poll().is_none());
        assert!(scheduler.wait(Duration::from_millis(10)).is_none());
    }
}
