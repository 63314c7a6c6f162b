//! Counting admission gate for download tasks.
//!
//! A thin wrapper over [`tokio::sync::Semaphore`] that also tracks how many
//! permits are held right now and the highest number ever held at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::engine::EngineError;

#[derive(Debug, Default)]
struct GateCounters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Bounds the number of downloads holding a connection or file handle.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    counters: Arc<GateCounters>,
    capacity: usize,
}

/// Admission held by one running task; released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    counters: Arc<GateCounters>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        // Runs before the semaphore permit field is released.
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AdmissionGate {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(GateCounters::default()),
            capacity,
        }
    }

    /// Waits for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore was closed.
    pub async fn acquire(&self) -> Result<AdmissionPermit, EngineError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::SemaphoreClosed)?;
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        Ok(AdmissionPermit {
            counters: Arc::clone(&self.counters),
            _permit: permit,
        })
    }

    /// Maximum number of concurrent admissions.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits held at the same time since creation.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}
