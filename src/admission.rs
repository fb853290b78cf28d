//! Upload admission control.
//!
//! A counting permit pool bounds the number of in-flight document-processing
//! operations. Acquisition is attempt-and-fail: there is no queueing and no
//! timeout wait, so excess load is rejected rather than buffered. Searches
//! are not gated here.

use std::sync::Arc;

use tokio::sync::{Semaphore, TryAcquireError};

/// A permit for one document-processing operation.
///
/// The permit is returned to the pool when this value is dropped, which
/// covers every exit path of the holder, including errors and panics.
pub struct AdmissionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Non-blocking bounded-concurrency gate for the upload pipeline.
#[derive(Clone)]
pub struct AdmissionController {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionController {
    /// Create a controller with `capacity` concurrent permits.
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Try to take a permit without waiting.
    ///
    /// Returns `None` when the pool is exhausted; the caller is expected to
    /// reject the request so it can be retried later.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Some(AdmissionPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) => None,
            Err(TryAcquireError::Closed) => None,
        }
    }

    /// The configured permit count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
