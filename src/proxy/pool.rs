// src/proxy/pool.rs
use super::backend::Backend;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Ordered, fixed set of backends plus the round-robin cursor.
///
/// The list is immutable after construction; only the cursor and the
/// per-backend liveness flags mutate at runtime. The cursor is a plain
/// atomic so selections never block on each other.
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    cursor: AtomicUsize,
}

impl BackendPool {
    pub fn new(backends: Vec<Arc<Backend>>) -> Self {
        Self {
            backends,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Next live peer, round-robin with liveness skipping.
    ///
    /// Advances the base cursor by exactly one per call, then scans every
    /// backend once in ascending order starting from the base. When the
    /// winner is not the base candidate the cursor is overwritten with the
    /// winning index, so the next selection resumes from the last known-good
    /// backend instead of re-scanning the dead ones. Under concurrent
    /// selections that overwrite is best-effort distribution, not strict
    /// fairness.
    pub async fn select_peer(&self) -> Option<Arc<Backend>> {
        let n = self.backends.len();
        if n == 0 {
            return None;
        }

        let next = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % n;
        for i in next..next + n {
            let idx = i % n;
            if self.backends[idx].is_alive().await {
                if idx != next {
                    self.cursor.store(idx, Ordering::Relaxed);
                }
                return Some(self.backends[idx].clone());
            }
        }
        None
    }

    /// Flip liveness for the backend with the given address, if present.
    pub async fn mark_backend_status(&self, url: &Url, alive: bool) {
        for backend in &self.backends {
            if backend.url == *url {
                backend.set_alive(alive).await;
                break;
            }
        }
    }

    pub async fn alive_count(&self) -> usize {
        let mut count = 0;
        for backend in &self.backends {
            if backend.is_alive().await {
                count += 1;
            }
        }
        count
    }
}
