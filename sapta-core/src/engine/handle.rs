//! Hot-swappable reference to the loaded model artifact.
//!
//! Readers clone the `Arc` once per evaluation, so a swap never changes the
//! model underneath an evaluation in flight. Every install or clear bumps
//! the generation counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::ModelArtifact;

#[derive(Debug, Default)]
pub struct ModelHandle {
    current: RwLock<Option<Arc<ModelArtifact>>>,
    generation: AtomicU64,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<ModelArtifact>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current artifact, returning the new generation.
    pub fn install(&self, artifact: Arc<ModelArtifact>) -> u64 {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(artifact);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop the current artifact, returning it if there was one.
    pub fn clear(&self) -> Option<Arc<ModelArtifact>> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = slot.take();
        if previous.is_some() {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        previous
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::artifact::tests::tiny_artifact;

    #[test]
    fn install_snapshot_clear() {
        let handle = ModelHandle::new();
        assert!(handle.snapshot().is_none());
        assert_eq!(handle.generation(), 0);

        let g = handle.install(Arc::new(tiny_artifact()));
        assert_eq!(g, 1);
        assert!(handle.snapshot().is_some());

        // A snapshot outlives a swap.
        let held = handle.snapshot().unwrap();
        handle.install(Arc::new(tiny_artifact()));
        assert_eq!(handle.generation(), 2);
        assert_eq!(held.model_id, handle.snapshot().unwrap().model_id);

        assert!(handle.clear().is_some());
        assert!(handle.clear().is_none());
        assert_eq!(handle.generation(), 3);
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let handle = Arc::new(ModelHandle::new());
        let artifact = Arc::new(tiny_artifact());
        std::thread::scope(|s| {
            for _ in 0..4 {
                let h = Arc::clone(&handle);
                s.spawn(move || {
                    for _ in 0..100 {
                        let _ = h.snapshot();
                    }
                });
            }
            let h = Arc::clone(&handle);
            let a = Arc::clone(&artifact);
            s.spawn(move || {
                for _ in 0..10 {
                    h.install(Arc::clone(&a));
                }
            });
        });
        assert_eq!(handle.generation(), 10);
    }
}
