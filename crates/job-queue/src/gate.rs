//! Exclusive access to the inference accelerator.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes inference across the worker and ad-hoc Recommend requests.
///
/// Clones share the same gate. Post-processing never takes it.
#[derive(Debug, Clone, Default)]
pub struct AcceleratorGate {
    inner: Arc<Mutex<()>>,
}

impl AcceleratorGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use. The returned guard can move into a
    /// blocking task and releases the gate when dropped.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.inner).lock_owned().await
    }

    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
