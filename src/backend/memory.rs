//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::Result;
use crate::types::Snapshot;
use parking_lot::Mutex;
use std::time::Duration;

/// Keeps the latest snapshot in memory.
///
/// Useful as a null backend when durability is not wanted, and in tests
/// that need to observe what the scheduler persisted.
#[derive(Default)]
pub struct MemoryBackend {
    stored: Mutex<Option<Snapshot>>,
    persist_calls: Mutex<u64>,
    throttle: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_throttle(throttle: Duration) -> Self {
        Self {
            throttle: Some(throttle),
            ..Self::default()
        }
    }

    /// The snapshot currently held, if any.
    pub fn stored(&self) -> Option<Snapshot> {
        self.stored.lock().clone()
    }

    /// How many times `persist_difference` has been invoked.
    pub fn persist_calls(&self) -> u64 {
        *self.persist_calls.lock()
    }
}

impl StorageBackend for MemoryBackend {
    fn read_state(&self) -> Result<Option<Snapshot>> {
        Ok(self.stored.lock().clone())
    }

    fn delete_state(&self) -> Result<()> {
        *self.stored.lock() = None;
        Ok(())
    }

    fn persist_difference(
        &self,
        _last_persisted: Option<&Snapshot>,
        new_snapshot: &Snapshot,
    ) -> Result<()> {
        *self.persist_calls.lock() += 1;
        *self.stored.lock() = Some(new_snapshot.clone());
        Ok(())
    }

    fn throttle(&self) -> Option<Duration> {
        self.throttle
    }
}
