//! Durable storage backends consumed by the scheduler.
//!
//! The trait abstracts the storage mechanism; the crate ships a file-based
//! backend (built on the frame codec) and an in-memory one.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use crate::types::Snapshot;
use std::time::Duration;

/// Abstract durable store for application snapshots.
///
/// Methods are blocking; the scheduler issues them from its worker thread,
/// never from the caller's hot path. Implementations must make the new
/// snapshot durable before returning from `persist_difference`.
pub trait StorageBackend: Send + Sync {
    /// Read the persisted snapshot, or `None` if nothing has ever been
    /// persisted.
    fn read_state(&self) -> Result<Option<Snapshot>>;

    /// Delete any persisted state.
    fn delete_state(&self) -> Result<()>;

    /// Make `new_snapshot` durable. `last_persisted` is the previously
    /// durable snapshot (if any); implementations may use it to write only
    /// a delta.
    fn persist_difference(
        &self,
        last_persisted: Option<&Snapshot>,
        new_snapshot: &Snapshot,
    ) -> Result<()>;

    /// Persist the very first snapshot.
    fn save_initial_state(&self, snapshot: &Snapshot) -> Result<()> {
        self.persist_difference(None, snapshot)
    }

    /// Minimum time between the start of two persist operations.
    ///
    /// `None` means no throttling: persist as soon as possible every time.
    fn throttle(&self) -> Option<Duration> {
        None
    }
}
