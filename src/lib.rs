//! # Snapvault
//!
//! Durable-state persistence: a throttling, coalescing scheduler that
//! decides *when* an in-memory state snapshot is written to durable
//! storage, and a binary framing codec that turns a sequence of
//! JSON-compatible values into a length-prefixed byte stream and back.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: opaque immutable state handle, compared by identity only
//! - **StorageBackend**: pluggable durable store (file-based or in-memory)
//! - **PersistenceScheduler**: single-flight coordinator with throttling,
//!   pause/resume, and backlog coalescing
//! - **Codec**: length-prefixed frames of UTF-8 JSON records
//!
//! ## Example
//!
//! ```ignore
//! use snapvault::{FileBackend, PersistenceScheduler, Snapshot};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let backend = Arc::new(FileBackend::with_throttle(
//!     "./state.bin",
//!     Duration::from_secs(2),
//! ));
//! let scheduler = PersistenceScheduler::new(backend);
//!
//! // Restore on startup.
//! let initial = scheduler.read_state()?;
//!
//! // Hand every state change to the scheduler; it coalesces bursts into
//! // at most one write per throttle window.
//! scheduler.process(None, Snapshot::new(json!({"count": 1})));
//! ```

pub mod backend;
pub mod codec;
pub mod error;
pub mod scheduler;
pub mod types;

// Re-exports
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use codec::{decode, decode_single_object, encode, MAX_FRAME_LEN};
pub use error::{Result, VaultError};
pub use scheduler::PersistenceScheduler;
pub use types::{PersistErrorHook, PersistTrigger, PersistedRecord, SchedulerConfig, Snapshot};
