//! Core types for the persistence subsystem.

use crate::error::{Result, VaultError};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One independently persisted JSON-compatible value inside a storage file.
pub type PersistedRecord = Value;

/// An opaque, immutable application state value.
///
/// The core never inspects the structure of a snapshot; it compares
/// snapshots only by identity (`same_as`), never by deep equality. Cloning
/// is cheap and preserves identity.
#[derive(Clone)]
pub struct Snapshot(Arc<Value>);

impl Snapshot {
    /// Wrap a JSON value as a snapshot.
    pub fn new(value: Value) -> Self {
        Snapshot(Arc::new(value))
    }

    /// Serialize any serde value into a snapshot.
    pub fn from_serialize(value: &impl Serialize) -> Result<Self> {
        Ok(Snapshot(Arc::new(serde_json::to_value(value)?)))
    }

    /// Borrow the underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Identity comparison: true iff both handles point at the same value.
    ///
    /// Two structurally equal snapshots created independently are NOT the
    /// same; the scheduler relies on this to detect "state unchanged"
    /// without a deep comparison.
    pub fn same_as(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Snapshot::new(value)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({:p})", Arc::as_ptr(&self.0))
    }
}

/// Trigger passed to `PersistenceScheduler::process` to request an
/// immediate persist, bypassing the throttle window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistTrigger {
    Force,
}

/// Hook invoked when a persist attempt fails.
pub type PersistErrorHook = Arc<dyn Fn(&VaultError) + Send + Sync>;

/// Scheduler configuration.
///
/// A failed `persist_difference` never wedges the scheduler: the in-flight
/// slot is released and the persisted marker advances regardless. The error
/// itself is handed to `on_persist_error` (and logged); with no hook
/// configured it is dropped after logging.
#[derive(Clone, Default)]
pub struct SchedulerConfig {
    /// Called on the worker thread whenever a persist attempt fails.
    pub on_persist_error: Option<PersistErrorHook>,
}

impl fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("on_persist_error", &self.on_persist_error.is_some())
            .finish()
    }
}
