//! Lifecycle state tracking for domain objects and their properties.
//!
//! Every domain object owns a [`StateHandle`]. Properties keep a clone of their owner's
//! handle (and one of their own), so a mutation deep inside an object graph can mark the
//! owner dirty without holding a reference to it.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

/// Persistence state of an object or of a single property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Never persisted; has no storage identity yet.
    New,
    /// In sync with the store.
    Clean,
    /// Locally modified since the last flush.
    Dirty,
}

impl LifecycleState {
    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::New => 0,
            LifecycleState::Clean => 1,
            LifecycleState::Dirty => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Clean,
            2 => LifecycleState::Dirty,
            _ => LifecycleState::New,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::New => write!(f, "New"),
            LifecycleState::Clean => write!(f, "Clean"),
            LifecycleState::Dirty => write!(f, "Dirty"),
        }
    }
}

/// Shared, cloneable slot holding a [`LifecycleState`].
///
/// Clones observe and modify the same slot.
#[derive(Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    /// Creates a slot in the given state.
    pub fn new(state: LifecycleState) -> Self {
        Self(Arc::new(AtomicU8::new(state.as_u8())))
    }

    /// Returns the current state.
    pub fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Overwrites the current state.
    pub fn set(&self, state: LifecycleState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Moves `Clean` to `Dirty`; leaves `New` and `Dirty` untouched.
    ///
    /// Returns `true` if a transition happened.
    pub fn mark_dirty(&self) -> bool {
        self.0
            .compare_exchange(
                LifecycleState::Clean.as_u8(),
                LifecycleState::Dirty.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns `true` if both handles refer to the same slot.
    pub fn same_slot(&self, other: &StateHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new(LifecycleState::New)
    }
}

impl fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateHandle").field(&self.get()).finish()
    }
}
