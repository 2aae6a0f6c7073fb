//! Session resumption cache.
//!
//! The cache is an external collaborator: the driver only consults it
//! during shape selection and purges the issued entry when a handshake
//! dies. [`MemorySessionCache`] is a shared in-memory implementation
//! suitable for servers that keep resumption state in-process.

use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;
use spin::Mutex;

/// Length of a generated session identifier.
pub const SESSION_ID_LEN: usize = 32;

/// Cache of resumable session state, keyed by session id.
pub trait SessionCache {
    /// Look up the opaque session state for an id.
    fn lookup(&mut self, session_id: &[u8]) -> Option<Vec<u8>>;

    /// Remove an entry, if present.
    fn delete(&mut self, session_id: &[u8]);
}

/// Shared in-memory session cache.
///
/// Clones share the same storage, so one cache handle can serve every
/// connection of a server.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionCache {
    entries: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemorySessionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store session state under an id.
    pub fn insert(&self, session_id: &[u8], state: Vec<u8>) {
        self.entries.lock().insert(session_id.to_vec(), state);
    }

    /// Whether an entry exists for the id.
    pub fn contains(&self, session_id: &[u8]) -> bool {
        self.entries.lock().contains_key(session_id)
    }

    /// Number of cached sessions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SessionCache for MemorySessionCache {
    fn lookup(&mut self, session_id: &[u8]) -> Option<Vec<u8>> {
        self.entries.lock().get(session_id).cloned()
    }

    fn delete(&mut self, session_id: &[u8]) {
        self.entries.lock().remove(session_id);
    }
}
