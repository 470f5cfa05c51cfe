//! Registered streams and their current interrupt state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use audiofocus_ipc::{StreamDescriptor, StreamId, StreamSnapshot, StreamState};

use crate::error::{FocusError, FocusResult};

#[derive(Debug, Clone)]
struct StreamEntry {
    descriptor: StreamDescriptor,
    state: StreamState,
}

/// Owns every registered stream.
///
/// Mutations take the write lock; every read returns an owned snapshot.
pub struct StreamRegistry {
    streams: RwLock<BTreeMap<StreamId, StreamEntry>>,
    next_id: AtomicU64,
}

impl StreamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a stream. Handles are never reused.
    pub fn register(&self, descriptor: StreamDescriptor) -> FocusResult<StreamId> {
        if !descriptor.is_recognized() {
            return Err(FocusError::InvalidDescriptor(format!(
                "{:?}/{:?} cannot use volume type {:?}",
                descriptor.content_type, descriptor.usage, descriptor.volume_type
            )));
        }

        let id = StreamId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!(
            stream = %id,
            volume_type = ?descriptor.volume_type,
            usage = ?descriptor.usage,
            "Stream registered"
        );

        self.streams.write().insert(
            id,
            StreamEntry {
                descriptor,
                state: StreamState::Inactive,
            },
        );

        Ok(id)
    }

    /// Remove a stream, returning its last snapshot.
    pub fn unregister(&self, id: StreamId) -> FocusResult<StreamSnapshot> {
        let entry = self
            .streams
            .write()
            .remove(&id)
            .ok_or(FocusError::UnknownStream(id))?;

        info!(stream = %id, "Stream unregistered");
        Ok(StreamSnapshot {
            id,
            descriptor: entry.descriptor,
            state: entry.state,
        })
    }

    /// Declared attributes of a stream.
    pub fn get(&self, id: StreamId) -> FocusResult<StreamDescriptor> {
        self.streams
            .read()
            .get(&id)
            .map(|e| e.descriptor.clone())
            .ok_or(FocusError::UnknownStream(id))
    }

    /// Current state of a stream.
    pub fn state(&self, id: StreamId) -> FocusResult<StreamState> {
        self.streams
            .read()
            .get(&id)
            .map(|e| e.state)
            .ok_or(FocusError::UnknownStream(id))
    }

    /// Returns true if the handle names a registered stream.
    pub fn contains(&self, id: StreamId) -> bool {
        self.streams.read().contains_key(&id)
    }

    /// Set a stream's state, returning the previous one.
    pub(crate) fn set_state(&self, id: StreamId, state: StreamState) -> FocusResult<StreamState> {
        let mut streams = self.streams.write();
        let entry = streams.get_mut(&id).ok_or(FocusError::UnknownStream(id))?;

        let previous = entry.state;
        entry.state = state;

        if previous != state {
            debug!(
                stream = %id,
                previous = previous.name(),
                current = state.name(),
                "Stream state transition"
            );
        }

        Ok(previous)
    }

    /// Every registered stream, ordered by handle.
    pub fn snapshot(&self) -> Vec<StreamSnapshot> {
        self.collect(|_| true)
    }

    /// Streams holding an active interrupt, ordered by handle.
    pub fn active_streams(&self) -> Vec<StreamSnapshot> {
        self.collect(|e| e.state.is_active())
    }

    /// Number of registered streams.
    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }

    fn collect(&self, filter: impl Fn(&StreamEntry) -> bool) -> Vec<StreamSnapshot> {
        self.streams
            .read()
            .iter()
            .filter(|(_, e)| filter(e))
            .map(|(id, e)| StreamSnapshot {
                id: *id,
                descriptor: e.descriptor.clone(),
                state: e.state,
            })
            .collect()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
