use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Event, EventId, EventMap};
use crate::errors::StoreError;

/// Durable home of the whole event mapping.
///
/// `commit_all` is a full overwrite of every readable event. Callers sharing a store across tasks must
/// serialize load/commit pairs themselves.
pub trait EventStore: Send {
    /// Never fails: absent or unreadable data yields an empty mapping.
    fn load_all(&self) -> EventMap;

    fn commit_all(&mut self, events: &EventMap) -> Result<(), StoreError>;
}

/// JSON document on disk, keyed by event id.
///
/// Entries that fail to parse are left out of the loaded mapping but written back verbatim
/// on commit, unless an event with the same id has replaced them.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    unreadable: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), unreadable: Arc::default() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<EventMap, StoreError> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|source| StoreError::Read { path: self.path.clone(), source })?;
        let entries: BTreeMap<String, Value> = serde_json::from_str(&raw)
            .map_err(|source| StoreError::Parse { path: self.path.clone(), source })?;

        let mut events = EventMap::new();
        let mut unreadable = BTreeMap::new();
        for (key, value) in entries {
            match Event::deserialize(&value) {
                Ok(event) => {
                    events.insert(EventId::from(key.as_str()), event);
                }
                Err(error) => {
                    warn!(
                        event_name = "rsvp.store.entry_skipped",
                        path = %self.path.display(),
                        event_id = %key,
                        error = %error,
                        "stored event unreadable; keeping it on disk untouched"
                    );
                    unreadable.insert(key, value);
                }
            }
        }

        *self.unreadable.lock().unwrap_or_else(PoisonError::into_inner) = unreadable;
        Ok(events)
    }

    fn document(&self, events: &EventMap) -> Result<BTreeMap<String, Value>, StoreError> {
        let mut document = self.unreadable.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for (event_id, event) in events {
            let value = serde_json::to_value(event).map_err(StoreError::Serialize)?;
            document.insert(event_id.as_str().to_owned(), value);
        }
        Ok(document)
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

impl EventStore for JsonFileStore {
    fn load_all(&self) -> EventMap {
        match self.read() {
            Ok(events) => {
                debug!(
                    event_name = "rsvp.store.loaded",
                    path = %self.path.display(),
                    event_count = events.len(),
                    "loaded event store"
                );
                events
            }
            Err(error) if error.is_missing_file() => {
                debug!(
                    event_name = "rsvp.store.empty",
                    path = %self.path.display(),
                    "event store file not found; starting empty"
                );
                EventMap::new()
            }
            Err(error) => {
                warn!(
                    event_name = "rsvp.store.load_failed",
                    path = %self.path.display(),
                    error = %error,
                    "event store unreadable; starting empty"
                );
                EventMap::new()
            }
        }
    }

    fn commit_all(&mut self, events: &EventMap) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(&self.document(events)?).map_err(StoreError::Serialize)?;
        let staging = self.staging_path();

        fs::write(&staging, payload)
            .map_err(|source| StoreError::Write { path: staging.clone(), source })?;
        fs::rename(&staging, &self.path)
            .map_err(|source| StoreError::Write { path: self.path.clone(), source })?;

        debug!(
            event_name = "rsvp.store.committed",
            path = %self.path.display(),
            event_count = events.len(),
            "committed event store"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    events: EventMap,
    commits: usize,
}

/// In-process store. Clones share state, so a handle kept outside the router can observe
/// what was committed.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: EventMap) -> Self {
        Self { state: Arc::new(Mutex::new(MemoryState { events, commits: 0 })) }
    }

    pub fn snapshot(&self) -> EventMap {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).events.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).commits
    }
}

impl EventStore for MemoryStore {
    fn load_all(&self) -> EventMap {
        self.snapshot()
    }

    fn commit_all(&mut self, events: &EventMap) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.events = events.clone();
        state.commits += 1;
        Ok(())
    }
}
