use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::DirectoryError;

/// Maps attendee ids (chat e-mail addresses) to the names the chat server mentions them by.
pub trait UserDirectory: Send {
    /// Falls back to the id itself for unknown users.
    fn display_name(&self, id: &str) -> String;

    fn upsert(&mut self, id: &str, full_name: &str) -> Result<(), DirectoryError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryDirectory {
    users: BTreeMap<String, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: impl Into<String>, full_name: impl Into<String>) -> Self {
        self.users.insert(id.into(), full_name.into());
        self
    }
}

impl UserDirectory for InMemoryDirectory {
    fn display_name(&self, id: &str) -> String {
        self.users.get(id).cloned().unwrap_or_else(|| id.to_owned())
    }

    fn upsert(&mut self, id: &str, full_name: &str) -> Result<(), DirectoryError> {
        self.users.insert(id.to_owned(), full_name.to_owned());
        Ok(())
    }
}

/// Flat JSON object `{ "email": "Full Name" }` persisted after every change.
#[derive(Debug)]
pub struct JsonUserDirectory {
    path: PathBuf,
    users: BTreeMap<String, String>,
}

impl JsonUserDirectory {
    /// Missing or malformed files start an empty directory.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                warn!(
                    event_name = "rsvp.directory.load_failed",
                    path = %path.display(),
                    error = %error,
                    "user directory unreadable; starting empty"
                );
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        debug!(
            event_name = "rsvp.directory.loaded",
            path = %path.display(),
            user_count = users.len(),
            "loaded user directory"
        );
        Self { path, users }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn save(&self) -> Result<(), DirectoryError> {
        let payload = serde_json::to_string(&self.users).map_err(DirectoryError::Serialize)?;
        fs::write(&self.path, payload)
            .map_err(|source| DirectoryError::Write { path: self.path.clone(), source })
    }
}

impl UserDirectory for JsonUserDirectory {
    fn display_name(&self, id: &str) -> String {
        self.users.get(id).cloned().unwrap_or_else(|| id.to_owned())
    }

    fn upsert(&mut self, id: &str, full_name: &str) -> Result<(), DirectoryError> {
        self.users.insert(id.to_owned(), full_name.to_owned());
        self.save()
    }
}
