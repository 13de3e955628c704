use crate::errors::TrackerError;
use crate::session::Session;
use crate::storage::KvStore;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

/// Everything guarded by the single lock: the store and the active session.
/// Handlers change a clone and swap it in once the store is on disk.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub store: KvStore,
    pub session: Option<Session>,
}

impl Workspace {
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            session: None,
        }
    }

    pub fn session(&self) -> Result<&Session, TrackerError> {
        self.session.as_ref().ok_or(TrackerError::NoSession)
    }

    pub fn session_mut(&mut self) -> Result<&mut Session, TrackerError> {
        self.session.as_mut().ok_or(TrackerError::NoSession)
    }

    /// Writes the session's data graph back into the store as one blob.
    pub fn save_session_data(&mut self) -> Result<(), TrackerError> {
        let session = self.session.as_ref().ok_or(TrackerError::NoSession)?;
        if let Some(data) = &session.data {
            self.store.save_user_data(&session.username, data)?;
        }
        Ok(())
    }

    pub fn logout(&mut self) {
        self.session = None;
        self.store.clear_current_user();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub workspace: Arc<Mutex<Workspace>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, store: KvStore) -> Self {
        Self {
            data_path,
            workspace: Arc::new(Mutex::new(Workspace::new(store))),
        }
    }
}
