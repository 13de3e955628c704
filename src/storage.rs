use crate::errors::{AppError, TrackerError};
use crate::models::{UserAccount, UserData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::error;

pub const USERS_KEY: &str = "ht_users";
pub const CURRENT_USER_KEY: &str = "ht_current_user";
pub const MASTER_PASS_KEY: &str = "ht_master_pass";
pub const ADMIN_EMAIL_KEY: &str = "ht_admin_email";
const DATA_KEY_PREFIX: &str = "ht_data_";

/// String-keyed blob store. The on-disk file and backup downloads share this
/// exact shape: a flat JSON object of string values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KvStore {
    entries: BTreeMap<String, String>,
}

impl KvStore {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The account list. An unreadable list is an error rather than empty so
    /// a later save can never overwrite the accounts it failed to read.
    pub fn users(&self) -> Result<Vec<UserAccount>, TrackerError> {
        match self.get(USERS_KEY) {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|err| TrackerError::Storage(format!("account list: {err}"))),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_users(&mut self, users: &[UserAccount]) -> Result<(), TrackerError> {
        let raw = serde_json::to_string(users).map_err(|err| TrackerError::Storage(err.to_string()))?;
        self.set(USERS_KEY, raw);
        Ok(())
    }

    pub fn find_user(&self, username: &str) -> Result<Option<UserAccount>, TrackerError> {
        Ok(self.users()?.into_iter().find(|user| user.username == username))
    }

    pub fn load_user_data(&self, username: &str) -> Result<Option<UserData>, TrackerError> {
        match self.get(&data_key(username)) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|err| TrackerError::Storage(format!("profile {username}: {err}"))),
            None => Ok(None),
        }
    }

    pub fn save_user_data(&mut self, username: &str, data: &UserData) -> Result<(), TrackerError> {
        let raw = serde_json::to_string(data).map_err(|err| TrackerError::Storage(err.to_string()))?;
        self.set(data_key(username), raw);
        Ok(())
    }

    pub fn delete_user(&mut self, username: &str) -> Result<(), TrackerError> {
        let mut users = self.users()?;
        users.retain(|user| user.username != username);
        self.save_users(&users)?;
        self.remove(&data_key(username));
        self.remove(CURRENT_USER_KEY);
        Ok(())
    }

    pub fn current_user(&self) -> Option<&str> {
        self.get(CURRENT_USER_KEY)
    }

    pub fn set_current_user(&mut self, username: &str) {
        self.set(CURRENT_USER_KEY, username);
    }

    pub fn clear_current_user(&mut self) {
        self.remove(CURRENT_USER_KEY);
    }

    pub fn master_pass(&self) -> Option<&str> {
        self.get(MASTER_PASS_KEY)
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.get(ADMIN_EMAIL_KEY)
    }

    pub fn save_admin_security(&mut self, password: &str, email: &str) {
        self.set(MASTER_PASS_KEY, password);
        self.set(ADMIN_EMAIL_KEY, email);
    }

    pub fn reset_admin_security(&mut self) {
        self.remove(MASTER_PASS_KEY);
        self.remove(ADMIN_EMAIL_KEY);
    }

    pub fn snapshot_json(&self) -> Result<String, TrackerError> {
        serde_json::to_string_pretty(self).map_err(|err| TrackerError::Storage(err.to_string()))
    }

    /// Parses an uploaded backup. Anything but a flat object of strings is
    /// refused so a bad upload can never half-replace the store.
    pub fn from_backup(raw: &str) -> Result<Self, TrackerError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| TrackerError::MalformedBackup(format!("invalid JSON: {err}")))?;
        let serde_json::Value::Object(map) = value else {
            return Err(TrackerError::MalformedBackup(
                "expected a JSON object".to_string(),
            ));
        };
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            match value {
                serde_json::Value::String(text) => {
                    entries.insert(key, text);
                }
                other => {
                    return Err(TrackerError::MalformedBackup(format!(
                        "value of {key:?} is {other}, expected a string"
                    )));
                }
            }
        }
        Ok(Self { entries })
    }
}

pub fn data_key(username: &str) -> String {
    format!("{DATA_KEY_PREFIX}{username}")
}

pub fn resolve_data_path() -> Result<PathBuf, std::io::Error> {
    if let Ok(path) = env::var("APP_DATA_PATH") {
        return Ok(PathBuf::from(path));
    }

    Ok(PathBuf::from("data/habits.json"))
}

pub async fn load_store(path: &Path) -> KvStore {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(store) => store,
            Err(err) => {
                error!("failed to parse data file: {err}");
                KvStore::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => KvStore::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            KvStore::default()
        }
    }
}

pub async fn persist_store(path: &Path, store: &KvStore) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(store).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}
