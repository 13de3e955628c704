//! Profile and master-password checks.
//!
//! Passwords are stored and compared as plain text. This module gates
//! access between local profiles on one machine; it is not a security
//! boundary.

use crate::errors::TrackerError;
use crate::models::{AccountSummary, UserAccount};
use crate::storage::KvStore;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    Created,
}

/// Logs into an existing profile, or creates it when `create` is set.
pub fn login(
    store: &mut KvStore,
    username: &str,
    password: &str,
    create: bool,
) -> Result<LoginOutcome, TrackerError> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(TrackerError::validation("enter both username and password"));
    }

    let mut users = store.users()?;
    let password_matches = users
        .iter()
        .find(|user| user.username == username)
        .map(|user| user.password == password);
    let outcome = match password_matches {
        Some(true) => LoginOutcome::LoggedIn,
        Some(false) => return Err(TrackerError::Unauthorized),
        None if create => {
            users.push(UserAccount {
                username: username.to_string(),
                password: password.to_string(),
            });
            store.save_users(&users)?;
            info!(username, "created profile");
            LoginOutcome::Created
        }
        None => return Err(TrackerError::NotFound(format!("profile {username}"))),
    };
    store.set_current_user(username);
    Ok(outcome)
}

pub fn verify_profile_password(
    store: &KvStore,
    username: &str,
    password: &str,
) -> Result<(), TrackerError> {
    let user = store
        .find_user(username)?
        .ok_or_else(|| TrackerError::NotFound(format!("profile {username}")))?;
    if user.password != password.trim() {
        return Err(TrackerError::Unauthorized);
    }
    Ok(())
}

pub fn delete_profile(store: &mut KvStore, username: &str, password: &str) -> Result<(), TrackerError> {
    verify_profile_password(store, username, password)?;
    store.delete_user(username)?;
    info!(username, "deleted profile");
    Ok(())
}

pub fn setup_master(store: &mut KvStore, password: &str, email: &str) -> Result<(), TrackerError> {
    if store.master_pass().is_some() {
        return Err(TrackerError::validation("master password is already set"));
    }
    let password = password.trim();
    let email = email.trim();
    if password.is_empty() || email.is_empty() {
        return Err(TrackerError::validation("fill in both password and email"));
    }
    if !looks_like_email(email) {
        return Err(TrackerError::validation("invalid email"));
    }
    store.save_admin_security(password, email);
    info!("master password configured");
    Ok(())
}

pub fn verify_master(store: &KvStore, password: &str) -> Result<(), TrackerError> {
    match store.master_pass() {
        Some(stored) if stored == password.trim() => Ok(()),
        _ => Err(TrackerError::Unauthorized),
    }
}

pub fn list_accounts(store: &KvStore, master: &str) -> Result<Vec<AccountSummary>, TrackerError> {
    verify_master(store, master)?;
    Ok(store
        .users()?
        .into_iter()
        .map(|user| {
            let period = store
                .load_user_data(&user.username)
                .ok()
                .flatten()
                .map(|data| data.month.label());
            AccountSummary {
                username: user.username,
                password: user.password,
                period,
            }
        })
        .collect())
}

/// Forgets the master password and admin email when `email` matches. Profile
/// data is untouched.
pub fn recover_master(store: &mut KvStore, email: &str) -> Result<(), TrackerError> {
    let email = email.trim();
    let matches = store
        .admin_email()
        .is_some_and(|stored| !email.is_empty() && stored == email);
    if !matches {
        return Err(TrackerError::NotFound("recovery email".to_string()));
    }
    store.reset_admin_security();
    info!("admin security reset through recovery email");
    Ok(())
}

pub fn reset_app(store: &mut KvStore, master: &str) -> Result<(), TrackerError> {
    verify_master(store, master)?;
    store.clear();
    info!("store wiped by factory reset");
    Ok(())
}

// Same shape check as the sign-up form: something@something.something,
// no whitespace.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
