// crates/db-isolation-core/src/capture.rs
// ============================================================================
// Module: Credential Capture
// Description: Launch observer recording generated server accounts.
// Purpose: Read credentials the launcher exposes only at pre-create time.
// Dependencies: crate::{interfaces, server}
// ============================================================================

//! ## Overview
//! Launchers generate account passwords and do not return them. A
//! [`CredentialCapture`] is registered before launch, copies the accounts out
//! of the pre-create request into a slot, and is drained once `launch` has
//! returned, so the slot is never read while the launcher may still write.

use std::sync::Mutex;

use crate::interfaces::CredentialKeys;
use crate::interfaces::LaunchError;
use crate::interfaces::LaunchObserver;
use crate::interfaces::LaunchRequest;
use crate::server::Credentials;

/// Accounts observed during launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAccounts {
    /// Administrative account.
    pub admin: Credentials,
    /// Non-administrative account.
    pub user: Credentials,
}

/// Observer that extracts accounts from the pre-create request.
pub struct CredentialCapture {
    /// Environment keys to read.
    keys: CredentialKeys,
    /// Captured accounts; written once by the observer.
    slot: Mutex<Option<CapturedAccounts>>,
}

impl CredentialCapture {
    /// Creates an empty capture for `keys`.
    #[must_use]
    pub const fn new(keys: CredentialKeys) -> Self {
        Self {
            keys,
            slot: Mutex::new(None),
        }
    }

    /// Takes the captured accounts.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Observer`] when the launcher never reported them.
    pub fn take(&self) -> Result<CapturedAccounts, LaunchError> {
        self.slot
            .lock()
            .map_err(|_| LaunchError::Observer("credential slot poisoned".to_string()))?
            .take()
            .ok_or_else(|| {
                LaunchError::Observer("launcher did not report server credentials".to_string())
            })
    }
}

impl LaunchObserver for CredentialCapture {
    fn on_pre_create(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        let lookup = |key: &str| {
            request
                .env
                .get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| LaunchError::Observer(format!("launch environment lacks {key}")))
        };
        let username = lookup(&self.keys.user_env)?;
        let password = lookup(&self.keys.user_password_env)?;
        // Images that only take a user password reuse it for the admin account.
        let admin_password = lookup(&self.keys.admin_password_env).unwrap_or_else(|_| password.clone());
        let accounts = CapturedAccounts {
            admin: Credentials::new(self.keys.admin_username.clone(), admin_password),
            user: Credentials::new(username, password),
        };
        *self
            .slot
            .lock()
            .map_err(|_| LaunchError::Observer("credential slot poisoned".to_string()))? =
            Some(accounts);
        Ok(())
    }
}
