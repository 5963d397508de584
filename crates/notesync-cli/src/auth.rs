//! Access token persistence in the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use notesync_core::oauth::AccessToken;

use crate::error::CliError;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "notesync-cli";

#[derive(Clone)]
struct TokenStore {
    username: String,
}

impl TokenStore {
    fn new(profile_name: &str) -> Self {
        Self {
            username: format!("access_token:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> Result<Entry, CliError> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| CliError::Keychain(error.to_string()))
    }

    #[cfg(not(test))]
    fn load(&self) -> Result<Option<AccessToken>, CliError> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(CliError::Keychain(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load(&self) -> Result<Option<AccessToken>, CliError> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Keychain(error.to_string()))?;
        match guard.get(&self.username) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    #[cfg(not(test))]
    fn save(&self, token: &AccessToken) -> Result<(), CliError> {
        let raw = serde_json::to_string(token)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| CliError::Keychain(error.to_string()))
    }

    #[cfg(test)]
    fn save(&self, token: &AccessToken) -> Result<(), CliError> {
        let raw = serde_json::to_string(token)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Keychain(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear(&self) -> Result<(), CliError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(CliError::Keychain(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear(&self) -> Result<(), CliError> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Keychain(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub fn load_access_token(profile_name: &str) -> Result<Option<AccessToken>, CliError> {
    TokenStore::new(profile_name).load()
}

pub fn save_access_token(profile_name: &str, token: &AccessToken) -> Result<(), CliError> {
    TokenStore::new(profile_name).save(token)
}

pub fn clear_access_token(profile_name: &str) -> Result<(), CliError> {
    TokenStore::new(profile_name).clear()
}
