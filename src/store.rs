use std::sync::{Arc, Mutex};

use keyring::Entry;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::MailboxIdentity;

/// Fixed key the identity record lives under, one per client profile.
const IDENTITY_KEY: &str = "mailbox_identity";

/// Durable storage for the single active identity. No expiry metadata is
/// kept; staleness is only discovered by a failed authenticated call.
pub trait CredentialStore: Send + Sync {
    /// Persist the identity, overwriting any prior value.
    fn save(&self, identity: &MailboxIdentity) -> Result<()>;
    /// Last saved identity, or None on absence or an unreadable record.
    fn load(&self) -> Option<MailboxIdentity>;
    fn clear(&self) -> Result<()>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn save(&self, identity: &MailboxIdentity) -> Result<()> {
        (**self).save(identity)
    }

    fn load(&self) -> Option<MailboxIdentity> {
        (**self).load()
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

/// Identity record serialized as JSON into the platform keyring.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, IDENTITY_KEY).map_err(|e| Error::Store(e.to_string()))
    }
}

impl CredentialStore for KeyringStore {
    fn save(&self, identity: &MailboxIdentity) -> Result<()> {
        let serialized =
            serde_json::to_string(identity).map_err(|e| Error::Store(e.to_string()))?;
        self.entry()?
            .set_password(&serialized)
            .map_err(|e| Error::Store(e.to_string()))
    }

    fn load(&self) -> Option<MailboxIdentity> {
        let entry = self.entry().ok()?;
        match entry.get_password() {
            Ok(serialized) => match serde_json::from_str(&serialized) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!("discarding unreadable identity record: {e}");
                    None
                }
            },
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("keyring read failed: {e}");
                None
            }
        }
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Store(e.to_string())),
        }
    }
}

/// In-memory store for tests and throwaway sessions. Goes through the same
/// JSON round trip as the durable stores.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn save(&self, identity: &MailboxIdentity) -> Result<()> {
        let serialized =
            serde_json::to_string(identity).map_err(|e| Error::Store(e.to_string()))?;
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(serialized);
        }
        Ok(())
    }

    fn load(&self) -> Option<MailboxIdentity> {
        let slot = self.slot.lock().ok()?;
        serde_json::from_str(slot.as_deref()?).ok()
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> MailboxIdentity {
        MailboxIdentity {
            address: "abc123xyz0@example.test".to_string(),
            secret: "s3cr3t!pass".to_string(),
            session_token: "tok-1".to_string(),
            remote_id: Some("acc-1".to_string()),
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().is_none());

        store.save(&identity()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.address, "abc123xyz0@example.test");
        assert_eq!(loaded.session_token, "tok-1");

        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_overwrites_prior_value() {
        let store = MemoryStore::new();
        store.save(&identity()).unwrap();

        let mut replacement = identity();
        replacement.session_token = "tok-2".to_string();
        store.save(&replacement).unwrap();

        assert_eq!(store.load().unwrap().session_token, "tok-2");
    }
}
