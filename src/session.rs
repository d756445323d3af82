//! The mailbox session state machine.
//!
//! Owns the single active identity and every mutation of it: provisioning,
//! adoption of an identity handed in from the companion bot, token renewal
//! on authorization failure, and expiry. Authenticated calls retry exactly
//! once after a renewal; a second consecutive authorization failure expires
//! the session and clears persisted state.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::{MailboxIdentity, MessageDetail, MessageSummary};
use crate::store::CredentialStore;

const LOCAL_PART_LEN: usize = 10;
const LOCAL_PART_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_LEN: usize = 12;
const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unprovisioned,
    Provisioning,
    Active,
    Refreshing,
    Expired,
}

pub struct SessionManager<S> {
    api: ApiClient,
    store: S,
    identity: Option<MailboxIdentity>,
    state: SessionState,
}

impl<S: CredentialStore> SessionManager<S> {
    pub fn new(api: ApiClient, store: S) -> Self {
        Self {
            api,
            store,
            identity: None,
            state: SessionState::Unprovisioned,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&MailboxIdentity> {
        self.identity.as_ref()
    }

    /// Pick up the persisted identity, if any. Does not validate it;
    /// staleness surfaces on the first authenticated call.
    pub fn restore(&mut self) -> bool {
        match self.store.load() {
            Some(identity) => {
                debug!(address = %identity.address, "restored persisted identity");
                self.identity = Some(identity);
                self.state = SessionState::Active;
                true
            }
            None => false,
        }
    }

    /// Provision a fresh throwaway mailbox: active domain, random
    /// credentials, account creation, token exchange. Partial failure drops
    /// back to Unprovisioned; a remote account already created at that point
    /// is abandoned, not rolled back.
    pub async fn provision(&mut self) -> Result<MailboxIdentity> {
        self.state = SessionState::Provisioning;
        match self.provision_inner().await {
            Ok(identity) => {
                self.state = SessionState::Active;
                Ok(identity)
            }
            Err(e) => {
                self.identity = None;
                self.state = SessionState::Unprovisioned;
                Err(e)
            }
        }
    }

    async fn provision_inner(&mut self) -> Result<MailboxIdentity> {
        let domains = self.api.list_domains().await?;
        let domain = domains
            .into_iter()
            .find(|d| d.is_active)
            .ok_or(Error::NoActiveDomain)?;

        let address = format!("{}@{}", random_local_part(), domain.domain);
        let password = random_password();

        let account = self.api.create_account(&address, &password).await?;
        let grant = self.api.issue_token(&address, &password).await?;

        info!(%address, "provisioned mailbox");
        let identity = MailboxIdentity {
            address,
            secret: password,
            session_token: grant.token,
            remote_id: Some(account.id),
        };
        self.install(identity.clone());
        Ok(identity)
    }

    /// Replace the active identity with one handed in from outside (inbound
    /// bot handoff), exchanging its credentials for a token. On failure the
    /// current identity is left untouched.
    pub async fn adopt(&mut self, address: String, secret: String) -> Result<MailboxIdentity> {
        let grant = self.api.issue_token(&address, &secret).await?;
        info!(%address, "adopted identity from handoff");
        let identity = MailboxIdentity {
            address,
            secret,
            session_token: grant.token,
            remote_id: grant.id,
        };
        self.install(identity.clone());
        self.state = SessionState::Active;
        Ok(identity)
    }

    /// Re-exchange the stored credentials for a fresh token. Failure expires
    /// the session: identity dropped, persisted record cleared.
    pub async fn renew(&mut self) -> Result<()> {
        let Some(identity) = self.identity.clone() else {
            return Err(Error::SessionExpired);
        };
        self.state = SessionState::Refreshing;
        match self.api.issue_token(&identity.address, &identity.secret).await {
            Ok(grant) => {
                let mut renewed = identity;
                renewed.session_token = grant.token;
                self.install(renewed);
                self.state = SessionState::Active;
                Ok(())
            }
            Err(e) => {
                warn!("token renewal failed: {e}");
                self.expire();
                Err(Error::SessionExpired)
            }
        }
    }

    /// Drop the identity and clear persisted state. Terminal until a new
    /// identity is provisioned or adopted.
    pub fn expire(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!("failed to clear identity store: {e}");
        }
        self.identity = None;
        self.state = SessionState::Expired;
    }

    fn install(&mut self, identity: MailboxIdentity) {
        if let Err(e) = self.store.save(&identity) {
            warn!("failed to persist identity: {e}");
        }
        self.identity = Some(identity);
    }

    fn token(&self) -> Option<String> {
        self.identity.as_ref().map(|i| i.session_token.clone())
    }

    /// Full inbox fetch for the active identity. No identity yields an empty
    /// list, not an error.
    pub async fn list_inbox(&mut self) -> Result<Vec<MessageSummary>> {
        let Some(token) = self.token() else {
            return Ok(Vec::new());
        };
        match self.api.list_messages(&token).await {
            Err(e) if e.is_auth() => {
                self.renew().await?;
                let token = self.token().ok_or(Error::SessionExpired)?;
                match self.api.list_messages(&token).await {
                    Err(e) if e.is_auth() => {
                        self.expire();
                        Err(Error::SessionExpired)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    pub async fn fetch_message(&mut self, id: &str) -> Result<MessageDetail> {
        let token = self.token().ok_or(Error::SessionExpired)?;
        match self.api.get_message(&token, id).await {
            Err(e) if e.is_auth() => {
                self.renew().await?;
                let token = self.token().ok_or(Error::SessionExpired)?;
                match self.api.get_message(&token, id).await {
                    Err(e) if e.is_auth() => {
                        self.expire();
                        Err(Error::SessionExpired)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Best-effort read receipt; failures are logged and ignored.
    pub async fn mark_read(&mut self, id: &str) {
        if let Some(token) = self.token() {
            if let Err(e) = self.api.mark_read(&token, id).await {
                debug!("mark-read failed for {id}: {e}");
            }
        }
    }

    pub async fn delete_message(&mut self, id: &str) -> Result<()> {
        let token = self.token().ok_or(Error::SessionExpired)?;
        match self.api.delete_message(&token, id).await {
            Err(e) if e.is_auth() => {
                self.renew().await?;
                let token = self.token().ok_or(Error::SessionExpired)?;
                match self.api.delete_message(&token, id).await {
                    Err(e) if e.is_auth() => {
                        self.expire();
                        Err(Error::SessionExpired)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }
}

fn sample(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// 10 lowercase-alphanumeric characters. Throwaway credentials: uniform
/// per-character choice is enough to avoid collisions on the shared domain.
pub(crate) fn random_local_part() -> String {
    sample(LOCAL_PART_ALPHABET, LOCAL_PART_LEN)
}

/// 12 characters from the alphanumeric-plus-symbol set.
pub(crate) fn random_password() -> String {
    sample(PASSWORD_ALPHABET, PASSWORD_LEN)
}
