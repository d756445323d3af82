//! Command surface and observer wiring around the session machine.
//!
//! The rendering layer is a pure consumer: it subscribes to [`Event`]s and
//! issues intents (`generate`, `refresh`, `open`, `delete`, `toggle_sync`,
//! `navigate`). All session mutation happens behind the controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::bridge;
use crate::config::Config;
use crate::error::Error;
use crate::host::HostAdapter;
use crate::models::{MailboxIdentity, MessageDetail, MessageSummary};
use crate::session::{SessionManager, SessionState};
use crate::store::CredentialStore;

/// Which view the rendering layer currently shows. Polling only runs on the
/// inbox page with no message open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Mail,
    Inbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Success,
    Error,
}

/// State-change notifications for the rendering layer.
#[derive(Debug, Clone)]
pub enum Event {
    SessionChanged(SessionState),
    IdentityReady(MailboxIdentity),
    InboxReplaced(Vec<MessageSummary>),
    MessageOpened(MessageDetail),
    MessageDeleted(String),
    PageChanged(Page),
    Notice(Notice, String),
}

pub struct MailboxController<S, H> {
    weak: Weak<Self>,
    config: Config,
    host: H,
    session: tokio::sync::Mutex<SessionManager<S>>,
    messages: Mutex<Vec<MessageSummary>>,
    page: Mutex<Page>,
    reading: AtomicBool,
    in_flight: AtomicBool,
    poller: Mutex<Option<JoinHandle<()>>>,
    subscribers: Mutex<Vec<UnboundedSender<Event>>>,
}

impl<S, H> MailboxController<S, H>
where
    S: CredentialStore + 'static,
    H: HostAdapter + 'static,
{
    pub fn new(config: Config, store: S, host: H) -> Arc<Self> {
        let api = ApiClient::new(config.api_base.clone());
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            config,
            host,
            session: tokio::sync::Mutex::new(SessionManager::new(api, store)),
            messages: Mutex::new(Vec::new()),
            page: Mutex::new(Page::Mail),
            reading: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            poller: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn subscribe(&self) -> UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    fn emit(&self, event: Event) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub async fn session_state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    pub async fn identity(&self) -> Option<MailboxIdentity> {
        self.session.lock().await.identity().cloned()
    }

    /// Snapshot of the current in-memory inbox.
    pub fn messages(&self) -> Vec<MessageSummary> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn page(&self) -> Page {
        self.page.lock().map(|p| *p).unwrap_or_default()
    }

    /// Resolve the initial identity: inbound handoff first, then the
    /// persisted record (verified by a first refresh), then automatic
    /// provisioning in standalone mode. Embedded with nothing to resume
    /// stays Unprovisioned so the companion bot remains the identity owner.
    pub async fn bootstrap(&self) {
        self.install_back_handler();
        let params = self.host.launch_params();

        if let Some((address, secret)) = bridge::decode_launch(&params) {
            let adopted = { self.session.lock().await.adopt(address, secret).await };
            match adopted {
                Ok(identity) => {
                    self.emit(Event::IdentityReady(identity));
                    self.emit(Event::SessionChanged(SessionState::Active));
                    self.emit(Event::Notice(Notice::Success, "Mailbox synced".to_string()));
                    if params.get("page").map(String::as_str) == Some("inbox") {
                        self.navigate(Page::Inbox);
                    }
                    return;
                }
                // Fall through to normal loading; a stale handoff token is
                // not an error the user can act on.
                Err(e) => debug!("inbound handoff rejected: {e}"),
            }
        }

        let restored = { self.session.lock().await.restore() };
        if restored {
            if let Some(identity) = self.identity().await {
                self.emit(Event::IdentityReady(identity));
            }
            self.emit(Event::SessionChanged(SessionState::Active));
            self.refresh().await;
        } else if self.host.is_embedded() {
            self.emit(Event::SessionChanged(SessionState::Unprovisioned));
            self.emit(Event::Notice(
                Notice::Info,
                "Generate a mailbox in the companion bot to sync it here".to_string(),
            ));
        } else {
            self.generate().await;
        }
    }

    /// Provision a fresh throwaway identity, replacing any current one.
    pub async fn generate(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return;
        }
        self.emit(Event::SessionChanged(SessionState::Provisioning));

        let result = { self.session.lock().await.provision().await };
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(identity) => {
                if let Ok(mut messages) = self.messages.lock() {
                    messages.clear();
                }
                self.emit(Event::IdentityReady(identity));
                self.emit(Event::SessionChanged(SessionState::Active));
                self.emit(Event::InboxReplaced(Vec::new()));
                self.emit(Event::Notice(Notice::Success, "New email created".to_string()));
            }
            Err(e) => {
                warn!("provisioning failed: {e}");
                self.emit(Event::SessionChanged(SessionState::Unprovisioned));
                self.emit(Event::Notice(Notice::Error, "Failed to create email".to_string()));
            }
        }
    }

    /// Full-replace inbox poll. A refresh arriving while one is in flight is
    /// dropped, not deferred.
    pub async fn refresh(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("refresh dropped: request already in flight");
            return;
        }
        let result = { self.session.lock().await.list_inbox().await };
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(list) => {
                if let Ok(mut messages) = self.messages.lock() {
                    *messages = list.clone();
                }
                self.emit(Event::InboxReplaced(list));
            }
            Err(Error::SessionExpired) => self.handle_expiry().await,
            Err(e) => {
                warn!("inbox refresh failed: {e}");
                self.emit(Event::Notice(Notice::Error, "Failed to load inbox".to_string()));
            }
        }
    }

    /// Open a message for reading. Polling stays suspended until
    /// [`close_message`](Self::close_message); the read receipt is
    /// best-effort and mirrored into the in-memory summary immediately.
    pub async fn open(&self, id: &str) {
        if self.identity().await.is_none() {
            self.emit(Event::Notice(Notice::Error, "No active mailbox".to_string()));
            return;
        }
        self.reading.store(true, Ordering::SeqCst);
        let result = { self.session.lock().await.fetch_message(id).await };
        match result {
            Ok(detail) => {
                self.session.lock().await.mark_read(id).await;
                if let Ok(mut messages) = self.messages.lock() {
                    if let Some(summary) = messages.iter_mut().find(|m| m.id == id) {
                        summary.seen = true;
                    }
                }
                self.emit(Event::MessageOpened(detail));
            }
            Err(e) => {
                self.reading.store(false, Ordering::SeqCst);
                warn!("failed to open message {id}: {e}");
                self.emit(Event::Notice(Notice::Error, "Failed to load email".to_string()));
            }
        }
    }

    /// Return from the detail view; polling resumes on the next tick.
    pub fn close_message(&self) {
        self.reading.store(false, Ordering::SeqCst);
    }

    pub async fn delete(&self, id: &str) {
        // Without an identity there is nothing to expire; a stray delete must
        // not be mistaken for a failed renewal.
        if self.identity().await.is_none() {
            self.emit(Event::Notice(Notice::Error, "No active mailbox".to_string()));
            return;
        }
        let result = { self.session.lock().await.delete_message(id).await };
        match result {
            Ok(()) => {
                if let Ok(mut messages) = self.messages.lock() {
                    messages.retain(|m| m.id != id);
                }
                self.close_message();
                self.emit(Event::MessageDeleted(id.to_string()));
                self.emit(Event::Notice(Notice::Success, "Email deleted".to_string()));
            }
            Err(Error::SessionExpired) => self.handle_expiry().await,
            Err(e) => {
                warn!("failed to delete message {id}: {e}");
                self.emit(Event::Notice(Notice::Error, "Failed to delete email".to_string()));
            }
        }
    }

    /// Hand the identity to the companion bot. One-way: `false` is a no-op
    /// because there is no acknowledgment channel to tear down, and the next
    /// launch's `auth` parameter is the only confirmation that the handoff
    /// landed.
    pub async fn toggle_sync(&self, enabled: bool) {
        if !enabled {
            return;
        }
        let Some(identity) = self.identity().await else {
            self.emit(Event::Notice(Notice::Error, "No mailbox to sync".to_string()));
            return;
        };
        if bridge::initiate_handoff(&self.host, &self.config.bot_link, &identity).await {
            self.emit(Event::Notice(
                Notice::Info,
                "Continue in the companion bot".to_string(),
            ));
        }
    }

    pub fn navigate(&self, page: Page) {
        if let Ok(mut current) = self.page.lock() {
            if *current == page {
                return;
            }
            *current = page;
        }
        self.emit(Event::PageChanged(page));
        if page == Page::Inbox {
            self.spawn_refresh();
        }
    }

    /// Back navigation: close an open message first, otherwise leave the
    /// inbox for the mail page.
    pub fn handle_back(&self) {
        if self.reading.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut current) = self.page.lock() {
            if *current != Page::Inbox {
                return;
            }
            *current = Page::Mail;
        }
        self.emit(Event::PageChanged(Page::Mail));
    }

    /// Arm the repeating poll. Ticks are skipped while off the inbox page,
    /// while a message is open, or while a refresh is already in flight.
    pub fn start_polling(&self, interval: Duration) {
        self.stop_polling();
        let weak = self.weak.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.poll_tick().await;
            }
        });
        if let Ok(mut poller) = self.poller.lock() {
            *poller = Some(handle);
        }
    }

    /// Immediate and idempotent; stopping a stopped poller is a no-op.
    pub fn stop_polling(&self) {
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(handle) = poller.take() {
                handle.abort();
            }
        }
    }

    async fn poll_tick(&self) {
        if self.page() != Page::Inbox || self.reading.load(Ordering::SeqCst) {
            return;
        }
        self.refresh().await;
    }

    async fn handle_expiry(&self) {
        self.emit(Event::SessionChanged(SessionState::Expired));
        if self.host.is_embedded() {
            // The companion bot may still reference this mailbox; prompt
            // instead of silently replacing it.
            self.emit(Event::Notice(
                Notice::Info,
                "Mailbox expired. Generate a new one in the companion bot".to_string(),
            ));
        } else {
            info!("session expired; provisioning a replacement");
            self.generate().await;
        }
    }

    fn spawn_refresh(&self) {
        if let Some(controller) = self.weak.upgrade() {
            tokio::spawn(async move {
                controller.refresh().await;
            });
        }
    }

    fn install_back_handler(&self) {
        let weak = self.weak.clone();
        self.host.on_back(Box::new(move || {
            if let Some(controller) = weak.upgrade() {
                controller.handle_back();
            }
        }));
    }
}

impl<S, H> Drop for MailboxController<S, H> {
    fn drop(&mut self) {
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(handle) = poller.take() {
                handle.abort();
            }
        }
    }
}
