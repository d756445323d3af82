//! Session and synchronization core for a disposable-email chat mini app.
//!
//! Provisions throwaway mailboxes against the provider REST API, keeps the
//! bearer session alive across token expiry, polls the inbox on a timer, and
//! hands the identity off to a companion bot through a one-way deep link.
//! Rendering is someone else's job: subscribe to [`controller::Event`]s and
//! drive the [`controller::MailboxController`] command surface.

pub mod api;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod models;
pub mod session;
pub mod store;

pub use config::Config;
pub use controller::{Event, MailboxController, Notice, Page};
pub use error::{Error, Result};
pub use host::{HostAdapter, StandaloneHost};
pub use models::{MailboxIdentity, MessageDetail, MessageSummary};
pub use session::SessionState;
pub use store::{CredentialStore, KeyringStore, MemoryStore};
