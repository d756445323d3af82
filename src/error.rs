use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no active domain available for provisioning")]
    NoActiveDomain,

    #[error("provider API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("session expired and could not be renewed")]
    SessionExpired,

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected provider payload: {0}")]
    Payload(String),

    #[error("credential storage error: {0}")]
    Store(String),
}

impl Error {
    /// True for the failures that should trigger a one-shot token renewal.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Api { status: 401, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
