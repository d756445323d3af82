use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;
use url::Url;

pub type BackHandler = Box<dyn Fn() + Send + Sync>;

/// Capability surface the surrounding chat platform provides. The core only
/// consumes this; lifecycle signals, theming and haptics stay on the
/// rendering side.
#[async_trait]
pub trait HostAdapter: Send + Sync {
    /// Whether we run inside the chat client's mini-app surface.
    fn is_embedded(&self) -> bool;

    /// Launch parameters, consumed once at bootstrap.
    fn launch_params(&self) -> HashMap<String, String>;

    /// Ask the user to confirm a disruptive action. May suspend the view.
    async fn confirm(&self, prompt: &str) -> bool;

    /// Outbound deep-link primitive. Fire and forget.
    fn open_link(&self, url: &str);

    /// Register the back-navigation handler. Hosts without a back control
    /// ignore it.
    fn on_back(&self, handler: BackHandler) {
        let _ = handler;
    }
}

/// Host for a plain browser tab or desktop run: never embedded, launch
/// parameters taken from an optional launch URL, confirmation implicit.
#[derive(Debug, Default)]
pub struct StandaloneHost {
    params: HashMap<String, String>,
}

impl StandaloneHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse launch parameters from a full URL's query string. An
    /// unparseable URL yields an empty parameter set.
    pub fn from_launch_url(launch_url: &str) -> Self {
        let params = Url::parse(launch_url)
            .map(|u| {
                u.query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self { params }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl HostAdapter for StandaloneHost {
    fn is_embedded(&self) -> bool {
        false
    }

    fn launch_params(&self) -> HashMap<String, String> {
        self.params.clone()
    }

    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }

    fn open_link(&self, url: &str) {
        if let Err(e) = open::that(url) {
            warn!("failed to open link: {e}");
        }
    }
}
