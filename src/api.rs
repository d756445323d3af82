use reqwest::{Client, Method, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Domain, MessageDetail, MessageSummary};

/// Envelope key wrapping every list response from the provider.
const ENVELOPE_KEY: &str = "hydra:member";

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Stateless wrapper over the provider REST API. Holds nothing beyond the
/// reqwest client and base URL; safe to call concurrently.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Request plumbing shared by every endpoint: bearer auth when a token
    /// is supplied, 204 maps to no body, any non-2xx maps to `Error::Api`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), path, "provider request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Some(response.json().await?))
    }

    pub async fn list_domains(&self) -> Result<Vec<Domain>> {
        let value = self.request(Method::GET, "/domains", None, None).await?;
        unwrap_list(value)
    }

    pub async fn create_account(&self, address: &str, password: &str) -> Result<Account> {
        let body = json!({ "address": address, "password": password });
        let value = self
            .request(Method::POST, "/accounts", None, Some(body))
            .await?;
        from_body(value)
    }

    pub async fn issue_token(&self, address: &str, password: &str) -> Result<TokenGrant> {
        let body = json!({ "address": address, "password": password });
        let value = self
            .request(Method::POST, "/token", None, Some(body))
            .await?;
        from_body(value)
    }

    pub async fn list_messages(&self, token: &str) -> Result<Vec<MessageSummary>> {
        let value = self
            .request(Method::GET, "/messages", Some(token), None)
            .await?;
        unwrap_list(value)
    }

    pub async fn get_message(&self, token: &str, id: &str) -> Result<MessageDetail> {
        let path = format!("/messages/{id}");
        let value = self.request(Method::GET, &path, Some(token), None).await?;
        from_body(value)
    }

    /// Mark a message seen. The provider expects a merge-patch payload here
    /// rather than plain JSON.
    pub async fn mark_read(&self, token: &str, id: &str) -> Result<()> {
        let url = format!("{}/messages/{}", self.base_url, id);
        let response = self
            .http
            .patch(&url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/merge-patch+json")
            .body(r#"{"seen":true}"#)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    pub async fn delete_message(&self, token: &str, id: &str) -> Result<()> {
        let path = format!("/messages/{id}");
        self.request(Method::DELETE, &path, Some(token), None)
            .await?;
        Ok(())
    }
}

/// Unwrap the provider's list envelope. A missing envelope key is an empty
/// list, not an error.
fn unwrap_list<T: DeserializeOwned>(value: Option<Value>) -> Result<Vec<T>> {
    let Some(mut value) = value else {
        return Ok(Vec::new());
    };
    match value.get_mut(ENVELOPE_KEY) {
        Some(member) => {
            serde_json::from_value(member.take()).map_err(|e| Error::Payload(e.to_string()))
        }
        None => Ok(Vec::new()),
    }
}

fn from_body<T: DeserializeOwned>(value: Option<Value>) -> Result<T> {
    let value = value.ok_or_else(|| Error::Payload("empty response body".to_string()))?;
    serde_json::from_value(value).map_err(|e| Error::Payload(e.to_string()))
}
