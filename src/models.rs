use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single active mailbox: address, the plaintext credential used for
/// token exchange, and the current short-lived bearer token. Only the
/// session manager mutates this; everyone else reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxIdentity {
    pub address: String,
    pub secret: String,
    pub session_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Domain {
    pub id: String,
    pub domain: String,
    #[serde(rename = "isActive", default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One inbox row. The list is replaced wholesale on every poll, in the
/// order the provider returned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    #[serde(default)]
    pub from: Sender,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub seen: bool,
}

impl MessageSummary {
    pub fn display_subject(&self) -> &str {
        self.subject
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("(No Subject)")
    }

    /// Sender display name, falling back to the local part of the address.
    pub fn display_sender(&self) -> &str {
        if let Some(name) = self.from.name.as_deref().filter(|n| !n.is_empty()) {
            return name;
        }
        self.from.address.split('@').next().unwrap_or("Unknown")
    }
}

/// Full message, fetched lazily when opened. Not cached beyond the
/// currently-viewed message.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDetail {
    pub id: String,
    #[serde(default)]
    pub from: Sender,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<Vec<String>>,
}

impl MessageDetail {
    /// Authoritative body: plain text when present, otherwise the first
    /// HTML variant.
    pub fn body(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.html.as_ref()?.first().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(subject: Option<&str>, name: Option<&str>, address: &str) -> MessageSummary {
        MessageSummary {
            id: "m1".to_string(),
            from: Sender {
                address: address.to_string(),
                name: name.map(str::to_string),
            },
            subject: subject.map(str::to_string),
            intro: None,
            created_at: Utc::now(),
            seen: false,
        }
    }

    #[test]
    fn test_display_subject_fallback() {
        assert_eq!(summary(None, None, "a@b.c").display_subject(), "(No Subject)");
        assert_eq!(summary(Some(""), None, "a@b.c").display_subject(), "(No Subject)");
        assert_eq!(summary(Some("Hi"), None, "a@b.c").display_subject(), "Hi");
    }

    #[test]
    fn test_display_sender_prefers_name() {
        assert_eq!(summary(None, Some("Alice"), "alice@x.y").display_sender(), "Alice");
        assert_eq!(summary(None, None, "alice@x.y").display_sender(), "alice");
    }

    #[test]
    fn test_detail_body_prefers_text() {
        let detail = MessageDetail {
            id: "m1".to_string(),
            from: Sender::default(),
            subject: None,
            created_at: Utc::now(),
            seen: false,
            text: Some("plain".to_string()),
            html: Some(vec!["<p>rich</p>".to_string()]),
        };
        assert_eq!(detail.body(), Some("plain"));

        let html_only = MessageDetail {
            text: None,
            ..detail.clone()
        };
        assert_eq!(html_only.body(), Some("<p>rich</p>"));

        let empty = MessageDetail {
            text: Some(String::new()),
            html: None,
            ..detail
        };
        assert_eq!(empty.body(), None);
    }
}
