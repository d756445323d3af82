//! One-way identity handoff to the companion bot.
//!
//! Outbound: the identity is folded into a URL-safe token and embedded in a
//! deep link. Inbound: the bot hands the same token back through the launch
//! parameters on the next start. There is no acknowledgment channel in
//! between.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose;

use crate::host::HostAdapter;
use crate::models::MailboxIdentity;

/// Token format: URL-safe base64 of `address:secret`, padding stripped.
pub fn encode_handoff(identity: &MailboxIdentity) -> String {
    let raw = format!("{}:{}", identity.address, identity.secret);
    general_purpose::URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Recover `(address, secret)` from the `auth` launch parameter. Splits on
/// the FIRST colon, so a secret containing `:` survives; only the address
/// must be colon-free, which the `local@domain` form guarantees. Malformed
/// or missing input yields None, never an error.
pub fn decode_launch(params: &HashMap<String, String>) -> Option<(String, String)> {
    let token = params.get("auth")?;
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(token.trim_end_matches('='))
        .ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (address, secret) = decoded.split_once(':')?;
    if address.is_empty() || secret.is_empty() {
        return None;
    }
    Some((address.to_string(), secret.to_string()))
}

/// Deep link carrying the encoded identity to the companion bot.
pub fn handoff_url(bot_link: &str, identity: &MailboxIdentity) -> String {
    format!("{}?start=SYNC_{}", bot_link, encode_handoff(identity))
}

/// Confirm with the user, then fire the outbound link. Returns whether the
/// link was opened; whether the bot ever received it is only learned from
/// the next launch's `auth` parameter.
pub async fn initiate_handoff<H: HostAdapter + ?Sized>(
    host: &H,
    bot_link: &str,
    identity: &MailboxIdentity,
) -> bool {
    if !host
        .confirm("Open the companion bot to sync this mailbox?")
        .await
    {
        return false;
    }
    host.open_link(&handoff_url(bot_link, identity));
    true
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;

    use super::*;

    fn identity(address: &str, secret: &str) -> MailboxIdentity {
        MailboxIdentity {
            address: address.to_string(),
            secret: secret.to_string(),
            session_token: "tok".to_string(),
            remote_id: None,
        }
    }

    fn params_with_auth(token: &str) -> HashMap<String, String> {
        HashMap::from([("auth".to_string(), token.to_string())])
    }

    #[test]
    fn test_handoff_round_trip() {
        let id = identity("k3j2h1g0f9@example.test", "Tr0ub4dor!@#");
        let token = encode_handoff(&id);
        let (address, secret) = decode_launch(&params_with_auth(&token)).unwrap();
        assert_eq!(address, id.address);
        assert_eq!(secret, id.secret);
    }

    #[test]
    fn test_decode_tolerates_colon_in_secret() {
        let id = identity("abc@example.test", "se:cr:et");
        let token = encode_handoff(&id);
        let (address, secret) = decode_launch(&params_with_auth(&token)).unwrap();
        assert_eq!(address, "abc@example.test");
        assert_eq!(secret, "se:cr:et");
    }

    #[test]
    fn test_decode_tolerates_padded_token() {
        let raw = general_purpose::URL_SAFE.encode("abc@example.test:pw");
        assert!(raw.ends_with('='));
        let decoded = decode_launch(&params_with_auth(&raw)).unwrap();
        assert_eq!(decoded.0, "abc@example.test");
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert!(decode_launch(&HashMap::new()).is_none());
        assert!(decode_launch(&params_with_auth("%%%not-base64%%%")).is_none());

        // Valid base64 but no separator.
        let no_colon = general_purpose::URL_SAFE_NO_PAD.encode("nodelimiter");
        assert!(decode_launch(&params_with_auth(&no_colon)).is_none());

        // Empty halves.
        let empty_secret = general_purpose::URL_SAFE_NO_PAD.encode("abc@example.test:");
        assert!(decode_launch(&params_with_auth(&empty_secret)).is_none());
    }

    #[test]
    fn test_handoff_url_shape() {
        let id = identity("abc@example.test", "pw");
        let url = handoff_url("https://t.me/somebot", &id);
        assert!(url.starts_with("https://t.me/somebot?start=SYNC_"));

        let token = url.split("SYNC_").nth(1).unwrap();
        assert!(!token.contains('+'), "token must be URL-safe: {token}");
        assert!(!token.contains('/'), "token must be URL-safe: {token}");
        assert!(!token.contains('='), "padding must be stripped: {token}");
    }
}
