//! Opaque token envelopes for confirmation, password-reset and invitation
//! flows.
//!
//! A token has two halves: the public envelope handed to the user and the
//! hash persisted in the graph. The envelope is
//! `base64url(context;secret;payload)` where the payload is a JSON value
//! the caller wants back at redemption time. Only the SHA-256 of the
//! secret is stored, so a leaked database cannot be replayed.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

const SECRET_LEN: usize = 32;

/// Generate a token for the given context and payload.
///
/// Returns `(envelope, hash)`: the envelope goes to the user, the hash to
/// the database.
pub fn generate_token(context: &str, payload: &serde_json::Value) -> Result<(String, String)> {
    let mut raw = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut raw);
    let secret = hex(&raw);
    let hash = hex(&Sha256::digest(secret.as_bytes()));

    let body = serde_json::to_string(payload).map_err(|e| Error::Marshal(e.to_string()))?;
    let envelope = URL_SAFE_NO_PAD.encode(format!("{context};{secret};{body}"));
    Ok((envelope, hash))
}

/// Decompose an envelope into `(context, secret, payload)`.
///
/// The payload may itself contain `;`, so only the first two separators
/// split.
pub fn split_token(envelope: &str) -> Result<(String, String, serde_json::Value)> {
    let decoded = URL_SAFE_NO_PAD
        .decode(envelope)
        .map_err(|e| Error::Unmarshal(format!("malformed token: {e}")))?;
    let text = String::from_utf8(decoded)
        .map_err(|e| Error::Unmarshal(format!("malformed token: {e}")))?;

    let mut parts = text.splitn(3, ';');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(context), Some(secret), Some(body)) => {
            let payload = serde_json::from_str(body)
                .map_err(|e| Error::Unmarshal(format!("malformed token payload: {e}")))?;
            Ok((context.to_string(), secret.to_string(), payload))
        }
        _ => Err(Error::Unmarshal("malformed token: missing fields".to_string())),
    }
}

/// Check an envelope against a stored hash.
///
/// Malformed envelopes are a non-match, not an error. The comparison is
/// constant-time over the hash bytes.
pub fn is_token_matching(envelope: &str, stored_hash: &str) -> bool {
    let Ok((_, secret, _)) = split_token(envelope) else {
        return false;
    };
    let computed = hex(&Sha256::digest(secret.as_bytes()));
    constant_time_eq(computed.as_bytes(), stored_hash.as_bytes())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_match() {
        let payload = serde_json::json!({"email": "sam@example.com"});
        let (envelope, hash) = generate_token("confirm", &payload).unwrap();
        assert!(is_token_matching(&envelope, &hash));
    }

    #[test]
    fn test_split_roundtrip() {
        let payload = serde_json::json!({"email": "sam@example.com", "note": "a;b;c"});
        let (envelope, _) = generate_token("password_reset", &payload).unwrap();
        let (context, secret, got) = split_token(&envelope).unwrap();
        assert_eq!(context, "password_reset");
        assert_eq!(secret.len(), SECRET_LEN * 2);
        assert_eq!(got, payload);
    }

    #[test]
    fn test_wrong_hash_is_non_match() {
        let (envelope, _) = generate_token("confirm", &serde_json::json!({})).unwrap();
        let (_, other_hash) = generate_token("confirm", &serde_json::json!({})).unwrap();
        assert!(!is_token_matching(&envelope, &other_hash));
    }

    #[test]
    fn test_malformed_envelope_is_non_match() {
        assert!(!is_token_matching("not base64 !!", "deadbeef"));
        assert!(!is_token_matching(&URL_SAFE_NO_PAD.encode("no-separators"), "deadbeef"));
    }

    #[test]
    fn test_tokens_are_unique() {
        let (a, _) = generate_token("confirm", &serde_json::json!({})).unwrap();
        let (b, _) = generate_token("confirm", &serde_json::json!({})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_split_rejects_missing_fields() {
        let envelope = URL_SAFE_NO_PAD.encode("confirm;secret-only");
        assert!(split_token(&envelope).is_err());
    }
}
