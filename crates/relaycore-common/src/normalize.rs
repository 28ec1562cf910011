//! Normalizers — parse and canonicalize identifiers, counters, and envelopes
//! so every later check is over bytes, not shapes. Every normalizer fails
//! closed: malformed input is rejected here, before any I/O.

use crate::error::RelayError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn bad_request(message: impl Into<String>) -> RelayError {
    RelayError::BadRequest {
        message: message.into(),
    }
}

/// Normalize an account digest: strip non-hex characters, uppercase,
/// require exactly 64 hex characters.
pub fn normalize_account_digest(raw: &str) -> Result<String, RelayError> {
    let hex: String = raw.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if hex.len() != 64 {
        return Err(bad_request("account digest must be 64 hex characters"));
    }
    Ok(hex.to_ascii_uppercase())
}

/// Normalize a device id: trim, reject empty, cap at 120 chars.
pub fn normalize_device_id(raw: &str) -> Result<String, RelayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(bad_request("device id cannot be empty"));
    }
    if trimmed.chars().count() > 120 {
        return Err(bad_request("device id exceeds 120 characters"));
    }
    Ok(trimmed.to_string())
}

static CONVERSATION_ID_RE: OnceLock<Regex> = OnceLock::new();

/// Conversation ids: `[A-Za-z0-9_:-]{8,128}`.
pub fn normalize_conversation_id(raw: &str) -> Result<String, RelayError> {
    let re = CONVERSATION_ID_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_:-]{8,128}$").expect("valid regex"));
    if !re.is_match(raw) {
        return Err(bad_request("conversation id must match [A-Za-z0-9_:-]{8,128}"));
    }
    Ok(raw.to_string())
}

/// Message ids: trimmed, 8-200 chars.
pub fn normalize_message_id(raw: &str) -> Result<String, RelayError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if !(8..=200).contains(&len) {
        return Err(bad_request("message id must be 8-200 characters"));
    }
    Ok(trimmed.to_string())
}

/// UIDs: hex, at least 14 characters.
pub fn normalize_uid(raw: &str) -> Result<String, RelayError> {
    let trimmed = raw.trim();
    if trimmed.len() < 14 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad_request("uid must be hex, at least 14 characters"));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Invite ids: client-supplied, at least 8 characters.
pub fn normalize_invite_id(raw: &str) -> Result<String, RelayError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < 8 {
        return Err(bad_request("invite id must be at least 8 characters"));
    }
    Ok(trimmed.to_string())
}

/// Decode base64url, returning `None` on any structural error. Callers
/// treat `None` as a 400.
pub fn decode_b64url_or_none(raw: &str) -> Option<Vec<u8>> {
    crate::crypto::from_base64url(raw)
}

/// Enforce the secure-message header invariants: `header.device_id` must
/// equal the sender device on the envelope, and `header.n` must equal the
/// counter carried alongside it. Either mismatch means the header and the
/// fields around it disagree about what was actually sent.
pub fn validate_message_header(
    header: &serde_json::Value,
    sender_device_id: &str,
    counter: i64,
) -> Result<(), RelayError> {
    let header_device_id = header
        .get("device_id")
        .and_then(|v| v.as_str())
        .ok_or(RelayError::InvalidWrappedPayload)?;
    if header_device_id != sender_device_id {
        return Err(RelayError::InvalidWrappedPayload);
    }
    let header_n = header
        .get("n")
        .and_then(|v| v.as_i64())
        .ok_or(RelayError::InvalidWrappedPayload)?;
    if header_n != counter {
        return Err(RelayError::InvalidWrappedPayload);
    }
    Ok(())
}

/// Canonicalize a vault direction. Wire vocabulary is `incoming`/`outgoing`;
/// storage vocabulary is [`crate::models::vault::DIRECTION_SEND`] /
/// [`crate::models::vault::DIRECTION_RECV`]. Keeping these distinct lets the
/// wrap-context binding check below validate against what the client
/// actually sent while `latest_state` always filters on the stored form.
pub fn normalize_direction(raw: &str) -> Result<&'static str, RelayError> {
    match raw {
        "outgoing" => Ok(crate::models::vault::DIRECTION_SEND),
        "incoming" => Ok(crate::models::vault::DIRECTION_RECV),
        _ => Err(bad_request("direction must be \"incoming\" or \"outgoing\"")),
    }
}

/// Parse and validate a wrapped message-key envelope:
/// `{v>=1, aead="aes-256-gcm", info="message-key/v1", salt, iv, ct}`.
pub fn validate_wrapped_envelope(raw: &str) -> Result<(), RelayError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| RelayError::InvalidWrappedPayload)?;
    let obj = value.as_object().ok_or(RelayError::InvalidWrappedPayload)?;
    let v = obj.get("v").and_then(|v| v.as_i64()).ok_or(RelayError::InvalidWrappedPayload)?;
    if v < 1 {
        return Err(RelayError::InvalidWrappedPayload);
    }
    if obj.get("aead").and_then(|v| v.as_str()) != Some("aes-256-gcm") {
        return Err(RelayError::InvalidWrappedPayload);
    }
    if obj.get("info").and_then(|v| v.as_str()) != Some("message-key/v1") {
        return Err(RelayError::InvalidWrappedPayload);
    }
    for key in ["salt", "iv", "ct"] {
        if !matches!(obj.get(key), Some(serde_json::Value::String(s)) if !s.is_empty()) {
            return Err(RelayError::InvalidWrappedPayload);
        }
    }
    Ok(())
}

/// Verify that `wrap_context` binds the top-level `(conversationId, messageId,
/// senderDeviceId, targetDeviceId, direction)` exactly. `direction` is checked
/// against the raw wire value the client sent, not the normalized storage form,
/// since that is what the client embedded in the context it signed over.
#[allow(clippy::too_many_arguments)]
pub fn validate_wrap_context(
    raw: &str,
    conversation_id: &str,
    message_id: &str,
    sender_device_id: &str,
    target_device_id: Option<&str>,
    direction: &str,
) -> Result<(), RelayError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| RelayError::InvalidWrapContext)?;
    let obj = value.as_object().ok_or(RelayError::InvalidWrapContext)?;
    let field = |key: &str| obj.get(key).and_then(|v| v.as_str());
    if field("conversationId") != Some(conversation_id) {
        return Err(RelayError::InvalidWrapContext);
    }
    if field("messageId") != Some(message_id) {
        return Err(RelayError::InvalidWrapContext);
    }
    if field("senderDeviceId") != Some(sender_device_id) {
        return Err(RelayError::InvalidWrapContext);
    }
    if field("direction") != Some(direction) {
        return Err(RelayError::InvalidWrapContext);
    }
    if let Some(target) = target_device_id {
        if field("targetDeviceId") != Some(target) {
            return Err(RelayError::InvalidWrapContext);
        }
    }
    Ok(())
}

/// Check that a JSON object carries exactly the allowed top-level keys
/// (fail-closed on unexpected fields — this is how alias/legacy fields
/// on invite-dropbox endpoints are rejected).
pub fn check_exact_keys(value: &serde_json::Value, allowed: &[&str]) -> Result<(), RelayError> {
    let obj = value
        .as_object()
        .ok_or_else(|| RelayError::InviteSchemaMismatch)?;
    let allowed: HashSet<&str> = allowed.iter().copied().collect();
    for key in obj.keys() {
        if !allowed.contains(key.as_str()) {
            return Err(RelayError::InviteSchemaMismatch);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_digest_strips_and_uppercases() {
        let raw = "ab-cd 00" .repeat(8); // contains separators, lowercase hex
        let digest = normalize_account_digest(&raw).unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest.to_ascii_uppercase());
    }

    #[test]
    fn account_digest_rejects_wrong_length() {
        assert!(normalize_account_digest("abc123").is_err());
    }

    #[test]
    fn conversation_id_charset() {
        assert!(normalize_conversation_id("conv-aaaa-bbbb").is_ok());
        assert!(normalize_conversation_id("short").is_err());
        assert!(normalize_conversation_id("has a space here ok").is_err());
    }

    #[test]
    fn direction_maps_wire_vocabulary_to_storage_form() {
        assert_eq!(normalize_direction("outgoing").unwrap(), crate::models::vault::DIRECTION_SEND);
        assert_eq!(normalize_direction("incoming").unwrap(), crate::models::vault::DIRECTION_RECV);
        assert!(normalize_direction("send").is_err());
    }

    #[test]
    fn wrapped_envelope_requires_fixed_shape() {
        let good = serde_json::json!({
            "v": 1, "aead": "aes-256-gcm", "info": "message-key/v1",
            "salt": "c2FsdA", "iv": "aXY", "ct": "Y3Q"
        })
        .to_string();
        assert!(validate_wrapped_envelope(&good).is_ok());

        let wrong_aead = serde_json::json!({
            "v": 1, "aead": "aes-128-gcm", "info": "message-key/v1",
            "salt": "c2FsdA", "iv": "aXY", "ct": "Y3Q"
        })
        .to_string();
        assert!(validate_wrapped_envelope(&wrong_aead).is_err());
    }

    #[test]
    fn wrap_context_rejects_message_id_mismatch() {
        let ctx = serde_json::json!({
            "conversationId": "conv-aaaa-bbbb",
            "messageId": "other-message-id",
            "senderDeviceId": "dev-1",
            "direction": "outgoing"
        })
        .to_string();
        let err = validate_wrap_context(&ctx, "conv-aaaa-bbbb", "msg-id-1234", "dev-1", None, "outgoing")
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidWrapContext));
    }

    #[test]
    fn exact_keys_rejects_unknown_field() {
        let v = serde_json::json!({"inviteId": "x", "legacyField": 1});
        assert!(check_exact_keys(&v, &["inviteId"]).is_err());
        let v2 = serde_json::json!({"inviteId": "x"});
        assert!(check_exact_keys(&v2, &["inviteId"]).is_ok());
    }
}
