//! E2EE crypto utilities — server-side helpers.
//!
//! The server deliberately does NOT perform Signal-protocol cryptography or
//! decrypt anything. This module contains only:
//!
//! - **Admission HMAC** — verifying the `x-auth` header over `path+query+sep+body`.
//! - **Account digests** — `SHA-256(account_token)` and `HMAC-SHA256(server_key, uid)`.
//! - **Signed prekey verification** — Ed25519 `verify(ik_pub, spk_sig, spk_pub)`.
//! - **Base64url helpers** shared across the API and repository layers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine as _};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Separators accepted between `path+query` and `body` when computing the
/// admission HMAC. Both are tried; either match admits the request.
pub const ADMISSION_SEPARATORS: [&str; 2] = ["|", "\n"];

/// Compute `base64url(HMAC-SHA256(secret, msg))`.
fn hmac_b64url(secret: &[u8], msg: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(msg);
    B64URL.encode(mac.finalize().into_bytes())
}

/// Verify the admission HMAC header against `path_and_query` + `body`.
///
/// Tries both the `|` and `\n` separators, comparing in constant time; either
/// match admits the request. Returns `false` on any mismatch — callers must
/// not reveal which separator (if any) was attempted.
pub fn verify_admission_hmac(secret: &[u8], path_and_query: &str, body: &[u8], provided: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let mut any_match = false;
    for sep in ADMISSION_SEPARATORS {
        let mut msg = Vec::with_capacity(path_and_query.len() + sep.len() + body.len());
        msg.extend_from_slice(path_and_query.as_bytes());
        msg.extend_from_slice(sep.as_bytes());
        msg.extend_from_slice(body);
        let expected = hmac_b64url(secret, &msg);
        let expected_bytes = expected.as_bytes();
        // Length mismatch is not secret; only the byte comparison itself
        // needs to run in constant time.
        let matches = expected_bytes.len() == provided_bytes.len()
            && bool::from(expected_bytes.ct_eq(provided_bytes));
        // `|=` rather than short-circuiting `||` so both separators are
        // always attempted — no early exit that could leak which matched.
        any_match |= matches;
    }
    any_match
}

/// Derive `uid_digest = HMAC-SHA256(server_key, normalized_uid)`, returned as
/// uppercase hex (64 chars).
pub fn uid_digest(server_key: &[u8], uid: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(server_key).expect("HMAC accepts any key length");
    mac.update(uid.as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

/// Derive `account_digest = SHA-256(account_token)`, returned as uppercase
/// hex (64 chars).
pub fn sha256_hex_upper(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode_upper(digest)
}

/// Generate a random account token of `len` bytes (clamped to `max_len`),
/// base64url-encoded.
pub fn generate_account_token(len: usize, max_len: usize) -> String {
    let len = len.min(max_len).max(1);
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    B64URL.encode(bytes)
}

/// Verify `Ed25519_verify(ik_pub, spk_sig, spk_pub)` — the signed-prekey
/// binding every publish must satisfy. All inputs are base64url.
pub fn verify_signed_prekey(ik_pub_b64: &str, spk_pub_b64: &str, spk_sig_b64: &str) -> bool {
    let Some(ik_pub) = from_base64url(ik_pub_b64) else {
        return false;
    };
    let Some(spk_pub) = from_base64url(spk_pub_b64) else {
        return false;
    };
    let Some(spk_sig) = from_base64url(spk_sig_b64) else {
        return false;
    };
    let Ok(ik_pub) = <[u8; 32]>::try_from(ik_pub.as_slice()) else {
        return false;
    };
    let Ok(spk_sig) = <[u8; 64]>::try_from(spk_sig.as_slice()) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&ik_pub) else {
        return false;
    };
    let signature = Signature::from_bytes(&spk_sig);
    verifying_key.verify(&spk_pub, &signature).is_ok()
}

/// Encode arbitrary bytes to base64url (no padding).
pub fn to_base64url(bytes: &[u8]) -> String {
    B64URL.encode(bytes)
}

/// Decode base64url to bytes, returning `None` on any structural error.
/// Callers treat `None` as a 400.
pub fn from_base64url(encoded: &str) -> Option<Vec<u8>> {
    B64URL.decode(encoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{SigningKey, Signer};
    use rand_core::OsRng;

    #[test]
    fn admission_hmac_accepts_either_separator() {
        let secret = b"shared-secret";
        let path_and_query = "/d1/tags/exchange?x=1";
        let body = b"{\"ctr\":1}";

        for sep in ADMISSION_SEPARATORS {
            let mut msg = Vec::new();
            msg.extend_from_slice(path_and_query.as_bytes());
            msg.extend_from_slice(sep.as_bytes());
            msg.extend_from_slice(body);
            let tag = hmac_b64url(secret, &msg);
            assert!(verify_admission_hmac(secret, path_and_query, body, &tag));
        }
    }

    #[test]
    fn admission_hmac_rejects_mismatch() {
        let secret = b"shared-secret";
        assert!(!verify_admission_hmac(secret, "/d1/x", b"{}", "not-a-real-tag"));
    }

    #[test]
    fn signed_prekey_roundtrip() {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let ik_pub = to_base64url(signing_key.verifying_key().as_bytes());
        let spk_pub_bytes = [7u8; 32];
        let spk_pub = to_base64url(&spk_pub_bytes);
        let sig = signing_key.sign(&spk_pub_bytes);
        let spk_sig = to_base64url(&sig.to_bytes());

        assert!(verify_signed_prekey(&ik_pub, &spk_pub, &spk_sig));
        assert!(!verify_signed_prekey(&ik_pub, &to_base64url(&[8u8; 32]), &spk_sig));
    }

    #[test]
    fn account_digest_matches_sha256_of_token() {
        let token = "abc123";
        let digest = sha256_hex_upper(token.as_bytes());
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest.to_ascii_uppercase());
    }
}
