//! Admission middleware — every request fails closed unless `x-auth`
//! matches `base64url(HMAC-SHA256(secret, path+query+sep+body))` for
//! either separator. Runs ahead of all route handlers; does not look at
//! per-account identity, which handlers resolve themselves from the body.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::header::HeaderName;
use axum::middleware::Next;
use axum::response::Response;
use relaycore_common::error::RelayError;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
static AUTH_HEADER: HeaderName = HeaderName::from_static("x-auth");

pub async fn admission_middleware(request: Request, next: Next) -> Result<Response, RelayError> {
    let provided = request
        .headers()
        .get(&AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(RelayError::Unauthorized)?;

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| RelayError::BadRequest {
            message: "body too large".into(),
        })?;

    let secret = relaycore_common::config::get().hmac.secret.as_bytes();
    if !relaycore_common::crypto::verify_admission_hmac(secret, &path_and_query, &bytes, &provided) {
        return Err(RelayError::Unauthorized);
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}
