//! Admin API key authentication middleware.
//!
//! This middleware intercepts every admin request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it with SHA-256 and compare against the configured admin hash
//! 3. Reject unauthorized requests with HTTP 401
//!
//! The plaintext admin key is never stored server-side; only its SHA-256
//! hex digest lives in configuration.

use crate::{AppState, error::AppError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

/// Admin authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Compare the hex digest against `ADMIN_KEY_HASH`
/// 4. If equal: call the next handler
/// 5. If not: return 401 Unauthorized
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer abc123xyz
/// ```
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Step 1: Extract Authorization header
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    // Step 2: Extract Bearer token
    // Expected format: "Bearer <api_key>"
    let api_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidApiKey)?;

    // Step 3: Hash the API key using SHA-256
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    let key_hash = hex::encode(hasher.finalize());

    // Step 4: Compare against the configured admin key hash
    if !key_hash.eq_ignore_ascii_case(&state.config.admin_key_hash) {
        return Err(AppError::InvalidApiKey);
    }

    // Step 5: Call the next middleware/handler
    Ok(next.run(request).await)
}
