//! Webhook signature verification.
//!
//! The provider signs each webhook with HMAC-SHA1 keyed by the account auth
//! token, over the full request URL followed by every form parameter as
//! `key` + `value`, sorted by key. The base64 digest arrives in
//! `X-Twilio-Signature`.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    middleware::Next,
    response::Response,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;
use std::sync::Arc;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// Webhook forms are small; anything larger is not from the provider.
const MAX_SIGNED_BODY_BYTES: usize = 64 * 1024;

/// Verifies provider webhook signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    auth_token: String,
    public_url: String,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("auth_token", &"[REDACTED]")
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl SignatureVerifier {
    /// `public_url` is the externally visible base URL, without a trailing
    /// slash requirement.
    pub fn new(auth_token: impl Into<String>, public_url: &str) -> Self {
        Self {
            auth_token: auth_token.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Full URL the provider called for a request to `path_and_query`.
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.public_url, path_and_query)
    }

    fn mac(&self, url: &str, params: &[(String, String)]) -> Result<HmacSha1, InvalidLength> {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();

        let mut mac = HmacSha1::new_from_slice(self.auth_token.as_bytes())?;
        mac.update(url.as_bytes());
        for (key, value) in sorted {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }
        Ok(mac)
    }

    /// Computes the base64 signature for `url` and form `params`.
    pub fn sign(&self, url: &str, params: &[(String, String)]) -> Result<String, InvalidLength> {
        Ok(STANDARD.encode(self.mac(url, params)?.finalize().into_bytes()))
    }

    /// Checks `signature` in constant time. A key the MAC rejects fails closed.
    pub fn verify(&self, url: &str, params: &[(String, String)], signature: &str) -> bool {
        let Ok(expected) = STANDARD.decode(signature.trim()) else {
            return false;
        };
        match self.mac(url, params) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "webhook signing key rejected");
                false
            }
        }
    }
}

/// Rejects webhooks whose signature does not verify.
///
/// A no-op unless the state carries a [`SignatureVerifier`].
pub async fn verify_signature(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::InternalServerError("application state missing".to_string()))?
        .clone();

    let Some(verifier) = state.signatures.as_ref() else {
        return Ok(next.run(req).await);
    };

    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Forbidden("missing webhook signature".to_string()))?;

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_SIGNED_BODY_BYTES)
        .await
        .map_err(|_| ApiError::Forbidden("webhook body too large".to_string()))?;
    let params: Vec<(String, String)> = url::form_urlencoded::parse(&bytes)
        .into_owned()
        .collect();

    let url = verifier.url_for(&path_and_query);
    if !verifier.verify(&url, &params, &signature) {
        tracing::warn!(url = %url, "webhook signature mismatch");
        return Err(ApiError::Forbidden("invalid webhook signature".to_string()));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
