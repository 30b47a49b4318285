//! Request signing
//!
//! The control plane authenticates a request by recomputing an HMAC-SHA1
//! over the sorted, URL-encoded and lowercased query string.

use super::error::ApiError;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

/// URL-encodes a value the way Go's `url.QueryEscape` does, with spaces
/// rendered as `%20`
pub fn encode_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Builds the canonical query string: sorted keys, keys and values encoded
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_value(k), encode_value(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Base64 HMAC-SHA1 of the lowercased canonical query
pub fn sign(query: &str, secret_key: &str) -> Result<String, ApiError> {
    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .map_err(|e| ApiError::ParseError(format!("Invalid secret key: {}", e)))?;
    mac.update(query.to_lowercase().as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Returns the canonical query with the `signature` parameter appended
pub fn signed_query(
    params: &BTreeMap<String, String>,
    secret_key: &str,
) -> Result<String, ApiError> {
    let query = canonical_query(params);
    let signature = sign(&query, secret_key)?;
    Ok(format!("{}&signature={}", query, encode_value(&signature)))
}
