//! HMAC-SHA256 webhook signatures
//!
//! The ERP signs the raw request body with the shared secret and sends
//! `sha256=<hex>` in the signature header. Verification must run over the
//! exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use stocksync_domain::constants::WEBHOOK_SIGNATURE_PREFIX;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn digest(secret: &[u8], body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Header value the ERP would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let hex = digest(secret.as_bytes(), body).map(hex::encode).unwrap_or_default();
    format!("{WEBHOOK_SIGNATURE_PREFIX}{hex}")
}

/// Check a signature header against `body`.
///
/// The prefix is optional and the hex digest is case-insensitive. Digests
/// are compared in constant time.
pub fn verify(secret: &str, body: &[u8], header: &str) -> bool {
    let provided = header.trim();
    let provided = provided.strip_prefix(WEBHOOK_SIGNATURE_PREFIX).unwrap_or(provided);

    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    let Some(expected) = digest(secret.as_bytes(), body) else {
        return false;
    };

    provided.ct_eq(&expected).into()
}
