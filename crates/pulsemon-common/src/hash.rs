//! HMAC-SHA256 integrity tags for requests and responses.
//!
//! Tags travel as lowercase hex in the `HashSHA256` header (HTTP) or the
//! `hashsha256` metadata entry (gRPC).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the integrity tag of `data` under the shared secret `key`.
pub fn sign(key: &str, data: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a received hex-encoded tag in constant time.
pub fn verify(key: &str, data: &[u8], tag: &str) -> bool {
    let Ok(expected) = hex::decode(tag) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}
