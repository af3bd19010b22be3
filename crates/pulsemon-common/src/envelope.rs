//! Outbound envelope assembly: JSON → gzip → optional hybrid encryption.
//!
//! The server applies the inverse transformations in its middleware chain
//! (HTTP) or inline in the gRPC service, so this module only needs the
//! sending half plus the raw gzip primitives both sides share.

use crate::crypto;
use crate::model::Metric;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rsa::RsaPublicKey;
use std::io::{Read, Write};

/// A fully transformed request body ready to be put on the wire.
///
/// `plaintext` is kept alongside the transformed `body` because the HTTP
/// integrity tag is computed over the pre-compression JSON.
pub struct Payload {
    pub plaintext: Vec<u8>,
    pub body: Vec<u8>,
    pub encrypted_key: Option<String>,
}

/// Serializes a batch, compresses it, and seals it when a public key is
/// configured.
pub fn pack(metrics: &[Metric], public_key: Option<&RsaPublicKey>) -> Result<Payload> {
    let plaintext = serde_json::to_vec(metrics).context("failed to serialize metrics")?;
    let compressed = compress(&plaintext).context("failed to compress metrics")?;

    match public_key {
        Some(public_key) => {
            let sealed = crypto::seal(&compressed, public_key)
                .context("failed to encrypt metrics")?;
            Ok(Payload {
                plaintext,
                body: sealed.ciphertext,
                encrypted_key: Some(sealed.encrypted_key),
            })
        }
        None => Ok(Payload {
            plaintext,
            body: compressed,
            encrypted_key: None,
        }),
    }
}

pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
