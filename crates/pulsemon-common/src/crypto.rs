//! Hybrid encryption for request bodies.
//!
//! The payload is sealed with a fresh AES-256-GCM key; the wire format is
//! `nonce (12 bytes) || ciphertext+tag`. The AES key itself is encrypted
//! with RSA-OAEP-SHA256 under the receiver's public key and travels
//! base64-encoded in the `Encrypted-AES-Key` header / metadata entry.

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::sha2::Sha256;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use std::path::Path;

const AES_KEY_LEN: usize = 32;

/// A sealed payload plus the RSA-encrypted key that unlocks it.
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub encrypted_key: String,
}

/// Loads a PEM-encoded RSA public key (`PUBLIC KEY` block, PKIX layout).
pub fn load_public_key(path: impl AsRef<Path>) -> Result<RsaPublicKey> {
    let path = path.as_ref();
    RsaPublicKey::read_public_key_pem_file(path)
        .with_context(|| format!("failed to read public key from {}", path.display()))
}

/// Loads a PEM-encoded RSA private key (`PRIVATE KEY` block, PKCS#8 layout).
pub fn load_private_key(path: impl AsRef<Path>) -> Result<RsaPrivateKey> {
    let path = path.as_ref();
    RsaPrivateKey::read_pkcs8_pem_file(path)
        .with_context(|| format!("failed to read private key from {}", path.display()))
}

/// Encrypts `plaintext` under a fresh AES key and wraps that key for the
/// holder of `public_key`.
pub fn seal(plaintext: &[u8], public_key: &RsaPublicKey) -> Result<Sealed> {
    let rng = SystemRandom::new();

    let mut aes_key = [0u8; AES_KEY_LEN];
    rng.fill(&mut aes_key)
        .map_err(|_| anyhow!("failed to generate AES key"))?;

    let unbound =
        UnboundKey::new(&AES_256_GCM, &aes_key).map_err(|_| anyhow!("invalid AES key"))?;
    let key = LessSafeKey::new(unbound);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| anyhow!("failed to generate nonce"))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| anyhow!("AES-GCM encryption failed"))?;

    let mut ciphertext = nonce_bytes.to_vec();
    ciphertext.extend_from_slice(&in_out);

    let wrapped = public_key
        .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), &aes_key)
        .context("failed to encrypt AES key")?;

    Ok(Sealed {
        ciphertext,
        encrypted_key: general_purpose::STANDARD.encode(wrapped),
    })
}

/// Inverse of [`seal`]: unwraps the AES key with `private_key` and opens the
/// `nonce || ciphertext+tag` payload.
pub fn open(data: &[u8], encrypted_key: &str, private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let wrapped = general_purpose::STANDARD
        .decode(encrypted_key)
        .context("failed to decode encrypted AES key")?;
    let aes_key = private_key
        .decrypt(Oaep::new::<Sha256>(), &wrapped)
        .context("failed to decrypt AES key")?;

    if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        bail!("encrypted payload is too short");
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);

    let unbound =
        UnboundKey::new(&AES_256_GCM, &aes_key).map_err(|_| anyhow!("invalid AES key"))?;
    let key = LessSafeKey::new(unbound);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| anyhow!("invalid nonce"))?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| anyhow!("AES-GCM decryption failed"))?;

    Ok(plaintext.to_vec())
}
