//! Request body encryption for admin calls that carry secrets.
//!
//! Layout: `salt(32) | 0x02 | nonce(8) | stream`, where `0x02` selects a
//! PBKDF2-SHA256 key and the stream is AES-256-GCM in 16 KiB fragments. Each
//! fragment nonce is `nonce | seq (u32 LE)`. Sequence 0 seals an empty message
//! whose tag becomes the associated data of every fragment, prefixed with
//! `0x80` on the final fragment and `0x00` otherwise.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use thiserror::Error;
use zeroize::Zeroizing;

const SALT_LEN: usize = 32;
const STREAM_NONCE_LEN: usize = 8;
const PBKDF2_AES_GCM: u8 = 0x02;
const PBKDF2_ITERATIONS: u32 = 8192;
const FRAGMENT_LEN: usize = 16 * 1024;
const FINAL_FLAG: u8 = 0x80;

#[derive(Debug, Error)]
#[error("failed to encrypt admin request body")]
pub struct EncryptionError;

impl From<ring::error::Unspecified> for EncryptionError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self
    }
}

/// Encrypt `data` with a key derived from `password` (the admin secret key)
pub fn encrypt_data(password: &str, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)?;
    let mut nonce = [0u8; STREAM_NONCE_LEN];
    rng.fill(&mut nonce)?;
    seal(password, &salt, &nonce, data)
}

fn seal(
    password: &str,
    salt: &[u8; SALT_LEN],
    nonce: &[u8; STREAM_NONCE_LEN],
    data: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let mut key = Zeroizing::new([0u8; 32]);
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS).ok_or(EncryptionError)?;
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password.as_bytes(),
        &mut key[..],
    );
    let cipher = LessSafeKey::new(UnboundKey::new(&AES_256_GCM, &key[..])?);

    let fragment_nonce = |seq: u32| {
        let mut bytes = [0u8; NONCE_LEN];
        bytes[..STREAM_NONCE_LEN].copy_from_slice(nonce);
        bytes[STREAM_NONCE_LEN..].copy_from_slice(&seq.to_le_bytes());
        Nonce::assume_unique_for_key(bytes)
    };

    let mut tag = Vec::new();
    cipher.seal_in_place_append_tag(fragment_nonce(0), Aad::empty(), &mut tag)?;
    let mut associated = Vec::with_capacity(1 + tag.len());
    associated.push(0x00);
    associated.extend_from_slice(&tag);

    let mut out = Vec::with_capacity(SALT_LEN + 1 + STREAM_NONCE_LEN + data.len() + 32);
    out.extend_from_slice(salt);
    out.push(PBKDF2_AES_GCM);
    out.extend_from_slice(nonce);

    let fragments: Vec<&[u8]> = if data.is_empty() {
        vec![data]
    } else {
        data.chunks(FRAGMENT_LEN).collect()
    };
    let last = fragments.len() - 1;
    for (index, fragment) in fragments.into_iter().enumerate() {
        let seq = u32::try_from(index + 1).map_err(|_| EncryptionError)?;
        if index == last {
            associated[0] = FINAL_FLAG;
        }
        let mut buffer = fragment.to_vec();
        cipher.seal_in_place_append_tag(
            fragment_nonce(seq),
            Aad::from(associated.as_slice()),
            &mut buffer,
        )?;
        out.extend_from_slice(&buffer);
    }
    Ok(out)
}
