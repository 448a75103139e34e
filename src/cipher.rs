//! Whole-file encryption for secrets files
//!
//! Encrypted files carry a single base64 payload of `IV || ciphertext`: the
//! first 16 bytes are the CBC initialization vector, the remainder is
//! AES-256-CBC ciphertext with PKCS#7 padding. The cipher key is the SHA-256
//! digest of the configured passphrase.

use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of the initialization vector prefixed to every payload.
const IV_LEN: usize = 16;

/// Errors produced while turning an encrypted payload back into text.
///
/// These are wrapped into [`SecretGateError::Decryption`] by the file loader
/// so the failing path is part of the reported message.
///
/// [`SecretGateError::Decryption`]: crate::SecretGateError::Decryption
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is too short to contain an initialization vector")]
    TooShort,
    #[error("wrong key or corrupted ciphertext")]
    BadCiphertext,
    #[error("decrypted content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn derive_key(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

/// Decrypts a base64 payload produced by [`encrypt`].
///
/// Whitespace in the payload (trailing newlines, wrapped lines) is ignored.
pub fn decrypt(payload: &str, passphrase: &str) -> Result<String, CipherError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let raw = BASE64.decode(compact.as_bytes())?;
    if raw.len() < IV_LEN {
        return Err(CipherError::TooShort);
    }
    let key = derive_key(passphrase);
    let (iv, ciphertext) = raw.split_at(IV_LEN);
    let plaintext = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|_| CipherError::BadCiphertext)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::BadCiphertext)?;
    Ok(String::from_utf8(plaintext)?)
}

/// Encrypts plain text into the base64 payload format, with a random IV.
pub fn encrypt(plaintext: &str, passphrase: &str) -> String {
    let key = derive_key(passphrase);
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    let mut raw = Vec::with_capacity(IV_LEN + ciphertext.len());
    raw.extend_from_slice(&iv);
    raw.extend_from_slice(&ciphertext);
    BASE64.encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let payload = encrypt("API_KEY=secret123\nDB_URL=postgres://x\n", "passphrase");
        let plain = decrypt(&payload, "passphrase").unwrap();
        assert_eq!(plain, "API_KEY=secret123\nDB_URL=postgres://x\n");
    }

    #[test]
    fn payload_is_base64_with_iv_prefix() {
        let payload = encrypt("K=v", "pw");
        let raw = BASE64.decode(payload.as_bytes()).unwrap();
        assert!(raw.len() > IV_LEN);
        // CBC output is always a whole number of blocks
        assert_eq!((raw.len() - IV_LEN) % 16, 0);
    }

    #[test]
    fn wrong_passphrase_fails() {
        // Depending on how the padding check falls out, the error is either
        // BadCiphertext or Utf8; it must never be Ok.
        let payload = encrypt("K=v", "right");
        assert!(decrypt(&payload, "wrong").is_err());
    }

    #[test]
    fn truncated_payload_fails() {
        let err = decrypt("AAAA", "pw").unwrap_err();
        assert!(matches!(err, CipherError::TooShort));
    }

    #[test]
    fn garbage_payload_fails() {
        let err = decrypt("not base64 !!!", "pw").unwrap_err();
        assert!(matches!(err, CipherError::Base64(_)));
    }

    #[test]
    fn whitespace_in_payload_is_ignored() {
        let payload = encrypt("K=v", "pw");
        let wrapped = format!("{}\n{}\n", &payload[..10], &payload[10..]);
        assert_eq!(decrypt(&wrapped, "pw").unwrap(), "K=v");
    }

    #[test]
    fn distinct_ivs_per_encryption() {
        let a = encrypt("K=v", "pw");
        let b = encrypt("K=v", "pw");
        assert_ne!(a, b);
        assert_eq!(decrypt(&a, "pw").unwrap(), decrypt(&b, "pw").unwrap());
    }
}
