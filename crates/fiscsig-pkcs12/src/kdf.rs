#![forbid(unsafe_code)]

//! Password-based key derivation and bag decryption.
//!
//! The PKCS#12 KDF (RFC 7292 Appendix B) derives the MAC key and the key/IV
//! for the legacy 3DES PBE. PBES2 bags use PBKDF2 with the password's UTF-8
//! bytes instead.

use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, KeyIvInit};
use fiscsig_core::Error;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Diversifier bytes (RFC 7292 B.3).
pub(crate) const ID_KEY: u8 = 1;
pub(crate) const ID_IV: u8 = 2;
pub(crate) const ID_MAC: u8 = 3;

/// Hash underlying a MAC or a PBKDF2 PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HashKind {
    Sha1,
    Sha256,
}

impl HashKind {
    pub(crate) fn output_len(self) -> usize {
        match self {
            HashKind::Sha1 => 20,
            HashKind::Sha256 => 32,
        }
    }
}

/// Block cipher named by a PBES2 `encryptionScheme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pbes2Cipher {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl Pbes2Cipher {
    fn key_len(self) -> usize {
        match self {
            Pbes2Cipher::Aes128Cbc => 16,
            Pbes2Cipher::Aes192Cbc => 24,
            Pbes2Cipher::Aes256Cbc => 32,
        }
    }
}

pub(crate) fn pkcs12_kdf(
    hash: HashKind,
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    match hash {
        HashKind::Sha1 => derive::<Sha1>(id, password, salt, iterations, output_len, 20),
        HashKind::Sha256 => derive::<Sha256>(id, password, salt, iterations, output_len, 32),
    }
}

// Both SHA-1 and SHA-256 have a 64-byte block.
const V: usize = 64;

fn derive<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
    u: usize,
) -> Vec<u8>
where
    D: Digest + sha2::digest::FixedOutputReset,
{
    let diversifier = [id; V];
    let mut input = repeat_to_block(salt);
    input.extend(repeat_to_block(password));

    let rounds = output_len.div_ceil(u);
    let mut out = Vec::with_capacity(rounds * u);
    let mut hasher = D::new();

    for round in 0..rounds {
        Digest::update(&mut hasher, diversifier);
        Digest::update(&mut hasher, &input);
        let mut a = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }
        out.extend_from_slice(&a);

        if round + 1 < rounds {
            let b = repeat_to_block(&a);
            for chunk in input.chunks_mut(V) {
                add_with_carry(chunk, &b);
            }
        }
    }

    out.truncate(output_len);
    out
}

/// Repeat `data` up to the next multiple of the block size. Empty stays empty.
fn repeat_to_block(data: &[u8]) -> Vec<u8> {
    let len = data.len().div_ceil(V) * V;
    data.iter().copied().cycle().take(len).collect()
}

/// `chunk = (chunk + b + 1) mod 2^(8*V)`, big-endian.
fn add_with_carry(chunk: &mut [u8], b: &[u8]) {
    let mut carry = 1u16;
    for (x, y) in chunk.iter_mut().zip(b).rev() {
        let sum = u16::from(*x) + u16::from(*y) + carry;
        *x = sum as u8;
        carry = sum >> 8;
    }
}

/// BMPString encoding of a password: UTF-16BE plus a two-byte terminator.
///
/// The empty password maps to an empty string here; some writers use the
/// bare terminator instead, which [`empty_password_variants`] covers.
pub(crate) fn bmp_password(password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let mut out: Vec<u8> = password.encode_utf16().flat_map(u16::to_be_bytes).collect();
    out.extend_from_slice(&[0, 0]);
    out
}

/// Candidate BMP encodings tried during MAC verification.
pub(crate) fn empty_password_variants(password: &str) -> Vec<Vec<u8>> {
    if password.is_empty() {
        vec![Vec::new(), vec![0, 0]]
    } else {
        vec![bmp_password(password)]
    }
}

/// Check an HMAC in constant time.
pub(crate) fn mac_matches(
    hash: HashKind,
    key: &[u8],
    data: &[u8],
    expected: &[u8],
) -> Result<bool, Error> {
    macro_rules! check {
        ($d:ty) => {{
            let mut mac = <Hmac<$d> as Mac>::new_from_slice(key)
                .map_err(|e| Error::Pkcs12(format!("invalid MAC key: {e}")))?;
            mac.update(data);
            Ok(mac.verify_slice(expected).is_ok())
        }};
    }
    match hash {
        HashKind::Sha1 => check!(Sha1),
        HashKind::Sha256 => check!(Sha256),
    }
}

macro_rules! cbc_decrypt {
    ($cipher:ty, $name:literal, $key:expr, $iv:expr, $data:expr) => {
        cbc::Decryptor::<$cipher>::new_from_slices($key, $iv)
            .map_err(|e| Error::Pkcs12(format!("{} setup failed: {e}", $name)))?
            .decrypt_padded_vec_mut::<Pkcs7>($data)
            .map_err(|_| Error::Pkcs12(format!("{} decryption failed (wrong password?)", $name)))
    };
}

/// pbeWithSHAAnd3-KeyTripleDES-CBC.
pub(crate) fn decrypt_sha1_3des(
    ciphertext: &[u8],
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let key = pkcs12_kdf(HashKind::Sha1, ID_KEY, bmp_password, salt, iterations, 24);
    let iv = pkcs12_kdf(HashKind::Sha1, ID_IV, bmp_password, salt, iterations, 8);
    cbc_decrypt!(des::TdesEde3, "3DES-CBC", &key, &iv, ciphertext)
}

/// PBES2 with PBKDF2 and an AES-CBC scheme.
pub(crate) fn decrypt_pbes2(
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    iterations: u32,
    prf: HashKind,
    scheme: Pbes2Cipher,
    iv: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut key = vec![0u8; scheme.key_len()];
    match prf {
        HashKind::Sha1 => pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key),
        HashKind::Sha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key)
        }
    }
    match scheme {
        Pbes2Cipher::Aes128Cbc => cbc_decrypt!(aes::Aes128, "AES-128-CBC", &key, iv, ciphertext),
        Pbes2Cipher::Aes192Cbc => cbc_decrypt!(aes::Aes192, "AES-192-CBC", &key, iv, ciphertext),
        Pbes2Cipher::Aes256Cbc => cbc_decrypt!(aes::Aes256, "AES-256-CBC", &key, iv, ciphertext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmp_password_encoding() {
        assert!(bmp_password("").is_empty());
        assert_eq!(bmp_password("A"), vec![0x00, 0x41, 0x00, 0x00]);
        assert_eq!(bmp_password("añ"), vec![0x00, 0x61, 0x00, 0xF1, 0x00, 0x00]);
    }

    #[test]
    fn test_empty_password_has_two_candidates() {
        assert_eq!(empty_password_variants(""), vec![Vec::new(), vec![0, 0]]);
        assert_eq!(empty_password_variants("x").len(), 1);
    }

    #[test]
    fn test_repeat_to_block() {
        assert!(repeat_to_block(&[]).is_empty());
        let r = repeat_to_block(&[1, 2, 3]);
        assert_eq!(r.len(), V);
        assert_eq!(&r[..6], &[1, 2, 3, 1, 2, 3]);
        assert_eq!(repeat_to_block(&[7u8; 65]).len(), 2 * V);
    }

    #[test]
    fn test_add_with_carry_propagates() {
        let mut chunk = [0x00, 0xFF];
        add_with_carry(&mut chunk, &[0x00, 0x00]);
        assert_eq!(chunk, [0x01, 0x00]);

        let mut chunk = [0xFF, 0xFF];
        add_with_carry(&mut chunk, &[0x00, 0x00]);
        assert_eq!(chunk, [0x00, 0x00]);
    }

    #[test]
    fn test_kdf_is_deterministic_and_diversified() {
        let pw = bmp_password("secret123");
        let key = pkcs12_kdf(HashKind::Sha1, ID_KEY, &pw, b"saltsalt", 2048, 24);
        assert_eq!(key.len(), 24);
        assert_eq!(key, pkcs12_kdf(HashKind::Sha1, ID_KEY, &pw, b"saltsalt", 2048, 24));

        let iv = pkcs12_kdf(HashKind::Sha1, ID_IV, &pw, b"saltsalt", 2048, 8);
        assert_ne!(&key[..8], &iv[..]);

        let long = pkcs12_kdf(HashKind::Sha256, ID_MAC, &pw, b"saltsalt", 1, 70);
        assert_eq!(long.len(), 70);
    }

    #[test]
    fn test_mac_matches_rejects_tampered_tag() {
        let key = [0x0Bu8; 20];
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&key).unwrap();
        mac.update(b"authSafe");
        let tag = mac.finalize().into_bytes().to_vec();

        assert!(mac_matches(HashKind::Sha256, &key, b"authSafe", &tag).unwrap());
        let mut bad = tag.clone();
        bad[0] ^= 1;
        assert!(!mac_matches(HashKind::Sha256, &key, b"authSafe", &bad).unwrap());
        assert!(!mac_matches(HashKind::Sha1, &key, b"authSafe", &tag).unwrap());
    }
}
