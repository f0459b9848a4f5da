#![forbid(unsafe_code)]

//! BER walk over the PFX structure (RFC 7292).

use fiscsig_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::tags::TAG_INTEGER;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, BERReaderSeq, Tag};

use crate::kdf::{self, HashKind, Pbes2Cipher};
use crate::Pkcs12Contents;

mod oid {
    pub const DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
    pub const ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

    pub const KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];
    pub const SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
    pub const CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
    pub const X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

    pub const PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
    pub const PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
    pub const PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];

    pub const AES_128_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 2];
    pub const AES_192_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 22];
    pub const AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

    pub const SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
    pub const SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
    pub const HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
    pub const HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];
}

fn is(id: &ObjectIdentifier, components: &[u64]) -> bool {
    id.components().as_slice() == components
}

fn invalid() -> ASN1Error {
    ASN1Error::new(ASN1ErrorKind::Invalid)
}

/// Password-based encryption parameters of a bag or content.
#[derive(Debug)]
enum Pbe {
    Sha1TripleDes {
        salt: Vec<u8>,
        iterations: u32,
    },
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: HashKind,
        scheme: Pbes2Cipher,
        iv: Vec<u8>,
    },
}

struct MacData {
    hash: HashKind,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum ContentInfo {
    Plain(Vec<u8>),
    Encrypted { pbe: Pbe, ciphertext: Vec<u8> },
}

enum SafeBag {
    Key(Vec<u8>),
    ShroudedKey { pbe: Pbe, ciphertext: Vec<u8> },
    Cert(Vec<u8>),
    Other,
}

/// Credentials derived from the user's password.
struct Password<'p> {
    text: &'p str,
    bmp: Vec<u8>,
}

impl Password<'_> {
    fn decrypt(&self, pbe: &Pbe, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        match pbe {
            Pbe::Sha1TripleDes { salt, iterations } => {
                kdf::decrypt_sha1_3des(ciphertext, &self.bmp, salt, *iterations)
            }
            Pbe::Pbes2 {
                salt,
                iterations,
                prf,
                scheme,
                iv,
            } => kdf::decrypt_pbes2(ciphertext, self.text, salt, *iterations, *prf, *scheme, iv),
        }
    }
}

pub(crate) fn parse_pfx(data: &[u8], password: &str) -> Result<Pkcs12Contents, Error> {
    let (auth_safe, mac) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 3 {
                return Err(invalid());
            }
            let auth_safe = r.next().read_sequence(|r| {
                if !is(&r.next().read_oid()?, oid::DATA) {
                    return Err(invalid());
                }
                r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
            })?;
            let mac = r.read_optional(read_mac_data)?;
            Ok((auth_safe, mac))
        })
    })
    .map_err(|e| Error::Pkcs12(format!("malformed PFX: {e}")))?;

    let bmp = match &mac {
        Some(mac) => verify_mac(mac, &auth_safe, password)?,
        None => kdf::bmp_password(password),
    };
    let password = Password {
        text: password,
        bmp,
    };

    let infos = yasna::parse_ber(&auth_safe, |r| r.collect_sequence_of(read_content_info))
        .map_err(|e| Error::Pkcs12(format!("malformed authenticated safe: {e}")))?;

    let mut contents = Pkcs12Contents::default();
    for info in infos {
        let safe = match info {
            ContentInfo::Plain(bytes) => bytes,
            ContentInfo::Encrypted { pbe, ciphertext } => password.decrypt(&pbe, &ciphertext)?,
        };
        let bags = yasna::parse_ber(&safe, |r| r.collect_sequence_of(read_safe_bag))
            .map_err(|e| Error::Pkcs12(format!("malformed safe contents: {e}")))?;

        for bag in bags {
            match bag {
                SafeBag::Key(der) => contents.private_keys.push(der),
                SafeBag::ShroudedKey { pbe, ciphertext } => {
                    contents.private_keys.push(password.decrypt(&pbe, &ciphertext)?)
                }
                SafeBag::Cert(der) => contents.certificates.push(der),
                SafeBag::Other => {}
            }
        }
    }

    Ok(contents)
}

/// Verify the PFX MAC and return the BMP password encoding that matched.
fn verify_mac(mac: &MacData, auth_safe: &[u8], password: &str) -> Result<Vec<u8>, Error> {
    for bmp in kdf::empty_password_variants(password) {
        let key = kdf::pkcs12_kdf(
            mac.hash,
            kdf::ID_MAC,
            &bmp,
            &mac.salt,
            mac.iterations,
            mac.hash.output_len(),
        );
        if kdf::mac_matches(mac.hash, &key, auth_safe, &mac.digest)? {
            return Ok(bmp);
        }
    }
    Err(Error::Pkcs12(
        "MAC verification failed (wrong password?)".into(),
    ))
}

fn read_mac_data(r: BERReader) -> Result<MacData, ASN1Error> {
    r.read_sequence(|r| {
        let (hash, digest) = r.next().read_sequence(|r| {
            let hash = r.next().read_sequence(|r| {
                let id = r.next().read_oid()?;
                r.read_optional(|r| r.read_null())?;
                if is(&id, oid::SHA256) {
                    Ok(HashKind::Sha256)
                } else if is(&id, oid::SHA1) {
                    Ok(HashKind::Sha1)
                } else {
                    Err(invalid())
                }
            })?;
            Ok((hash, r.next().read_bytes()?))
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
        Ok(MacData {
            hash,
            digest,
            salt,
            iterations,
        })
    })
}

fn read_content_info(r: BERReader) -> Result<ContentInfo, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if is(&content_type, oid::DATA) {
            let bytes = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            return Ok(ContentInfo::Plain(bytes));
        }
        if !is(&content_type, oid::ENCRYPTED_DATA) {
            return Err(invalid());
        }
        r.next().read_tagged(Tag::context(0), |r| {
            r.read_sequence(|r| {
                r.next().read_u32()?;
                r.next().read_sequence(|r| {
                    r.next().read_oid()?;
                    let pbe = read_pbe(r.next())?;
                    let ciphertext = r
                        .next()
                        .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                    Ok(ContentInfo::Encrypted { pbe, ciphertext })
                })
            })
        })
    })
}

fn read_safe_bag(r: BERReader) -> Result<SafeBag, ASN1Error> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;
        let bag = r.next().read_tagged(Tag::context(0), |r| {
            if is(&bag_type, oid::KEY_BAG) {
                Ok(SafeBag::Key(r.read_der()?))
            } else if is(&bag_type, oid::SHROUDED_KEY_BAG) {
                r.read_sequence(|r| {
                    let pbe = read_pbe(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok(SafeBag::ShroudedKey { pbe, ciphertext })
                })
            } else if is(&bag_type, oid::CERT_BAG) {
                r.read_sequence(|r| {
                    if !is(&r.next().read_oid()?, oid::X509_CERTIFICATE) {
                        return Err(invalid());
                    }
                    let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                    Ok(SafeBag::Cert(der))
                })
            } else {
                r.read_der()?;
                Ok(SafeBag::Other)
            }
        })?;
        skip_bag_attributes(r)?;
        Ok(bag)
    })
}

/// Consume the optional `bagAttributes` SET (friendlyName, localKeyId, ...).
fn skip_bag_attributes(r: &mut BERReaderSeq) -> Result<(), ASN1Error> {
    r.read_optional(|r| {
        r.read_set_of(|r| {
            r.read_der()?;
            Ok(())
        })
    })?;
    Ok(())
}

fn read_pbe(r: BERReader) -> Result<Pbe, ASN1Error> {
    r.read_sequence(|r| {
        let algorithm = r.next().read_oid()?;
        if is(&algorithm, oid::PBE_SHA1_3DES) {
            r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(Pbe::Sha1TripleDes { salt, iterations })
            })
        } else if is(&algorithm, oid::PBES2) {
            r.next().read_sequence(|r| {
                let (salt, iterations, prf) = r.next().read_sequence(|r| {
                    if !is(&r.next().read_oid()?, oid::PBKDF2) {
                        return Err(invalid());
                    }
                    r.next().read_sequence(read_pbkdf2_params)
                })?;
                let (scheme, iv) = r.next().read_sequence(|r| {
                    let cipher = r.next().read_oid()?;
                    let scheme = if is(&cipher, oid::AES_256_CBC) {
                        Pbes2Cipher::Aes256Cbc
                    } else if is(&cipher, oid::AES_192_CBC) {
                        Pbes2Cipher::Aes192Cbc
                    } else if is(&cipher, oid::AES_128_CBC) {
                        Pbes2Cipher::Aes128Cbc
                    } else {
                        return Err(invalid());
                    };
                    Ok((scheme, r.next().read_bytes()?))
                })?;
                Ok(Pbe::Pbes2 {
                    salt,
                    iterations,
                    prf,
                    scheme,
                    iv,
                })
            })
        } else {
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        }
    })
}

/// `PBKDF2-params ::= SEQUENCE { salt, iterationCount, keyLength OPTIONAL, prf DEFAULT hmacWithSHA1 }`
fn read_pbkdf2_params(r: &mut BERReaderSeq) -> Result<(Vec<u8>, u32, HashKind), ASN1Error> {
    let salt = r.next().read_bytes()?;
    let iterations = r.next().read_u32()?;
    r.read_optional(|r| {
        if r.lookahead_tag()? != TAG_INTEGER {
            return Err(invalid());
        }
        r.read_u32()
    })?;
    let prf = r
        .read_optional(|r| {
            r.read_sequence(|r| {
                let id = r.next().read_oid()?;
                r.read_optional(|r| r.read_null())?;
                if is(&id, oid::HMAC_SHA256) {
                    Ok(HashKind::Sha256)
                } else if is(&id, oid::HMAC_SHA1) {
                    Ok(HashKind::Sha1)
                } else {
                    Err(invalid())
                }
            })
        })?
        .unwrap_or(HashKind::Sha1);
    Ok((salt, iterations, prf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Vec<u8> {
        let path = format!("{}/../../test-data/keys/{name}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read(&path).unwrap_or_else(|e| panic!("reading {path}: {e}"))
    }

    #[test]
    fn test_parse_pbes2_aes256_container() {
        let contents = parse_pfx(&fixture("rsa-2048.p12"), "secret123").unwrap();
        assert_eq!(contents.private_keys.len(), 1);
        assert_eq!(contents.certificates.len(), 1);
        assert_eq!(contents.private_keys[0][0], 0x30);
        assert_eq!(contents.certificates[0], fixture("rsa-2048-cert.der"));
    }

    #[test]
    fn test_parse_legacy_3des_container() {
        let legacy = parse_pfx(&fixture("rsa-2048-legacy.p12"), "secret123").unwrap();
        let modern = parse_pfx(&fixture("rsa-2048.p12"), "secret123").unwrap();
        assert_eq!(legacy.private_keys, modern.private_keys);
        assert_eq!(legacy.certificates, modern.certificates);
    }

    #[test]
    fn test_certificate_only_container_has_no_keys() {
        let contents = parse_pfx(&fixture("cert-only.p12"), "secret123").unwrap();
        assert!(contents.private_keys.is_empty());
        assert_eq!(contents.certificates.len(), 1);
        assert!(!contents.is_empty());
    }

    #[test]
    fn test_wrong_password_fails_mac() {
        for name in ["rsa-2048.p12", "rsa-2048-legacy.p12"] {
            let err = parse_pfx(&fixture(name), "not-the-password").unwrap_err();
            assert!(
                err.to_string().contains("MAC verification failed"),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = parse_pfx(b"definitely not DER", "secret123").unwrap_err();
        assert!(matches!(err, Error::Pkcs12(_)));

        let err = parse_pfx(&fixture("rsa-2048-cert.der"), "secret123").unwrap_err();
        assert!(err.to_string().starts_with("PKCS#12: malformed PFX"));
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let contents = parse_pfx(&fixture("rsa-2048.p12"), "secret123").unwrap();
        let shown = format!("{contents:?}");
        assert!(shown.contains("[1 redacted]"));
        assert!(!shown.contains("48,"));
    }
}
