//! The service's own signing identity.
//!
//! The spec calls for notary signatures to be verifiable against a
//! `NotaryInfo.identity.owning_key`, but names no certificate authority
//! to issue them: this crate is its own signing authority, holding a
//! single Ed25519 keypair persisted to disk on first boot and reused on
//! every subsequent one. There is no certificate chain; a node's
//! `owning_key` bytes *are* its root of trust, matching the notary
//! certificate format described in `notary_cert`.

use std::fmt;
use std::fs;

use camino::Utf8Path;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, ED25519_PUBLIC_KEY_LEN};
use serde::Serialize;

use netmap_api::Signed;

use crate::util::write_file;

/// Failed to load, generate, or use the signing keypair.
#[derive(Debug)]
pub enum SigningError {
    Io(std::io::Error),
    Keypair(ring::error::KeyRejected),
    Unspecified(ring::error::Unspecified),
}

impl fmt::Display for SigningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningError::Io(e) => write!(f, "I/O error: {e}"),
            SigningError::Keypair(e) => write!(f, "invalid keypair: {e}"),
            SigningError::Unspecified(e) => write!(f, "signing operation failed: {e}"),
        }
    }
}

impl std::error::Error for SigningError {}

impl From<std::io::Error> for SigningError {
    fn from(e: std::io::Error) -> Self {
        SigningError::Io(e)
    }
}

/// A mismatched or malformed signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyError;

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("signature verification failed")
    }
}

impl std::error::Error for VerifyError {}

/// Holds the service's Ed25519 keypair and signs payloads into
/// [`Signed<T>`] envelopes.
pub struct SigningAuthority {
    keypair: Ed25519KeyPair,
}

impl SigningAuthority {
    /// Load the keypair from `path`, generating and persisting a fresh
    /// one if the file does not yet exist.
    pub fn load_or_generate(path: &Utf8Path) -> Result<Self, SigningError> {
        let pkcs8 = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let rng = SystemRandom::new();
                let doc = Ed25519KeyPair::generate_pkcs8(&rng).map_err(SigningError::Unspecified)?;
                write_file(path, doc.as_ref())?;
                doc.as_ref().to_vec()
            }
            Err(e) => return Err(SigningError::Io(e)),
        };
        let keypair = Ed25519KeyPair::from_pkcs8(&pkcs8).map_err(SigningError::Keypair)?;
        Ok(SigningAuthority { keypair })
    }

    /// This authority's public key, the `owning_key` bytes to publish in
    /// a `LegalIdentity` or notary certificate file.
    pub fn public_key(&self) -> [u8; ED25519_PUBLIC_KEY_LEN] {
        self.keypair
            .public_key()
            .as_ref()
            .try_into()
            .expect("ring always returns a 32-byte Ed25519 public key")
    }

    /// Encode, sign, and wrap `value` in a `Signed<T>` envelope.
    pub fn sign<T: Serialize>(&self, value: &T) -> Signed<T> {
        let payload = Signed::<T>::encode_payload(value);
        let signature = self.keypair.sign(&payload);
        Signed::new(payload, bytes::Bytes::copy_from_slice(signature.as_ref()))
    }
}

/// Verify `signed`'s signature against `public_key`. Does not decode the
/// payload.
pub fn verify<T>(signed: &Signed<T>, public_key: &[u8]) -> Result<(), VerifyError> {
    let key = ring::signature::UnparsedPublicKey::new(&ring::signature::ED25519, public_key);
    key.verify(&signed.payload, &signed.signature).map_err(|_| VerifyError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Greeting {
        text: String,
    }

    #[test]
    fn generates_persists_and_reloads_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("signing.p8");

        let first = SigningAuthority::load_or_generate(&path).unwrap();
        let second = SigningAuthority::load_or_generate(&path).unwrap();
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("signing.p8");
        let authority = SigningAuthority::load_or_generate(&path).unwrap();

        let signed = authority.sign(&Greeting { text: "hello".into() });
        verify(&signed, &authority.public_key()).unwrap();
        assert_eq!(signed.decode_payload().unwrap(), Greeting { text: "hello".into() });
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("signing.p8");
        let authority = SigningAuthority::load_or_generate(&path).unwrap();

        let mut signed = authority.sign(&Greeting { text: "hello".into() });
        signed.payload = bytes::Bytes::from_static(b"{\"text\":\"tampered\"}");
        assert!(verify(&signed, &authority.public_key()).is_err());
    }
}
