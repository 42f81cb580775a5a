//! The wire envelope every content-addressed artifact is stored and
//! transmitted as: raw payload bytes plus a signature block.

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Hash;

/// A payload together with a signature over its bytes.
///
/// `Signed<T>` is content-addressed by [`Signed::hash`]: the hash of the
/// full encoded envelope (length-prefixed payload, then signature), not
/// just the payload. This matches the spec's "content-addressed by the
/// hash of its raw bytes", where "raw bytes" means the bytes actually
/// handed to callers and stored at rest.
pub struct Signed<T> {
    pub payload: Bytes,
    pub signature: Bytes,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Signed<T> {
    fn clone(&self) -> Self {
        Signed {
            payload: self.payload.clone(),
            signature: self.signature.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Signed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signed")
            .field("payload_len", &self.payload.len())
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// A `Signed<T>` envelope's bytes were truncated or otherwise malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError;

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("malformed signed envelope")
    }
}

impl<T> Signed<T> {
    pub fn new(payload: Bytes, signature: Bytes) -> Self {
        Signed {
            payload,
            signature,
            _marker: PhantomData,
        }
    }

    /// Encode as `[u32 BE payload length][payload][signature]`.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(4 + self.payload.len() + self.signature.len());
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.signature);
        Bytes::from(buf)
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, DecodeError> {
        let bytes = bytes.into();
        if bytes.len() < 4 {
            return Err(DecodeError);
        }
        let len = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
        if bytes.len() < 4 + len {
            return Err(DecodeError);
        }
        let payload = bytes.slice(4..4 + len);
        let signature = bytes.slice(4 + len..);
        Ok(Signed::new(payload, signature))
    }

    /// The content-address of this envelope.
    pub fn hash(&self) -> Hash {
        Hash::of(&self.to_bytes())
    }
}

impl<T: Serialize> Signed<T> {
    /// Build the canonical payload bytes for `value`, leaving the
    /// signature to be filled in by a signing authority.
    pub fn encode_payload(value: &T) -> Bytes {
        Bytes::from(serde_json::to_vec(value).expect("model types always serialize"))
    }
}

impl<T: DeserializeOwned> Signed<T> {
    /// Decode the payload, without checking the signature. Callers that
    /// need the signature checked should verify first and only then parse.
    pub fn decode_payload(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let signed = Signed::<()>::new(Bytes::from_static(b"payload"), Bytes::from_static(b"sig"));
        let encoded = signed.to_bytes();
        let decoded = Signed::<()>::from_bytes(encoded).unwrap();
        assert_eq!(decoded.payload, signed.payload);
        assert_eq!(decoded.signature, signed.signature);
    }

    #[test]
    fn rejects_truncated_bytes() {
        assert!(Signed::<()>::from_bytes(Bytes::from_static(b"ab")).is_err());
        assert!(Signed::<()>::from_bytes(Bytes::from_static(&[0, 0, 0, 10])).is_err());
    }
}
