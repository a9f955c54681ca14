//! Signing capability consumed by request builders.

use crate::SignaturePair;
use std::{fmt::Debug, sync::Arc};

/// Something that can sign request bodies.
///
/// Key types and algorithms live outside the engine. Implementations only need to produce a
/// signature over the exact bytes handed to them.
pub trait Signer: Send + Sync + Debug {
    /// The encoded public key matching the signatures.
    fn public_key(&self) -> Vec<u8>;

    /// Sign `message`.
    fn sign(&self, message: &[u8]) -> Vec<u8>;

    /// Sign `message` and pair the signature with the public key.
    fn sign_pair(&self, message: &[u8]) -> SignaturePair {
        SignaturePair { public_key: self.public_key(), signature: self.sign(message) }
    }
}

impl<S: Signer + ?Sized> Signer for Arc<S> {
    fn public_key(&self) -> Vec<u8> {
        (**self).public_key()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        (**self).sign(message)
    }
}
