/// Cryptographic primitives for Anker
///
/// This module implements:
/// - Field-level AES-256-GCM encryption of secrets kept in the pinned state message
/// - Pepper key loading and generation for the operator
pub mod codec;

#[cfg(test)]
mod proptests;

pub use codec::{generate_pepper_key, CodecError, FieldCodec, PEPPER_KEY_LEN};
