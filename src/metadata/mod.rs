//! ECMA-335 metadata primitives used by the signature classifier.
//!
//! - [`token`] - Metadata tokens and the table prefixes relevant to boxing
//! - [`signatures`] - Decoding of method and local variable signature blobs

pub mod signatures;
pub mod token;
