//! Method and local variable signature decoding for .NET metadata.
//!
//! This module decodes the subset of ECMA-335 signature blobs the capture pipeline needs when
//! runtime type introspection cannot name a parameter's type: method signatures (to walk the
//! parameter list of a method) and local variable signatures (to find a module-local
//! instantiation of a generic value type).
//!
//! Every decoded method parameter remembers the byte span of its type, so a caller can copy
//! the raw encoding of that parameter out of the blob.
//!
//! # Examples
//!
//! ```rust
//! use callscope::metadata::signatures::{parse_method_signature, TypeSignature};
//!
//! // static void M(string)
//! let method_sig = parse_method_signature(&[0x00, 0x01, 0x01, 0x0E])?;
//! assert_eq!(method_sig.params[0].base, TypeSignature::String);
//! # Ok::<(), callscope::Error>(())
//! ```
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 23.2 - Blobs and Signatures

mod parser;
mod types;

pub use parser::*;
pub use types::*;

use crate::Result;

/// Decodes a method signature blob with the default nesting limit.
///
/// # Errors
/// See [`SignatureParser::parse_method_signature`].
pub fn parse_method_signature(data: &[u8]) -> Result<SignatureMethod> {
    SignatureParser::new(data).parse_method_signature()
}

/// Decodes a local variable signature blob with the default nesting limit.
///
/// # Errors
/// See [`SignatureParser::parse_local_var_signature`].
pub fn parse_local_var_signature(data: &[u8]) -> Result<SignatureLocalVariables> {
    SignatureParser::new(data).parse_local_var_signature()
}
