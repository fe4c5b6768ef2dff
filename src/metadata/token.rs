//! Metadata tokens: a table tag in the high byte and a row index in the low 24 bits.
//!
//! Boxing instructions, method ids and the signature fallback all refer to module metadata
//! through [`Token`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A metadata token naming a row of a module's metadata tables.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table
/// - The low 24 bits (bits 0-23) indicate the row index within that table
///
/// Only the tables the capture pipeline deals with get named constants: type definitions,
/// type references and type specifications appear in boxing instructions, method
/// definitions identify instrumented methods, and standalone signatures hold the local
/// variable signatures scanned by the classifier fallback.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub u32);

impl Token {
    /// Table prefix of `TypeRef` tokens
    pub const TYPEREF: u32 = 0x0100_0000;
    /// Table prefix of `TypeDef` tokens
    pub const TYPEDEF: u32 = 0x0200_0000;
    /// Table prefix of `MethodDef` tokens
    pub const METHODDEF: u32 = 0x0600_0000;
    /// Table prefix of `StandAloneSig` tokens
    pub const STANDALONESIG: u32 = 0x1100_0000;
    /// Table prefix of `TypeSpec` tokens
    pub const TYPESPEC: u32 = 0x1B00_0000;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the token names a `TypeDef`, `TypeRef` or `TypeSpec` row.
    ///
    /// These are the only tokens the native side accepts as boxing targets.
    #[must_use]
    pub fn is_type_def_or_ref_or_spec(&self) -> bool {
        let prefix = self.0 & 0xFF00_0000;
        !self.is_null()
            && self.row() != 0
            && matches!(prefix, Self::TYPEDEF | Self::TYPEREF | Self::TYPESPEC)
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parts() {
        let token = Token::new(0x0200_0005);
        assert_eq!(token.table(), 0x02);
        assert_eq!(token.row(), 5);
        assert!(!token.is_null());
        assert!(Token(0).is_null());
    }

    #[test]
    fn test_type_tokens() {
        assert!(Token::new(Token::TYPEDEF | 1).is_type_def_or_ref_or_spec());
        assert!(Token::new(Token::TYPEREF | 0x20).is_type_def_or_ref_or_spec());
        assert!(Token::new(Token::TYPESPEC | 3).is_type_def_or_ref_or_spec());
        assert!(!Token::new(Token::METHODDEF | 1).is_type_def_or_ref_or_spec());
        assert!(!Token::new(Token::TYPEDEF).is_type_def_or_ref_or_spec());
    }

    #[test]
    fn test_token_display() {
        assert_eq!(format!("{}", Token(0x0600_0001)), "0x06000001");
        let debug_str = format!("{:?}", Token(0x0600_0001));
        assert!(debug_str.contains("table: 0x06"));
        assert!(debug_str.contains("row: 1"));
    }
}
