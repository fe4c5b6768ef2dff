//! Bounds-checked byte cursor shared by the signature decoder and the control frame codec.
//!
//! Reads never panic: running past the end of the buffer yields
//! [`crate::Error::OutOfBounds`], and invalid compressed encodings yield
//! [`crate::Error::Malformed`]. Multi-byte integers are little-endian, except for the
//! ECMA-335 II.23.2 compressed integers, which are big-endian by definition.
//!
//! ```rust
//! use callscope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u16>()?, 0x0201);
//! assert_eq!(parser.remaining(), 2);
//! # Ok::<(), callscope::Error>(())
//! ```

use crate::{metadata::token::Token, Result};

/// Primitive values that can be read in little-endian order by [`Parser::read_le`].
pub trait ReadLe: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Builds the value from exactly [`ReadLe::SIZE`] little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_read_le {
    ($($ty:ty),*) => {
        $(
            impl ReadLe for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut buffer = [0u8; std::mem::size_of::<$ty>()];
                    buffer.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buffer)
                }
            }
        )*
    };
}

impl_read_le!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Cursor over a borrowed byte slice.
///
/// # Examples
///
/// ```rust
/// use callscope::Parser;
///
/// // 0x35 is the compressed form of TypeRef row 0x0D
/// let data = [0x11, 0x35];
/// let mut parser = Parser::new(&data);
///
/// assert_eq!(parser.read_le::<u8>()?, 0x11);
/// assert_eq!(parser.read_compressed_token()?.value(), 0x0100_000D);
/// assert!(!parser.has_more_data());
/// # Ok::<(), callscope::Error>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Starts reading at the beginning of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the buffer, independent of the cursor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for an empty buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` while the cursor has not reached the end.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left between the cursor and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Skips one byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the buffer.
    pub fn advance(&mut self) -> Result<()> {
        self.advance_by(1)
    }

    /// Skips `step` bytes. The cursor does not move on failure.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `step` bytes remain.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if step > self.remaining() {
            return Err(out_of_bounds_error!());
        }
        self.position += step;
        Ok(())
    }

    /// Offset of the cursor from the start of the buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The whole buffer, including bytes already read.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The byte under the cursor, without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the buffer.
    pub fn peek_byte(&self) -> Result<u8> {
        match self.data.get(self.position) {
            Some(byte) => Ok(*byte),
            None => Err(out_of_bounds_error!()),
        }
    }

    /// Consumes a little-endian `T`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `T::SIZE` bytes remain.
    pub fn read_le<T: ReadLe>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(T::SIZE)?;
        Ok(T::from_le_slice(bytes))
    }

    /// Borrow the next `length` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(length)?;
        Ok(&self.data[start..self.position])
    }

    /// Reads an ECMA-335 compressed unsigned integer.
    ///
    /// The lead byte selects the width: `0xxxxxxx` is one byte, `10xxxxxx` two bytes and
    /// `110xxxxx` four bytes, with the payload bits stored big-endian.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated input and
    /// [`crate::Error::Malformed`] for a `111xxxxx` lead byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let lead = self.read_le::<u8>()?;
        let (width, payload) = match lead {
            0x00..=0x7F => (1, lead),
            0x80..=0xBF => (2, lead & 0x3F),
            0xC0..=0xDF => (4, lead & 0x1F),
            _ => return Err(malformed_error!("Invalid compressed uint - {}", lead)),
        };

        let tail = self.read_bytes(width - 1)?;
        Ok(tail
            .iter()
            .fold(u32::from(payload), |value, byte| (value << 8) | u32::from(*byte)))
    }

    /// Reads a `TypeDefOrRefOrSpecEncoded` token: a compressed integer whose two low bits
    /// select the table and whose remaining bits hold the row.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for the unused table tag `3`.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let encoded = self.read_compressed_uint()?;
        let table = match encoded & 0b11 {
            0 => Token::TYPEDEF,
            1 => Token::TYPEREF,
            2 => Token::TYPESPEC,
            _ => return Err(malformed_error!("Invalid compressed token - {}", encoded)),
        };

        Ok(Token::new(table | (encoded >> 2)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_compressed_uint() {
        let encodings: [(&[u8], u32); 7] = [
            (&[0x03], 3),
            (&[0x7F], 0x7F),
            (&[0x80, 0x80], 0x80),
            (&[0xAE, 0x57], 0x2E57),
            (&[0xBF, 0xFF], 0x3FFF),
            (&[0xC0, 0x00, 0x40, 0x00], 0x4000),
            (&[0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF),
        ];

        for (input, expected) in encodings {
            let mut parser = Parser::new(input);
            assert_eq!(parser.read_compressed_uint().unwrap(), expected);
            assert!(!parser.has_more_data());
        }
    }

    #[test]
    fn test_read_compressed_uint_invalid_lead() {
        let mut parser = Parser::new(&[0xFF, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_read_compressed_token() {
        let mut parser = Parser::new(&[0x08, 0x35, 0x42]);
        assert_eq!(parser.read_compressed_token().unwrap(), Token::new(0x0200_0002));
        assert_eq!(parser.read_compressed_token().unwrap(), Token::new(0x0100_000D));
        assert_eq!(parser.read_compressed_token().unwrap(), Token::new(0x1B00_0010));

        let mut parser = Parser::new(&[0x03]);
        assert!(parser.read_compressed_token().is_err());
    }

    #[test]
    fn test_read_le_and_bounds() {
        let data = [0x02, 0x00, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_le::<i16>().unwrap(), 2);
        assert_eq!(parser.read_le::<i16>().unwrap(), 1);
        assert_eq!(parser.read_le::<i32>().unwrap(), 4);
        assert_eq!(parser.remaining(), 0);
        assert!(matches!(
            parser.read_le::<u8>(),
            Err(crate::Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_read_bytes_and_peek() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.peek_byte().unwrap(), 0xAA);
        assert_eq!(parser.read_bytes(2).unwrap(), &[0xAA, 0xBB]);
        assert_eq!(parser.pos(), 2);
        assert!(parser.read_bytes(2).is_err());
        assert_eq!(parser.pos(), 2);
    }
}
