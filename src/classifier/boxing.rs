use std::sync::Arc;

use crate::{metadata::token::Token, runtime::PrimitiveType, Result};

/// How a single argument travels from the probe to the managed callback.
///
/// Instructions are produced once per parameter when a method is selected for capture and
/// never change afterwards. The [`BoxingInstruction::SignatureBlob`] case owns a copy of the
/// signature bytes, so it stays valid after the blob it was cut from is gone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxingInstruction {
    /// The argument cannot be captured; it is rendered as a fixed placeholder
    Unsupported,
    /// A reference type, passed as an opaque object handle without boxing
    PassThroughObject,
    /// A primitive scalar with a fixed boxing code
    Primitive(PrimitiveType),
    /// A value type boxed through a `TypeDef`, `TypeRef` or `TypeSpec` token of the method's module
    MetadataToken(Token),
    /// A value type boxed through the raw signature encoding of its type
    SignatureBlob(Arc<[u8]>),
}

impl BoxingInstruction {
    /// Stream code of [`BoxingInstruction::PassThroughObject`]
    pub const CODE_OBJECT: u32 = 0;
    /// Stream code of [`BoxingInstruction::Unsupported`]
    pub const CODE_UNSUPPORTED: u32 = 0xFFFF_FFFF;
    /// Stream marker introducing a [`BoxingInstruction::SignatureBlob`]
    pub const CODE_SIGNATURE_BLOB: u32 = 0xFFFF_FFFE;

    /// Returns `true` unless the argument is [`BoxingInstruction::Unsupported`].
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, BoxingInstruction::Unsupported)
    }

    /// Appends the native stream encoding of this instruction.
    ///
    /// Primitives use the codes `1..=14`, tokens are written verbatim (their table byte
    /// keeps them above the special codes), and signature blobs are written as the marker,
    /// the byte length, then the bytes packed little-endian four per word.
    pub fn encode(&self, out: &mut Vec<u32>) {
        match self {
            BoxingInstruction::Unsupported => out.push(Self::CODE_UNSUPPORTED),
            BoxingInstruction::PassThroughObject => out.push(Self::CODE_OBJECT),
            BoxingInstruction::Primitive(primitive) => out.push(primitive_code(*primitive)),
            BoxingInstruction::MetadataToken(token) => out.push(token.value()),
            BoxingInstruction::SignatureBlob(bytes) => {
                out.push(Self::CODE_SIGNATURE_BLOB);
                #[allow(clippy::cast_possible_truncation)]
                out.push(bytes.len() as u32);
                for chunk in bytes.chunks(4) {
                    let mut word = [0u8; 4];
                    word[..chunk.len()].copy_from_slice(chunk);
                    out.push(u32::from_le_bytes(word));
                }
            }
        }
    }

    /// Encodes a whole parameter list.
    #[must_use]
    pub fn encode_all(instructions: &[BoxingInstruction]) -> Vec<u32> {
        let mut out = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            instruction.encode(&mut out);
        }
        out
    }

    /// Decodes a stream produced by [`BoxingInstruction::encode_all`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown codes and
    /// [`crate::Error::OutOfBounds`] for a truncated blob.
    pub fn decode_all(stream: &[u32]) -> Result<Vec<BoxingInstruction>> {
        let mut instructions = Vec::new();
        let mut position = 0;

        while let Some(&code) = stream.get(position) {
            position += 1;
            let instruction = match code {
                Self::CODE_UNSUPPORTED => BoxingInstruction::Unsupported,
                Self::CODE_OBJECT => BoxingInstruction::PassThroughObject,
                Self::CODE_SIGNATURE_BLOB => {
                    let length =
                        *stream.get(position).ok_or_else(|| out_of_bounds_error!())? as usize;
                    position += 1;
                    let words = length.div_ceil(4);
                    let packed = stream
                        .get(position..position + words)
                        .ok_or_else(|| out_of_bounds_error!())?;
                    position += words;

                    let mut bytes: Vec<u8> = packed.iter().flat_map(|w| w.to_le_bytes()).collect();
                    bytes.truncate(length);
                    BoxingInstruction::SignatureBlob(Arc::from(bytes))
                }
                code if Token::new(code).is_type_def_or_ref_or_spec() => {
                    BoxingInstruction::MetadataToken(Token::new(code))
                }
                code => BoxingInstruction::Primitive(
                    primitive_from_code(code)
                        .ok_or_else(|| malformed_error!("Unknown boxing code - {:#x}", code))?,
                ),
            };
            instructions.push(instruction);
        }

        Ok(instructions)
    }
}

/// Fixed stream code of a primitive.
#[must_use]
pub fn primitive_code(primitive: PrimitiveType) -> u32 {
    match primitive {
        PrimitiveType::Boolean => 1,
        PrimitiveType::Char => 2,
        PrimitiveType::SByte => 3,
        PrimitiveType::Byte => 4,
        PrimitiveType::Int16 => 5,
        PrimitiveType::UInt16 => 6,
        PrimitiveType::Int32 => 7,
        PrimitiveType::UInt32 => 8,
        PrimitiveType::Int64 => 9,
        PrimitiveType::UInt64 => 10,
        PrimitiveType::IntPtr => 11,
        PrimitiveType::UIntPtr => 12,
        PrimitiveType::Single => 13,
        PrimitiveType::Double => 14,
    }
}

fn primitive_from_code(code: u32) -> Option<PrimitiveType> {
    use strum::IntoEnumIterator;

    PrimitiveType::iter().find(|primitive| primitive_code(*primitive) == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_primitive_codes_are_unique_and_small() {
        let mut codes: Vec<u32> = PrimitiveType::iter().map(primitive_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 14);
        assert!(codes.iter().all(|code| (1..=14).contains(code)));
    }

    #[test]
    fn test_stream_layout() {
        let instructions = vec![
            BoxingInstruction::Primitive(PrimitiveType::Int32),
            BoxingInstruction::Unsupported,
            BoxingInstruction::MetadataToken(Token::new(0x0200_0003)),
            BoxingInstruction::SignatureBlob(Arc::from(vec![0x15, 0x11, 0x35, 0x01, 0x08])),
            BoxingInstruction::PassThroughObject,
        ];

        let stream = BoxingInstruction::encode_all(&instructions);
        assert_eq!(
            stream,
            vec![
                7,
                0xFFFF_FFFF,
                0x0200_0003,
                0xFFFF_FFFE,
                5,
                0x0135_1115,
                0x0000_0008,
                0,
            ]
        );
        assert_eq!(BoxingInstruction::decode_all(&stream).unwrap(), instructions);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(BoxingInstruction::decode_all(&[0x77]).is_err());
        assert!(BoxingInstruction::decode_all(&[0xFFFF_FFFE, 9, 0]).is_err());
    }
}
