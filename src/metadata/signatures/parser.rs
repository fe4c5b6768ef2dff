use crate::{
    file::parser::Parser,
    metadata::{
        signatures::{
            CallingConvention, CustomModifier, SignatureArray, SignatureLocalVariable,
            SignatureLocalVariables, SignatureMethod, SignatureParameter, TypeSignature,
            ELEMENT_TYPE,
        },
        token::Token,
    },
    Error::RecursionLimit,
    Result,
};

/// Default maximum nesting depth for signature decoding
pub const MAX_RECURSION_DEPTH: usize = 50;

/// Leading byte of a `LocalVarSig`
const LOCAL_SIG: u8 = 0x07;

/// Decoder for method and local variable signature blobs.
///
/// One decoder reads one blob; spans reported in [`SignatureParameter::type_span`] are byte
/// offsets into that blob.
///
/// ```rust
/// use callscope::metadata::signatures::SignatureParser;
///
/// // instance void M(string)
/// let sig = SignatureParser::new(&[0x20, 0x01, 0x01, 0x0E]).parse_method_signature()?;
/// assert!(sig.has_this());
/// assert_eq!(sig.params.len(), 1);
/// # Ok::<(), callscope::Error>(())
/// ```
pub struct SignatureParser<'a> {
    cursor: Parser<'a>,
    depth: usize,
    max_depth: usize,
}

/// Element types that carry no further data
fn leaf_type(element: u8) -> Option<TypeSignature> {
    let leaf = match element {
        ELEMENT_TYPE::VOID => TypeSignature::Void,
        ELEMENT_TYPE::BOOLEAN => TypeSignature::Boolean,
        ELEMENT_TYPE::CHAR => TypeSignature::Char,
        ELEMENT_TYPE::I1 => TypeSignature::I1,
        ELEMENT_TYPE::U1 => TypeSignature::U1,
        ELEMENT_TYPE::I2 => TypeSignature::I2,
        ELEMENT_TYPE::U2 => TypeSignature::U2,
        ELEMENT_TYPE::I4 => TypeSignature::I4,
        ELEMENT_TYPE::U4 => TypeSignature::U4,
        ELEMENT_TYPE::I8 => TypeSignature::I8,
        ELEMENT_TYPE::U8 => TypeSignature::U8,
        ELEMENT_TYPE::R4 => TypeSignature::R4,
        ELEMENT_TYPE::R8 => TypeSignature::R8,
        ELEMENT_TYPE::I => TypeSignature::I,
        ELEMENT_TYPE::U => TypeSignature::U,
        ELEMENT_TYPE::STRING => TypeSignature::String,
        ELEMENT_TYPE::OBJECT => TypeSignature::Object,
        ELEMENT_TYPE::TYPEDBYREF => TypeSignature::TypedByRef,
        ELEMENT_TYPE::INTERNAL => TypeSignature::Internal,
        _ => return None,
    };
    Some(leaf)
}

impl<'a> SignatureParser<'a> {
    /// Decoder over `data` with the default nesting limit.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_max_depth(data, MAX_RECURSION_DEPTH)
    }

    /// Decoder over `data` that gives up after `max_depth` nested types.
    #[must_use]
    pub fn with_max_depth(data: &'a [u8], max_depth: usize) -> Self {
        SignatureParser {
            cursor: Parser::new(data),
            depth: 0,
            max_depth,
        }
    }

    /// Decodes one type.
    ///
    /// # Errors
    /// [`crate::Error::RecursionLimit`] past the nesting limit, [`crate::Error::Malformed`]
    /// for unknown element types and [`crate::Error::OutOfBounds`] on truncation.
    pub fn parse_type(&mut self) -> Result<TypeSignature> {
        if self.depth + 1 >= self.max_depth {
            return Err(RecursionLimit(self.max_depth));
        }

        self.depth += 1;
        let decoded = self.decode_type();
        self.depth -= 1;
        decoded
    }

    fn decode_type(&mut self) -> Result<TypeSignature> {
        let element = self.cursor.read_le::<u8>()?;
        if let Some(leaf) = leaf_type(element) {
            return Ok(leaf);
        }

        let decoded = match element {
            ELEMENT_TYPE::PTR => TypeSignature::Ptr(self.boxed_type()?),
            ELEMENT_TYPE::BYREF => TypeSignature::ByRef(self.boxed_type()?),
            ELEMENT_TYPE::PINNED => TypeSignature::Pinned(self.boxed_type()?),
            ELEMENT_TYPE::SZARRAY => TypeSignature::SzArray(self.boxed_type()?),
            ELEMENT_TYPE::VALUETYPE => {
                TypeSignature::ValueType(self.cursor.read_compressed_token()?)
            }
            ELEMENT_TYPE::CLASS => TypeSignature::Class(self.cursor.read_compressed_token()?),
            ELEMENT_TYPE::VAR => {
                TypeSignature::GenericParamType(self.cursor.read_compressed_uint()?)
            }
            ELEMENT_TYPE::MVAR => {
                TypeSignature::GenericParamMethod(self.cursor.read_compressed_uint()?)
            }
            ELEMENT_TYPE::ARRAY => self.decode_array()?,
            ELEMENT_TYPE::GENERICINST => self.decode_generic_inst()?,
            ELEMENT_TYPE::FNPTR => TypeSignature::FnPtr(Box::new(self.parse_method_signature()?)),
            ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                let mut modifiers = vec![CustomModifier {
                    required: element == ELEMENT_TYPE::CMOD_REQD,
                    modifier: self.cursor.read_compressed_token()?,
                }];
                modifiers.extend(self.modifiers()?);
                TypeSignature::Modified(modifiers, self.boxed_type()?)
            }
            other => return Err(malformed_error!("Unknown element type 0x{:02X}", other)),
        };
        Ok(decoded)
    }

    fn boxed_type(&mut self) -> Result<Box<TypeSignature>> {
        self.parse_type().map(Box::new)
    }

    /// `ARRAY Type Rank NumSizes Size* NumLoBounds LoBound*`; bounds are read and dropped
    fn decode_array(&mut self) -> Result<TypeSignature> {
        let base = self.boxed_type()?;
        let rank = self.cursor.read_compressed_uint()?;
        for _ in 0..2 {
            let bounds = self.cursor.read_compressed_uint()?;
            for _ in 0..bounds {
                self.cursor.read_compressed_uint()?;
            }
        }
        Ok(TypeSignature::Array(SignatureArray { base, rank }))
    }

    /// `GENERICINST (CLASS | VALUETYPE) TypeDefOrRefOrSpecEncoded GenArgCount Type*`
    fn decode_generic_inst(&mut self) -> Result<TypeSignature> {
        let kind = self.cursor.peek_byte()?;
        if !matches!(kind, ELEMENT_TYPE::CLASS | ELEMENT_TYPE::VALUETYPE) {
            return Err(malformed_error!(
                "Generic instantiation over element type 0x{:02X}",
                kind
            ));
        }

        let generic = self.boxed_type()?;
        let count = self.bounded_count("generic argument")?;
        let arguments = (0..count)
            .map(|_| self.parse_type())
            .collect::<Result<Vec<_>>>()?;
        Ok(TypeSignature::GenericInst(generic, arguments))
    }

    /// Reads a compressed count that cannot exceed the unread bytes, one byte per item at least
    fn bounded_count(&mut self, what: &str) -> Result<usize> {
        let count = self.cursor.read_compressed_uint()? as usize;
        if count > self.cursor.remaining() {
            return Err(malformed_error!(
                "{} count {} larger than the remaining {} bytes",
                what,
                count,
                self.cursor.remaining()
            ));
        }
        Ok(count)
    }

    /// Consumes a run of `CMOD_REQD`/`CMOD_OPT` prefixes
    fn modifiers(&mut self) -> Result<Vec<CustomModifier>> {
        let mut modifiers = Vec::new();
        while self.cursor.has_more_data() {
            let required = match self.cursor.peek_byte()? {
                ELEMENT_TYPE::CMOD_REQD => true,
                ELEMENT_TYPE::CMOD_OPT => false,
                _ => break,
            };
            self.cursor.advance()?;
            modifiers.push(CustomModifier {
                required,
                modifier: self.cursor.read_compressed_token()?,
            });
        }
        Ok(modifiers)
    }

    fn modifier_tokens(&mut self) -> Result<Vec<Token>> {
        Ok(self
            .modifiers()?
            .into_iter()
            .map(|modifier| modifier.modifier)
            .collect())
    }

    /// Consumes a `BYREF` prefix if present
    fn take_by_ref(&mut self) -> Result<bool> {
        let by_ref = self.cursor.peek_byte()? == ELEMENT_TYPE::BYREF;
        if by_ref {
            self.cursor.advance()?;
        }
        Ok(by_ref)
    }

    /// `CustomMod* [BYREF] Type`, also used for the return type
    fn parameter(&mut self) -> Result<SignatureParameter> {
        let modifiers = self.modifier_tokens()?;
        let by_ref = self.take_by_ref()?;

        let start = self.cursor.pos();
        let base = self.parse_type()?;
        let type_span = start..self.cursor.pos();

        Ok(SignatureParameter {
            modifiers,
            by_ref,
            base,
            type_span,
        })
    }

    /// Decodes a `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`.
    ///
    /// Parameters after a `SENTINEL` land in [`SignatureMethod::varargs`].
    ///
    /// # Errors
    /// Returns an error for malformed or truncated blobs.
    pub fn parse_method_signature(&mut self) -> Result<SignatureMethod> {
        let header = self.cursor.read_le::<u8>()?;
        let flags = CallingConvention::from_bits_truncate(header);

        let param_count_generic = if flags.contains(CallingConvention::GENERIC) {
            self.cursor.read_compressed_uint()?
        } else {
            0
        };
        let count = self.bounded_count("parameter")?;
        let return_type = self.parameter()?;

        let mut params = Vec::with_capacity(count);
        let mut varargs = Vec::new();
        let mut past_sentinel = false;
        for _ in 0..count {
            if !past_sentinel && self.cursor.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                self.cursor.advance()?;
                past_sentinel = true;
            }
            let parameter = self.parameter()?;
            if past_sentinel {
                varargs.push(parameter);
            } else {
                params.push(parameter);
            }
        }

        Ok(SignatureMethod {
            flags,
            kind: header & 0x0F,
            param_count_generic,
            return_type,
            params,
            varargs,
        })
    }

    /// Decodes a `LocalVarSig` (`0x07 Count (TYPEDBYREF | (CustomMod | PINNED)* [BYREF] Type)*`).
    ///
    /// # Errors
    /// Returns an error when the blob does not start with `0x07` or a local cannot be decoded.
    pub fn parse_local_var_signature(&mut self) -> Result<SignatureLocalVariables> {
        let header = self.cursor.read_le::<u8>()?;
        if header != LOCAL_SIG {
            return Err(malformed_error!(
                "Local variable signature starts with 0x{:02X}",
                header
            ));
        }

        let count = self.bounded_count("local")?;
        let locals = (0..count)
            .map(|_| self.local())
            .collect::<Result<Vec<_>>>()?;
        Ok(SignatureLocalVariables { locals })
    }

    fn local(&mut self) -> Result<SignatureLocalVariable> {
        if self.cursor.peek_byte()? == ELEMENT_TYPE::TYPEDBYREF {
            self.cursor.advance()?;
            return Ok(SignatureLocalVariable {
                base: TypeSignature::TypedByRef,
                ..SignatureLocalVariable::default()
            });
        }

        let mut local = SignatureLocalVariable::default();
        loop {
            local.modifiers.extend(self.modifier_tokens()?);
            if self.cursor.peek_byte()? != ELEMENT_TYPE::PINNED {
                break;
            }
            self.cursor.advance()?;
            local.is_pinned = true;
        }
        local.is_byref = self.take_by_ref()?;
        local.base = self.parse_type()?;
        Ok(local)
    }
}
