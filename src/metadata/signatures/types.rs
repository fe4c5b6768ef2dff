use std::ops::Range;

use bitflags::bitflags;

use crate::metadata::token::Token;

/// Element type codes (ECMA-335 II.23.1.16) understood by the decoder.
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    // Leaf types
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const OBJECT: u8 = 0x1C;
    pub const INTERNAL: u8 = 0x21;

    // Wrap a nested type
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const SZARRAY: u8 = 0x1D;
    pub const PINNED: u8 = 0x45;

    // Carry a TypeDefOrRefOrSpecEncoded token
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;

    // Carry a generic parameter index
    pub const VAR: u8 = 0x13;
    pub const MVAR: u8 = 0x1E;

    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const FNPTR: u8 = 0x1B;
    /// Separates fixed from vararg parameters in a call site signature
    pub const SENTINEL: u8 = 0x41;
}

/// A type as written in a method or local variable signature.
///
/// Leaf variants mirror the element type of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub enum TypeSignature {
    /// Placeholder for a type that was never decoded
    #[default]
    Unknown,
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    /// Native-sized signed integer (`System.IntPtr`)
    I,
    /// Native-sized unsigned integer (`System.UIntPtr`)
    U,
    String,
    Object,
    /// Unmanaged pointer
    Ptr(Box<TypeSignature>),
    /// Managed reference
    ByRef(Box<TypeSignature>),
    /// Value type named by a `TypeDef`, `TypeRef` or `TypeSpec` token
    ValueType(Token),
    /// Reference type named by a `TypeDef`, `TypeRef` or `TypeSpec` token
    Class(Token),
    /// `!n`, the n-th generic parameter of the declaring type
    GenericParamType(u32),
    /// `!!n`, the n-th generic parameter of the method
    GenericParamMethod(u32),
    /// Array with an explicit rank
    Array(SignatureArray),
    /// Zero-based one-dimensional array
    SzArray(Box<TypeSignature>),
    /// Generic definition applied to its arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    TypedByRef,
    /// Function pointer with its own method signature
    FnPtr(Box<SignatureMethod>),
    /// Type preceded by `modreq`/`modopt` entries
    Modified(Vec<CustomModifier>, Box<TypeSignature>),
    /// Pinned local
    Pinned(Box<TypeSignature>),
    Internal,
}

impl TypeSignature {
    /// Returns `true` for the scalar types that have a fixed boxing code.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeSignature::Boolean
                | TypeSignature::Char
                | TypeSignature::I1
                | TypeSignature::U1
                | TypeSignature::I2
                | TypeSignature::U2
                | TypeSignature::I4
                | TypeSignature::U4
                | TypeSignature::I8
                | TypeSignature::U8
                | TypeSignature::R4
                | TypeSignature::R8
                | TypeSignature::I
                | TypeSignature::U
        )
    }
}

/// A `modreq`/`modopt` entry preceding a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomModifier {
    /// `true` for `modreq`, `false` for `modopt`
    pub required: bool,
    /// The modifier type - `TypeDefOrRefOrSpecEncoded`
    pub modifier: Token,
}

/// An `ARRAY` type. Sizes and lower bounds are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureArray {
    /// Element type
    pub base: Box<TypeSignature>,
    /// Dimension count
    pub rank: u32,
}

bitflags! {
    /// Flag bits of the calling convention byte (ECMA-335 II.23.2.1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CallingConvention: u8 {
        /// The method carries generic parameters
        const GENERIC = 0x10;
        /// Instance method with an implicit `this`
        const HAS_THIS = 0x20;
        /// `this` is passed explicitly as the first parameter
        const EXPLICIT_THIS = 0x40;
    }
}

/// One parameter, or the return type, of a method signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureParameter {
    /// Tokens of the leading `modreq`/`modopt` entries
    pub modifiers: Vec<Token>,
    /// Preceded by `BYREF`
    pub by_ref: bool,
    /// Type after the modifiers and `BYREF`
    pub base: TypeSignature,
    /// Byte range of `base` inside the signature blob it was decoded from
    pub type_span: Range<usize>,
}

/// `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig` (II.23.2.1 to II.23.2.3)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureMethod {
    /// Flag bits of the calling convention byte
    pub flags: CallingConvention,
    /// Low nibble of the calling convention byte (default, vararg, unmanaged kinds)
    pub kind: u8,
    /// Number of generic parameters, if the method is generic
    pub param_count_generic: u32,
    /// Return type
    pub return_type: SignatureParameter,
    /// Parameters before any `SENTINEL`
    pub params: Vec<SignatureParameter>,
    /// Parameters after the `SENTINEL`
    pub varargs: Vec<SignatureParameter>,
}

impl SignatureMethod {
    /// Calling convention kind for `vararg` methods
    pub const KIND_VARARG: u8 = 0x5;

    /// Returns `true` if the method has an implicit `this` parameter.
    #[must_use]
    pub fn has_this(&self) -> bool {
        self.flags.contains(CallingConvention::HAS_THIS)
            && !self.flags.contains(CallingConvention::EXPLICIT_THIS)
    }

    /// Returns `true` if the method uses the `vararg` calling convention.
    #[must_use]
    pub fn is_vararg(&self) -> bool {
        self.kind == Self::KIND_VARARG
    }
}

/// `LocalVarSig` (II.23.2.6)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureLocalVariables {
    /// Locals in slot order
    pub locals: Vec<SignatureLocalVariable>,
}

/// One local variable slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureLocalVariable {
    /// Tokens of the `modreq`/`modopt` entries
    pub modifiers: Vec<Token>,
    /// Preceded by `BYREF`
    pub is_byref: bool,
    /// Preceded by `PINNED`
    pub is_pinned: bool,
    /// Slot type
    pub base: TypeSignature,
}
