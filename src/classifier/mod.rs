//! Per-parameter boxing classification of method arguments.
//!
//! When a method is selected for capture, every argument the probe receives (including an
//! implicit `this`) gets exactly one [`BoxingInstruction`] telling the native layer how to hand
//! it to the managed callback. Classification never fails: whatever cannot be expressed
//! degrades to [`BoxingInstruction::Unsupported`] for that argument only.
//!
//! # Classification Order
//!
//! 1. Runtime introspection of the declared parameter type. Primitives, reference types and
//!    value types with a module-local token are decided here.
//! 2. For value types that introspection cannot map to a token of the method's module, the
//!    method's own signature blob is decoded (see the private `fallback` module).
//!
//! # Examples
//!
//! ```rust
//! use callscope::classifier::{BoxingInstruction, SignatureClassifier};
//! use callscope::metadata::token::Token;
//! use callscope::runtime::{LoadedModule, MethodInfo, ParameterInfo, PrimitiveType, RuntimeType};
//!
//! let module = LoadedModule::new(1, "App.dll");
//! let method = MethodInfo::new(Token::new(0x0600_0001), None, "Run")
//!     .with_param(ParameterInfo::new("count", RuntimeType::primitive(PrimitiveType::Int32)));
//!
//! let instructions = SignatureClassifier::new().classify(&module, &method);
//! assert_eq!(instructions, vec![BoxingInstruction::Primitive(PrimitiveType::Int32)]);
//! ```

mod boxing;
mod fallback;

pub use boxing::{primitive_code, BoxingInstruction};

use crate::{
    metadata::signatures::MAX_RECURSION_DEPTH,
    runtime::{LoadedModule, MethodInfo, RuntimeType, TypeKind},
};

/// Outcome of classifying a type through runtime introspection alone.
enum Introspection {
    Decided(BoxingInstruction),
    NeedsSignature,
}

/// Computes the boxing instructions of a method's arguments.
#[derive(Debug, Clone, Copy)]
pub struct SignatureClassifier {
    max_depth: usize,
}

impl Default for SignatureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureClassifier {
    /// Creates a classifier with the default signature nesting limit.
    #[must_use]
    pub fn new() -> Self {
        SignatureClassifier {
            max_depth: MAX_RECURSION_DEPTH,
        }
    }

    /// Creates a classifier with a custom signature nesting limit.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        SignatureClassifier { max_depth }
    }

    /// Classifies every argument of `method`, which must be defined in `module`.
    ///
    /// The result has one entry per argument, the implicit `this` first for instance methods.
    #[must_use]
    pub fn classify(&self, module: &LoadedModule, method: &MethodInfo) -> Vec<BoxingInstruction> {
        let mut instructions =
            Vec::with_capacity(method.parameters.len() + usize::from(method.has_this()));
        let mut pending = Vec::new();

        if method.has_this() {
            instructions.push(classify_receiver(method.declaring_type.as_ref()));
        }

        for (index, parameter) in method.parameters.iter().enumerate() {
            match introspect(module, &parameter.ty) {
                Introspection::Decided(instruction) => instructions.push(instruction),
                Introspection::NeedsSignature => {
                    pending.push((instructions.len(), index));
                    instructions.push(BoxingInstruction::Unsupported);
                }
            }
        }

        if !pending.is_empty() {
            fallback::resolve_pending(module, method, &pending, &mut instructions, self.max_depth);
        }

        instructions
    }
}

/// A value type receiver is passed as a managed pointer and cannot be boxed.
fn classify_receiver(declaring_type: Option<&RuntimeType>) -> BoxingInstruction {
    match declaring_type {
        Some(ty) if ty.is_value_type() => BoxingInstruction::Unsupported,
        _ => BoxingInstruction::PassThroughObject,
    }
}

fn introspect(module: &LoadedModule, ty: &RuntimeType) -> Introspection {
    if ty.contains_generic_parameters() {
        return Introspection::Decided(BoxingInstruction::Unsupported);
    }

    match ty.kind {
        TypeKind::ByRef
        | TypeKind::Pointer
        | TypeKind::ByRefLike
        | TypeKind::FunctionPointer
        | TypeKind::GenericParameter { .. } => {
            Introspection::Decided(BoxingInstruction::Unsupported)
        }
        TypeKind::Primitive(primitive) => {
            Introspection::Decided(BoxingInstruction::Primitive(primitive))
        }
        TypeKind::String
        | TypeKind::Object
        | TypeKind::Class
        | TypeKind::Interface
        | TypeKind::Array { .. }
        | TypeKind::SzArray => Introspection::Decided(BoxingInstruction::PassThroughObject),
        TypeKind::ValueType | TypeKind::Enum => introspect_value_type(module, ty),
    }
}

fn introspect_value_type(module: &LoadedModule, ty: &RuntimeType) -> Introspection {
    // Instantiations have no single token; the definition's token would box the wrong type
    if !ty.generic_args.is_empty() {
        return Introspection::NeedsSignature;
    }

    let same_module = ty
        .module
        .as_deref()
        .is_some_and(|name| name.eq_ignore_ascii_case(&module.name));

    if same_module {
        if let Some(token) = ty.token {
            return Introspection::Decided(BoxingInstruction::MetadataToken(token));
        }
    } else if let Some(token) = module.find_type_ref(&ty.namespace, &ty.name) {
        return Introspection::Decided(BoxingInstruction::MetadataToken(token));
    }

    Introspection::NeedsSignature
}
