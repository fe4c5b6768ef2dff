//! Signature based classification for value types introspection cannot resolve.
//!
//! A value type defined in another module, with no `TypeRef` in the method's own module, or a
//! generic instantiation of a value type, has no token the method's module can box it with.
//! For those parameters the method's own signature blob is decoded: a direct
//! `TypeDefOrRefOrSpec` token is used as-is, and a generic instantiation is accepted only if
//! the same instantiation appears in one of the module's local variable signatures, proving
//! the module can materialize it.

use std::sync::Arc;

use tracing::debug;

use crate::{
    classifier::BoxingInstruction,
    metadata::signatures::{SignatureParameter, SignatureParser, TypeSignature},
    runtime::{LoadedModule, MethodInfo},
};

/// Resolves the parameters listed in `pending` from the method's signature blob.
///
/// Each entry of `pending` is `(slot, parameter)`: the position in `instructions` to
/// overwrite and the index of the declared parameter. Slots that cannot be resolved keep
/// their [`BoxingInstruction::Unsupported`] placeholder; a blob that fails to decode leaves
/// every pending slot unsupported.
pub(crate) fn resolve_pending(
    module: &LoadedModule,
    method: &MethodInfo,
    pending: &[(usize, usize)],
    instructions: &mut [BoxingInstruction],
    max_depth: usize,
) {
    if method.signature.is_empty() {
        debug!(
            target: "callscope::classifier",
            method = %method.name,
            "no signature blob available for fallback"
        );
        return;
    }

    let signature =
        match SignatureParser::with_max_depth(&method.signature, max_depth)
            .parse_method_signature()
        {
            Ok(signature) => signature,
            Err(error) => {
                debug!(
                    target: "callscope::classifier",
                    method = %method.name,
                    %error,
                    "signature blob failed to decode"
                );
                return;
            }
        };

    if signature.params.len() != method.parameters.len() {
        debug!(
            target: "callscope::classifier",
            method = %method.name,
            declared = method.parameters.len(),
            decoded = signature.params.len(),
            "signature parameter count mismatch"
        );
        return;
    }

    for &(slot, parameter) in pending {
        let (Some(decoded), Some(target)) =
            (signature.params.get(parameter), instructions.get_mut(slot))
        else {
            continue;
        };
        *target = classify_parameter(module, &method.signature, decoded, max_depth);
    }
}

/// Classifies a single decoded parameter.
fn classify_parameter(
    module: &LoadedModule,
    blob: &[u8],
    parameter: &SignatureParameter,
    max_depth: usize,
) -> BoxingInstruction {
    if parameter.by_ref {
        return BoxingInstruction::Unsupported;
    }

    match &parameter.base {
        TypeSignature::ValueType(token) if token.is_type_def_or_ref_or_spec() => {
            BoxingInstruction::MetadataToken(*token)
        }
        TypeSignature::GenericInst(base, _)
            if matches!(base.as_ref(), TypeSignature::ValueType(_)) =>
        {
            if module_instantiates(module, &parameter.base, max_depth) {
                match blob.get(parameter.type_span.clone()) {
                    Some(bytes) => BoxingInstruction::SignatureBlob(Arc::from(bytes)),
                    None => BoxingInstruction::Unsupported,
                }
            } else {
                BoxingInstruction::Unsupported
            }
        }
        _ => BoxingInstruction::Unsupported,
    }
}

/// Linear scan of the module's local variable signatures for `instantiation`.
fn module_instantiates(
    module: &LoadedModule,
    instantiation: &TypeSignature,
    max_depth: usize,
) -> bool {
    module.local_signatures.iter().any(|standalone| {
        match SignatureParser::with_max_depth(&standalone.blob, max_depth)
            .parse_local_var_signature()
        {
            Ok(locals) => locals
                .locals
                .iter()
                .any(|local| !local.is_byref && local.base == *instantiation),
            Err(error) => {
                debug!(
                    target: "callscope::classifier",
                    token = %standalone.token,
                    %error,
                    "skipping undecodable local signature"
                );
                false
            }
        }
    })
}
