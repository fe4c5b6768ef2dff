#![no_main]

use libfuzzer_sys::fuzz_target;
use callscope::{
    classifier::SignatureClassifier,
    metadata::{
        signatures::{parse_local_var_signature, parse_method_signature},
        token::Token,
    },
    runtime::{LoadedModule, MethodInfo, ParameterInfo, RuntimeType},
};

fuzz_target!(|data: &[u8]| {
    let _ = parse_method_signature(data);
    let _ = parse_local_var_signature(data);

    // Value type parameters force the classifier onto the signature fallback
    let generic = RuntimeType::value_type("System", "ValueTuple`2")
        .with_generic_args(vec![RuntimeType::object(), RuntimeType::object()]);
    let method = MethodInfo::new(Token::new(0x0600_0001), None, "M")
        .with_param(ParameterInfo::new("a", RuntimeType::value_type("Other", "Point")))
        .with_param(ParameterInfo::new("b", generic))
        .with_signature(data.to_vec());
    let module = LoadedModule::new(1, "Fuzz.dll")
        .with_local_signature(Token::new(0x1100_0001), data.to_vec());

    let instructions = SignatureClassifier::new().classify(&module, &method);
    assert_eq!(instructions.len(), 2);
});
