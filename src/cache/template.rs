//! Pretty-print templates of instrumented methods.
//!
//! A template renders one call as `Type.Method<Args>(name: {0}, ref other: {1})`. Captured
//! arguments are numbered in the order they are delivered; an argument that cannot be captured
//! is rendered as the escaped literal `{{unsupported}}` and does not consume a number.

use std::fmt::Write as _;

use crate::{
    classifier::BoxingInstruction,
    runtime::{strip_arity, MethodInfo, RuntimeType},
};

/// Literal written in place of an argument that cannot be captured.
pub const UNSUPPORTED_PLACEHOLDER: &str = "{{unsupported}}";

/// Builds the template of `method` given one instruction per argument.
///
/// `instructions` must start with the implicit `this` for instance methods, exactly as
/// produced by [`crate::classifier::SignatureClassifier::classify`].
#[must_use]
pub fn build_template(method: &MethodInfo, instructions: &[BoxingInstruction]) -> String {
    let mut template = String::new();

    if let Some(declaring) = &method.declaring_type {
        push_escaped(&mut template, &declaring.display_name(true));
        template.push('.');
    }
    push_escaped(&mut template, strip_arity(&method.name));

    if !method.generic_args.is_empty() {
        let args: Vec<String> = method
            .generic_args
            .iter()
            .map(|arg| arg.display_name(false))
            .collect();
        template.push('<');
        push_escaped(&mut template, &args.join(", "));
        template.push('>');
    }

    template.push('(');

    let mut next_placeholder = 0usize;
    let mut instructions = instructions.iter();
    let mut first = true;

    let mut push_argument =
        |template: &mut String, label: &str, instruction: Option<&BoxingInstruction>| {
            if !first {
                template.push_str(", ");
            }
            first = false;

            push_escaped(template, label);
            template.push_str(": ");
            match instruction {
                Some(instruction) if instruction.is_supported() => {
                    let _ = write!(template, "{{{next_placeholder}}}");
                    next_placeholder += 1;
                }
                _ => template.push_str(UNSUPPORTED_PLACEHOLDER),
            }
        };

    if method.has_this() {
        push_argument(&mut template, "this", instructions.next());
    }

    for (index, parameter) in method.parameters.iter().enumerate() {
        let mut label = String::new();
        if let Some(keyword) = parameter.effective_modifier().keyword() {
            label.push_str(keyword);
            label.push(' ');
        }
        if parameter.name.is_empty() {
            let _ = write!(label, "arg{index}");
        } else {
            label.push_str(&parameter.name);
        }
        push_argument(&mut template, &label, instructions.next());
    }

    template.push(')');
    template
}

/// Renders a type for diagnostics, `<global>` for module-level functions.
#[must_use]
pub fn declaring_type_label(declaring: Option<&RuntimeType>) -> String {
    declaring.map_or_else(|| "<global>".to_string(), |ty| ty.display_name(true))
}

/// Appends `text` with literal braces doubled so they survive placeholder substitution.
fn push_escaped(template: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '{' => template.push_str("{{"),
            '}' => template.push_str("}}"),
            c => template.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::SignatureClassifier,
        metadata::token::Token,
        runtime::{LoadedModule, ParamModifier, ParameterInfo, PrimitiveType},
        test::factories::{bar_with_ref, int32},
    };

    #[test]
    fn test_unsupported_ref_parameter() {
        let method = bar_with_ref();
        let instructions =
            SignatureClassifier::new().classify(&LoadedModule::new(1, "App.dll"), &method);
        assert_eq!(
            build_template(&method, &instructions),
            "Foo.Bar(x: {0}, ref y: {{unsupported}})"
        );
    }

    #[test]
    fn test_instance_and_generic_method() {
        let method = MethodInfo::new(
            Token::new(0x0600_0005),
            Some(
                RuntimeType::class("App.Data", "Repository`1")
                    .with_generic_args(vec![RuntimeType::class("App", "Order")]),
            ),
            "Find`1",
        )
        .instance()
        .with_generic_args(vec![RuntimeType::primitive(PrimitiveType::Int64)])
        .with_param(ParameterInfo::new("key", RuntimeType::primitive(PrimitiveType::Int64)))
        .with_param(ParameterInfo::by_ref(
            "found",
            RuntimeType::class("App", "Order"),
            ParamModifier::Out,
        ));

        let instructions = vec![
            BoxingInstruction::PassThroughObject,
            BoxingInstruction::Primitive(PrimitiveType::Int64),
            BoxingInstruction::Unsupported,
        ];
        assert_eq!(
            build_template(&method, &instructions),
            "App.Data.Repository<Order>.Find<Int64>(this: {0}, key: {1}, out found: {{unsupported}})"
        );
    }

    #[test]
    fn test_unsupported_consumes_no_index() {
        let method = MethodInfo::new(Token::new(0x0600_0006), None, "Mix")
            .with_param(ParameterInfo::new("a", RuntimeType::pointer(int32())))
            .with_param(ParameterInfo::new("", int32()))
            .with_param(ParameterInfo::new("c", RuntimeType::string()));

        let instructions = vec![
            BoxingInstruction::Unsupported,
            BoxingInstruction::Primitive(PrimitiveType::Int32),
            BoxingInstruction::PassThroughObject,
        ];
        assert_eq!(
            build_template(&method, &instructions),
            "Mix(a: {{unsupported}}, arg1: {0}, c: {1})"
        );
    }

    #[test]
    fn test_braces_in_names_are_escaped() {
        let method =
            MethodInfo::new(Token::new(0x0600_0007), Some(RuntimeType::class("", "W{x}")), "M");
        assert_eq!(build_template(&method, &[]), "W{{x}}.M()");
    }
}
