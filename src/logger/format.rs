//! Rendering of captured argument values and call templates.

use std::fmt::Write as _;

use crate::probes::ArgumentValue;

/// Text of an argument that was not captured.
pub const UNSUPPORTED_TEXT: &str = "{unsupported}";

/// Renders argument values and substitutes them into method templates.
///
/// Strings are double-quoted and chars single-quoted with C-style escapes, so an empty string
/// and a missing value stay distinguishable in the log. Objects use their display text when
/// the host supplied one and `{Type.Name}` otherwise.
///
/// ```rust
/// use callscope::logger::ArgumentFormatter;
/// use callscope::probes::ArgumentValue;
///
/// let formatter = ArgumentFormatter;
/// let args = [
///     formatter.format(&ArgumentValue::I32(42)),
///     formatter.format(&ArgumentValue::String("a\"b".into())),
/// ];
/// assert_eq!(
///     formatter.render("Foo.Bar(x: {0}, s: {1}, y: {{unsupported}})", &args),
///     r#"Foo.Bar(x: 42, s: "a\"b", y: {unsupported})"#
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentFormatter;

impl ArgumentFormatter {
    /// Renders a single value.
    #[must_use]
    pub fn format(&self, value: &ArgumentValue) -> String {
        match value {
            ArgumentValue::Null => "null".to_string(),
            ArgumentValue::Bool(v) => v.to_string(),
            ArgumentValue::Char(c) => {
                let mut text = String::with_capacity(3);
                text.push('\'');
                push_escaped(&mut text, *c, '\'');
                text.push('\'');
                text
            }
            ArgumentValue::I8(v) => v.to_string(),
            ArgumentValue::U8(v) => v.to_string(),
            ArgumentValue::I16(v) => v.to_string(),
            ArgumentValue::U16(v) => v.to_string(),
            ArgumentValue::I32(v) => v.to_string(),
            ArgumentValue::U32(v) => v.to_string(),
            ArgumentValue::I64(v) => v.to_string(),
            ArgumentValue::U64(v) => v.to_string(),
            ArgumentValue::IntPtr(v) => format!("0x{v:x}"),
            ArgumentValue::UIntPtr(v) => format!("0x{v:x}"),
            ArgumentValue::Single(v) => format_float(f64::from(*v), v.to_string()),
            ArgumentValue::Double(v) => format_float(*v, v.to_string()),
            ArgumentValue::String(s) => {
                let mut text = String::with_capacity(s.len() + 2);
                text.push('"');
                for c in s.chars() {
                    push_escaped(&mut text, c, '"');
                }
                text.push('"');
                text
            }
            ArgumentValue::Object { type_name, display } => match display {
                Some(display) => display.clone(),
                None => format!("{{{type_name}}}"),
            },
            ArgumentValue::Unsupported => UNSUPPORTED_TEXT.to_string(),
        }
    }

    /// Substitutes `{n}` placeholders with `args[n]` and un-escapes `{{` and `}}`.
    ///
    /// Placeholders without a matching argument are kept verbatim.
    #[must_use]
    pub fn render(&self, template: &str, args: &[String]) -> String {
        let mut rendered =
            String::with_capacity(template.len() + args.iter().map(String::len).sum::<usize>());
        let mut chars = template.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                    chars.next();
                    rendered.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
                    chars.next();
                    rendered.push('}');
                }
                '{' => {
                    let rest = &template[position + 1..];
                    let placeholder = rest
                        .find('}')
                        .map(|end| &rest[..end])
                        .filter(|digits| {
                            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
                        });
                    let argument = placeholder.and_then(|digits| {
                        let index = digits.parse::<usize>().ok()?;
                        Some((digits, args.get(index)?))
                    });

                    match argument {
                        Some((digits, arg)) => {
                            rendered.push_str(arg);
                            for _ in 0..=digits.len() {
                                chars.next();
                            }
                        }
                        None => rendered.push('{'),
                    }
                }
                c => rendered.push(c),
            }
        }

        rendered
    }
}

fn format_float(value: f64, shortest: String) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        shortest
    }
}

fn push_escaped(text: &mut String, c: char, quote: char) {
    match c {
        '\\' => text.push_str("\\\\"),
        '\n' => text.push_str("\\n"),
        '\r' => text.push_str("\\r"),
        '\t' => text.push_str("\\t"),
        '\0' => text.push_str("\\0"),
        c if c == quote => {
            text.push('\\');
            text.push(c);
        }
        c if c.is_control() => {
            let _ = write!(text, "\\u{:04x}", u32::from(c));
        }
        c => text.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        let f = ArgumentFormatter;
        assert_eq!(f.format(&ArgumentValue::Null), "null");
        assert_eq!(f.format(&ArgumentValue::Bool(true)), "true");
        assert_eq!(f.format(&ArgumentValue::I8(-5)), "-5");
        assert_eq!(f.format(&ArgumentValue::U64(u64::MAX)), "18446744073709551615");
        assert_eq!(f.format(&ArgumentValue::IntPtr(255)), "0xff");
        assert_eq!(f.format(&ArgumentValue::Double(0.1)), "0.1");
        assert_eq!(f.format(&ArgumentValue::Single(1.5)), "1.5");
        assert_eq!(f.format(&ArgumentValue::Double(f64::NAN)), "NaN");
        assert_eq!(f.format(&ArgumentValue::Single(f32::NEG_INFINITY)), "-Infinity");
    }

    #[test]
    fn test_text_quoting() {
        let f = ArgumentFormatter;
        assert_eq!(f.format(&ArgumentValue::Char('x')), "'x'");
        assert_eq!(f.format(&ArgumentValue::Char('\'')), r"'\''");
        assert_eq!(f.format(&ArgumentValue::String(String::new())), r#""""#);
        assert_eq!(
            f.format(&ArgumentValue::String("line\n\"q\"\u{1}".into())),
            r#""line\n\"q\"\u0001""#
        );
    }

    #[test]
    fn test_objects() {
        let f = ArgumentFormatter;
        assert_eq!(
            f.format(&ArgumentValue::Object {
                type_name: "App.Order".into(),
                display: None
            }),
            "{App.Order}"
        );
        assert_eq!(
            f.format(&ArgumentValue::Object {
                type_name: "App.Order".into(),
                display: Some("Order #7".into())
            }),
            "Order #7"
        );
        assert_eq!(f.format(&ArgumentValue::Unsupported), UNSUPPORTED_TEXT);
    }

    #[test]
    fn test_render_placeholders() {
        let f = ArgumentFormatter;
        let args = vec!["1".to_string(), "\"two\"".to_string()];
        assert_eq!(f.render("M(a: {0}, b: {1})", &args), "M(a: 1, b: \"two\")");
        assert_eq!(f.render("M({{0}}, {0})", &args), "M({0}, 1)");
        assert_eq!(f.render("M({5}, {x}, {)", &args), "M({5}, {x}, {)");
        assert_eq!(f.render("Foo.Bar(y: {{unsupported}})", &[]), "Foo.Bar(y: {unsupported})");
    }

    #[test]
    fn test_render_does_not_reinterpret_arguments() {
        let f = ArgumentFormatter;
        let args = vec!["{1}".to_string(), "x".to_string()];
        assert_eq!(f.render("{0}{1}", &args), "{1}x");
    }
}
