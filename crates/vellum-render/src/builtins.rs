//! Helpers that ship with the environment.
//!
//! These back default table entries the host usually doesn't provide itself.
//! Host helpers with the same name take precedence over them.
//!
//! - `error(message)`: stops rendering with `message`
//! - `of_type(value, type)`: type test, see [`of_type`]
//! - `slug(text)`: ASCII slug, see [`slugify`]
//!
//! [`register_dump`] adds the `dump()` introspection function, which every
//! environment gets regardless of the debug setting.

use minijinja::value::ValueKind;
use minijinja::{Error, ErrorKind, Value};

use crate::callables::Callable;

/// Returns the builtin helper called `name`, if there is one.
pub fn helper(name: &str) -> Option<Callable> {
    match name {
        "error" => Some(Callable::from_fn(|args| {
            let message = args
                .first()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "template raised an error".to_string());
            Err(Error::new(ErrorKind::InvalidOperation, message))
        })),
        "of_type" => Some(Callable::from_fn(|args| {
            let value = args.first().cloned().unwrap_or(Value::UNDEFINED);
            let type_name = args.get(1).and_then(|v| v.as_str().map(str::to_string));
            Ok(Value::from(of_type(&value, type_name.as_deref())))
        })),
        "slug" => Some(Callable::from_fn(|args| {
            let text = args.first().map(|v| v.to_string()).unwrap_or_default();
            Ok(Value::from(slugify(&text)))
        })),
        _ => None,
    }
}

/// Checks a value against a type name.
///
/// | Name | Matches |
/// |------|---------|
/// | `array` | sequences |
/// | `bool` | booleans |
/// | `float` | numbers that are not integers |
/// | `int` | integers |
/// | `numeric` | numbers and strings that parse as numbers |
/// | `object` | maps and objects |
/// | `scalar` | booleans, numbers and strings |
/// | `string` | strings |
///
/// Any other name, or no name, never matches.
pub fn of_type(value: &Value, type_name: Option<&str>) -> bool {
    let kind = value.kind();
    match type_name {
        Some("array") => kind == ValueKind::Seq,
        Some("bool") => kind == ValueKind::Bool,
        Some("float") => kind == ValueKind::Number && !value.is_integer(),
        Some("int") => kind == ValueKind::Number && value.is_integer(),
        Some("numeric") => match kind {
            ValueKind::Number => true,
            ValueKind::String => value
                .as_str()
                .is_some_and(|s| s.trim().parse::<f64>().is_ok()),
            _ => false,
        },
        Some("object") => matches!(kind, ValueKind::Map | ValueKind::Plain),
        Some("scalar") => matches!(
            kind,
            ValueKind::Bool | ValueKind::Number | ValueKind::String
        ),
        Some("string") => kind == ValueKind::String,
        _ => false,
    }
}

/// Builds a lowercase ASCII slug: transliterates, then joins alphanumeric
/// runs with `-`.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Registers `dump()`.
///
/// With arguments it prints their debug representation; without, it prints
/// the whole render context.
pub fn register_dump(env: &mut minijinja::Environment<'static>) {
    env.add_function("dump", minijinja::functions::debug);
}
