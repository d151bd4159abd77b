//! Parser for `--set` style assignments.
//!
//! Input is a comma separated list of `key=value` assignments. Keys are
//! dotted paths whose segments may carry list indices (`servers[0].port`).
//! A value wrapped in braces is a list (`tags={a,b}`). A backslash escapes
//! the next character, so `\,` and `\.` produce a literal comma and dot.

use serde_yaml::{Mapping, Value};

/// How assignment values are typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `--set`: bools, null and integers are recognised.
    Typed,
    /// `--set-string`: everything stays a string.
    String,
}

/// One key segment: a map key followed by zero or more list indices.
#[derive(Debug, PartialEq, Eq)]
struct Segment {
    name: String,
    indices: Vec<usize>,
}

/// Parses `input` and applies every assignment to `dest`.
///
/// # Errors
///
/// Returns a description of the first malformed assignment.
pub fn parse_into(input: &str, dest: &mut Mapping, kind: ValueKind) -> Result<(), String> {
    apply(input, dest, |raw| Ok(convert(raw, kind)))
}

/// Parses `key=path` assignments, replacing each path with what `read`
/// returns for it.
///
/// # Errors
///
/// Returns a description of the first malformed assignment or read failure.
pub fn parse_file_into<F>(input: &str, dest: &mut Mapping, mut read: F) -> Result<(), String>
where
    F: FnMut(&str) -> Result<String, String>,
{
    apply(input, dest, |raw| read(raw).map(Value::String))
}

/// Splits assignments and sets each one on `dest`.
fn apply<F>(input: &str, dest: &mut Mapping, mut to_value: F) -> Result<(), String>
where
    F: FnMut(&str) -> Result<Value, String>,
{
    for assignment in split_unescaped(input, ',', true) {
        if assignment.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = split_once_unescaped(&assignment, '=') else {
            return Err(format!("key \"{assignment}\" has no value"));
        };

        let segments = parse_key(raw_key)?;

        let value = match raw_value
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Some(items) => Value::Sequence(
                split_unescaped(items, ',', false)
                    .iter()
                    .map(|item| to_value(item.as_str()))
                    .collect::<Result<_, _>>()?,
            ),
            None => to_value(unescape(raw_value).as_str())?,
        };

        let mut root = Value::Mapping(std::mem::take(dest));
        set_path(&mut root, &segments, value);
        if let Value::Mapping(map) = root {
            *dest = map;
        }
    }
    Ok(())
}

/// Converts a raw scalar according to `kind`.
fn convert(raw: &str, kind: ValueKind) -> Value {
    if kind == ValueKind::String {
        return Value::String(raw.to_string());
    }

    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            let leading_zero = raw.len() > 1 && raw.starts_with('0');
            match raw.parse::<i64>() {
                Ok(number) if !leading_zero => Value::Number(number.into()),
                _ => Value::String(raw.to_string()),
            }
        }
    }
}

/// Splits on `sep` where it is not escaped (and, optionally, not inside
/// braces). Escapes of `sep` are resolved; other escapes are kept.
fn split_unescaped(input: &str, sep: char, respect_braces: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) if next == sep => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            '{' if respect_braces => {
                depth += 1;
                current.push(c);
            }
            '}' if respect_braces => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c == sep && depth == 0 => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Splits at the first unescaped `sep`.
fn split_once_unescaped(input: &str, sep: char) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (index, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some((&input[..index], &input[index + c.len_utf8()..]));
        }
    }
    None
}

/// Removes backslash escapes.
fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Parses a dotted key with optional list indices.
fn parse_key(raw: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();

    for part in split_unescaped(raw, '.', false) {
        let (name, mut rest) = match part.find('[') {
            Some(open) => (&part[..open], &part[open..]),
            None => (part.as_str(), ""),
        };

        let name = unescape(name);
        if name.is_empty() {
            return Err(format!("key \"{raw}\" has an empty segment"));
        }

        let mut indices = Vec::new();
        while !rest.is_empty() {
            let close = rest
                .find(']')
                .filter(|_| rest.starts_with('['))
                .ok_or_else(|| format!("key \"{raw}\" has an unterminated index"))?;
            let index = rest[1..close]
                .parse::<usize>()
                .map_err(|_| format!("key \"{raw}\" has an invalid index \"{}\"", &rest[1..close]))?;
            indices.push(index);
            rest = &rest[close + 1..];
        }

        segments.push(Segment { name, indices });
    }

    Ok(segments)
}

/// Sets `value` at `segments` below `target`, creating maps and lists.
fn set_path(target: &mut Value, segments: &[Segment], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    let map = as_mapping(target);
    let mut slot = map
        .entry(Value::String(first.name.clone()))
        .or_insert(Value::Null);

    for &index in &first.indices {
        let items = as_sequence(slot);
        if items.len() <= index {
            items.resize(index + 1, Value::Null);
        }
        slot = &mut items[index];
    }

    set_path(slot, rest, value);
}

/// Turns `slot` into a map if it is not one already.
fn as_mapping(slot: &mut Value) -> &mut Mapping {
    if !slot.is_mapping() {
        *slot = Value::Mapping(Mapping::new());
    }
    match slot {
        Value::Mapping(map) => map,
        _ => unreachable!("slot was just made a mapping"),
    }
}

/// Turns `slot` into a list if it is not one already.
fn as_sequence(slot: &mut Value) -> &mut Vec<Value> {
    if !slot.is_sequence() {
        *slot = Value::Sequence(Vec::new());
    }
    match slot {
        Value::Sequence(items) => items,
        _ => unreachable!("slot was just made a sequence"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str, kind: ValueKind) -> Value {
        let mut dest = Mapping::new();
        parse_into(input, &mut dest, kind).expect("parse");
        Value::Mapping(dest)
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).expect("yaml")
    }

    #[test]
    fn test_simple_and_nested() {
        assert_eq!(
            parse("name=web,image.tag=v2", ValueKind::Typed),
            yaml("name: web\nimage:\n  tag: v2\n")
        );
    }

    #[test]
    fn test_typed_scalars() {
        assert_eq!(
            parse("a=true,b=false,c=null,d=42,e=007,f=-3,g=1.5", ValueKind::Typed),
            yaml("a: true\nb: false\nc: null\nd: 42\ne: '007'\nf: -3\ng: '1.5'\n")
        );
    }

    #[test]
    fn test_string_kind_keeps_strings() {
        assert_eq!(
            parse("port=8080,enabled=true", ValueKind::String),
            yaml("port: '8080'\nenabled: 'true'\n")
        );
    }

    #[test]
    fn test_list_values() {
        assert_eq!(
            parse("tags={a,b,3},name=x", ValueKind::Typed),
            yaml("tags: [a, b, 3]\nname: x\n")
        );
    }

    #[test]
    fn test_indices() {
        assert_eq!(
            parse("servers[1].port=80", ValueKind::Typed),
            yaml("servers:\n  - null\n  - port: 80\n")
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            parse(r"annotations.kubernetes\.io/name=a\,b", ValueKind::Typed),
            yaml("annotations:\n  kubernetes.io/name: 'a,b'\n")
        );
    }

    #[test]
    fn test_later_assignment_wins() {
        assert_eq!(parse("a.b=1,a.b=2", ValueKind::Typed), yaml("a:\n  b: 2\n"));
    }

    #[test]
    fn test_scalar_replaced_by_map() {
        assert_eq!(parse("a=1,a.b=2", ValueKind::Typed), yaml("a:\n  b: 2\n"));
    }

    #[test]
    fn test_empty_value() {
        assert_eq!(parse("a=", ValueKind::Typed), yaml("a: ''\n"));
    }

    #[test]
    fn test_missing_equals_is_error() {
        let mut dest = Mapping::new();
        let err = parse_into("name", &mut dest, ValueKind::Typed).expect_err("error");
        assert!(err.contains("has no value"));
    }

    #[test]
    fn test_bad_index_is_error() {
        let mut dest = Mapping::new();
        assert!(parse_into("a[x]=1", &mut dest, ValueKind::Typed).is_err());
        assert!(parse_into("a[1=1", &mut dest, ValueKind::Typed).is_err());
        assert!(parse_into("a..b=1", &mut dest, ValueKind::Typed).is_err());
    }

    #[test]
    fn test_file_values_use_reader() {
        let mut dest = Mapping::new();
        parse_file_into("config.script=run.sh", &mut dest, |path| {
            Ok(format!("contents of {path}"))
        })
        .expect("parse");
        assert_eq!(
            Value::Mapping(dest),
            yaml("config:\n  script: contents of run.sh\n")
        );
    }
}
