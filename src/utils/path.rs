//! Path lookups into nested JSON values (`data.items[0].title` style).

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn as_key(&self) -> String {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string(),
        }
    }
}

/// Split a path into keys and indices. `a.b[0]["c.d"]` → `a`, `b`, `0`, `c.d`.
fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    let flush = |current: &mut String, segments: &mut Vec<Segment>| {
        if !current.is_empty() {
            segments.push(Segment::Key(std::mem::take(current)));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                let trimmed = inner.trim();
                let quoted = trimmed.len() >= 2
                    && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
                        || (trimmed.starts_with('\'') && trimmed.ends_with('\'')));
                if quoted {
                    segments.push(Segment::Key(trimmed[1..trimmed.len() - 1].to_string()));
                } else if let Ok(index) = trimmed.parse::<usize>() {
                    segments.push(Segment::Index(index));
                } else if !trimmed.is_empty() {
                    segments.push(Segment::Key(trimmed.to_string()));
                }
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut segments);
    segments
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), segment) => map.get(&segment.as_key()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        (Value::Array(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        _ => None,
    }
}

/// Resolve `path` inside `value`. A missing key or index yields `None`.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    parse(path)
        .iter()
        .try_fold(value, |current, segment| step(current, segment))
}

/// Write `new_value` at `path`, creating intermediate objects (or arrays, for
/// numeric segments) as needed. Non-container intermediates are replaced.
pub fn set(value: &mut Value, path: &str, new_value: Value) {
    let segments = parse(path);
    if segments.is_empty() {
        *value = new_value;
        return;
    }

    let mut current = value;
    for (i, segment) in segments.iter().enumerate() {
        let is_last = i + 1 == segments.len();
        let next_is_index = matches!(segments.get(i + 1), Some(Segment::Index(_)));

        match segment {
            Segment::Index(index) if current.is_array() => {
                let Value::Array(items) = current else {
                    unreachable!()
                };
                if items.len() <= *index {
                    items.resize(*index + 1, Value::Null);
                }
                if is_last {
                    items[*index] = new_value;
                    return;
                }
                current = &mut items[*index];
            }
            segment => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                let Value::Object(map) = current else {
                    unreachable!()
                };
                let key = segment.as_key();
                if is_last {
                    map.insert(key, new_value);
                    return;
                }
                current = map.entry(key).or_insert(Value::Null);
            }
        }

        if !is_last && !current.is_object() && !current.is_array() {
            *current = if next_is_index {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            };
        }
    }
}

/// JavaScript-style truthiness of a resolved value.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
