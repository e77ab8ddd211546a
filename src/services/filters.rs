//! Value filter registry.
//!
//! A fixed catalog of named transforms addressed as `{ name, args }`.
//! Unknown names leave the value untouched.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;

use crate::models::{DEFAULT_TIMEZONE_OFFSET, ValueFilter};
use crate::utils::parse::{number_value, parse_size, parse_time_str, parse_ttl};

type FilterFn = fn(Value, &[Value]) -> Value;

static IMDB_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)tt\d{5,}").unwrap());
static DOUBAN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:subject/|^)(\d{5,})").unwrap());

/// Names of every registered filter.
pub const FILTER_NAMES: [&str; 17] = [
    "trim",
    "trimStart",
    "trimEnd",
    "toLowerCase",
    "toUpperCase",
    "append",
    "prepend",
    "replace",
    "split",
    "regex",
    "querystring",
    "parseNumber",
    "parseSize",
    "parseTime",
    "parseTTL",
    "extImdbId",
    "extDoubanId",
];

fn lookup(name: &str) -> Option<FilterFn> {
    let f: FilterFn = match name {
        "trim" => |v, _| map_str(v, |s| s.trim().to_string()),
        "trimStart" => |v, _| map_str(v, |s| s.trim_start().to_string()),
        "trimEnd" => |v, _| map_str(v, |s| s.trim_end().to_string()),
        "toLowerCase" => |v, _| map_str(v, |s| s.to_lowercase()),
        "toUpperCase" => |v, _| map_str(v, |s| s.to_uppercase()),
        "append" => |v, args| Value::String(format!("{}{}", as_text(&v), arg_str(args, 0))),
        "prepend" => |v, args| Value::String(format!("{}{}", arg_str(args, 0), as_text(&v))),
        "replace" => replace,
        "split" => split,
        "regex" => regex_extract,
        "querystring" => querystring,
        "parseNumber" => parse_number,
        "parseSize" => |v, _| {
            let bytes = v.as_str().and_then(parse_size);
            bytes.map(number_value).unwrap_or(v)
        },
        "parseTime" => parse_time,
        "parseTTL" => |v, _| {
            let time = v.as_str().and_then(|s| parse_ttl(s, Utc::now()));
            time.map(|t| Value::String(t.to_rfc3339())).unwrap_or(v)
        },
        "extImdbId" => |v, _| {
            let text = as_text(&v);
            IMDB_ID
                .find(&text)
                .map(|m| Value::String(m.as_str().to_lowercase()))
                .unwrap_or(Value::String(String::new()))
        },
        "extDoubanId" => |v, _| {
            let text = as_text(&v);
            DOUBAN_ID
                .captures(text.trim())
                .map(|c| Value::String(c[1].to_string()))
                .unwrap_or(Value::String(String::new()))
        },
        _ => return None,
    };
    Some(f)
}

/// Whether `name` is in the catalog.
pub fn is_registered(name: &str) -> bool {
    lookup(name).is_some()
}

/// Apply one named filter. Unknown names are a no-op.
pub fn apply(name: &str, args: &[Value], value: Value) -> Value {
    match lookup(name) {
        Some(f) => f(value, args),
        None => {
            log::warn!("Unknown value filter '{}', skipping", name);
            value
        }
    }
}

/// Run a filter chain left to right, each step consuming the previous output.
pub fn run_chain(value: Value, chain: &[ValueFilter]) -> Value {
    chain.iter().fold(value, |value, filter| match filter {
        ValueFilter::Named(named) => apply(&named.name, &named.args, value),
        ValueFilter::Custom(f) => f(value, &[]),
    })
}

/// String form of a value; `null` becomes empty.
fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn map_str(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn arg_str(args: &[Value], index: usize) -> String {
    args.get(index).map(as_text).unwrap_or_default()
}

fn arg_usize(args: &[Value], index: usize) -> Option<usize> {
    match args.get(index)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `replace(from, to)`: every occurrence of `from`.
fn replace(value: Value, args: &[Value]) -> Value {
    let from = arg_str(args, 0);
    if from.is_empty() {
        return value;
    }
    map_str(value, |s| s.replace(&from, &arg_str(args, 1)))
}

/// `split(separator, index)`: the `index`-th piece, empty when out of range.
fn split(value: Value, args: &[Value]) -> Value {
    let separator = arg_str(args, 0);
    let index = arg_usize(args, 1).unwrap_or(0);
    let text = as_text(&value);
    let piece = if separator.is_empty() {
        text.chars().nth(index).map(String::from)
    } else {
        text.split(separator.as_str()).nth(index).map(str::to_string)
    };
    Value::String(piece.unwrap_or_default())
}

/// `regex(pattern, group = 1)`: the capture group, or the whole match when the
/// pattern has no groups. No match yields an empty string.
fn regex_extract(value: Value, args: &[Value]) -> Value {
    let pattern = arg_str(args, 0);
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            log::warn!("Invalid regex filter pattern '{}': {}", pattern, e);
            return value;
        }
    };
    let group = arg_usize(args, 1).unwrap_or(1);
    let text = as_text(&value);
    let extracted = re.captures(&text).and_then(|caps| {
        caps.get(group)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
    });
    Value::String(extracted.unwrap_or_default())
}

/// `querystring(key)`: a query parameter of a (possibly relative) URL.
fn querystring(value: Value, args: &[Value]) -> Value {
    let key = arg_str(args, 0);
    let text = as_text(&value);
    let Ok(base) = url::Url::parse("http://localhost/") else {
        return value;
    };
    base.join(text.trim())
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == key.as_str())
                .map(|(_, v)| Value::String(v.into_owned()))
        })
        .unwrap_or(Value::String(String::new()))
}

/// `parseNumber`: strip thousands separators and read the first number found.
fn parse_number(value: Value, _args: &[Value]) -> Value {
    static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());
    if value.is_number() {
        return value;
    }
    let text = as_text(&value).replace(',', "");
    NUMBER
        .find(&text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(number_value)
        .unwrap_or(Value::from(0))
}

/// `parseTime(format?, timezoneOffset?)`: an RFC 3339 string, or the input when unparseable.
fn parse_time(value: Value, args: &[Value]) -> Value {
    let format = args.first().and_then(Value::as_str);
    let offset = args
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TIMEZONE_OFFSET);
    let parsed = value
        .as_str()
        .and_then(|text| parse_time_str(text.trim(), format, offset));
    parsed
        .map(|t| Value::String(t.to_rfc3339()))
        .unwrap_or(value)
}
