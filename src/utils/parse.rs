//! Parsing helpers for scraped values: numbers, sizes, timestamps, and
//! obfuscated e-mail addresses.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc,
};
use regex::Regex;
use serde_json::{Number, Value};

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").unwrap());

static SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d*\.?\d+)\s*([KMGTPEZY]?i?B|bytes?)?\s*$").unwrap()
});

static OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-])(\d{2}):?(\d{2})$").unwrap());

static TTL_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(years?|yrs?|months?|weeks?|days?|hours?|hrs?|minutes?|mins?|seconds?|secs?|年|个月|月|周|天|日|小时|時間|时|分钟|分|秒)",
    )
    .unwrap()
});

static CF_EMAIL_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a\b[^>]*__cf_email__[^>]*>.*?</a>|<span\b[^>]*__cf_email__[^>]*>.*?</span>"#)
        .unwrap()
});

static CF_EMAIL_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-cfemail\s*=\s*["']?([0-9a-fA-F]+)"#).unwrap());

const NAIVE_DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const NAIVE_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Build a JSON number, preferring an integer when `f` has no fraction.
pub fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Convert a purely integer-looking string (`-?\d+`) into a number.
pub fn integer_string(s: &str) -> Option<Value> {
    if !INTEGER.is_match(s) {
        return None;
    }
    match s.parse::<i64>() {
        Ok(n) => Some(Value::from(n)),
        Err(_) => s.parse::<f64>().ok().map(number_value),
    }
}

/// Best-effort numeric coercion: numeric strings become numbers, anything else is returned as is.
pub fn to_number(value: Value) -> Value {
    let parsed = value
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite());
    parsed.map(number_value).unwrap_or(value)
}

/// Parse a human readable size (`1.5 GB`, `700MiB`, `1,024 KB`) into bytes, base 1024.
pub fn parse_size(s: &str) -> Option<f64> {
    let cleaned = s.replace(',', "");
    let caps = SIZE.captures(&cleaned)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_uppercase())
        .unwrap_or_default();

    let power = match unit.chars().next() {
        Some('K') => 1,
        Some('M') => 2,
        Some('G') => 3,
        Some('T') => 4,
        Some('P') => 5,
        Some('E') => 6,
        Some('Z') => 7,
        Some('Y') => 8,
        _ => 0,
    };
    Some((amount * 1024f64.powi(power)).round())
}

/// Parse `+0800` / `-05:00` style offsets.
pub fn parse_offset(offset: &str) -> Option<FixedOffset> {
    let caps = OFFSET.captures(offset.trim())?;
    let hours: i32 = caps[2].parse().ok()?;
    let minutes: i32 = caps[3].parse().ok()?;
    let seconds = hours * 3600 + minutes * 60;
    if &caps[1] == "-" {
        FixedOffset::west_opt(seconds)
    } else {
        FixedOffset::east_opt(seconds)
    }
}

/// Unix timestamp in seconds or milliseconds, told apart by magnitude.
fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if n.abs() < 1.0e11 {
        DateTime::from_timestamp(n as i64, 0)
    } else {
        DateTime::from_timestamp_millis(n as i64)
    }
}

/// Interpret a naive local timestamp in the given zone.
fn localize(naive: NaiveDateTime, zone: &FixedOffset) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a source timestamp into an instant.
///
/// Numbers are epoch seconds or milliseconds. Strings with an explicit zone
/// (RFC 3339 / RFC 2822) keep it; naive strings are read in `timezone_offset`.
pub fn parse_time_with_zone(value: &Value, timezone_offset: &str) -> Option<DateTime<Utc>> {
    let text = match value {
        Value::Number(n) => return n.as_f64().and_then(from_epoch),
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }
    if let Some(Value::Number(n)) = integer_string(text) {
        return n.as_f64().and_then(from_epoch);
    }
    parse_time_str(text, None, timezone_offset)
}

/// Parse a timestamp string, trying `format` first when one is given.
pub fn parse_time_str(
    text: &str,
    format: Option<&str>,
    timezone_offset: &str,
) -> Option<DateTime<Utc>> {
    let zone = parse_offset(timezone_offset).unwrap_or_else(|| Utc.fix());

    if let Some(format) = format {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return localize(naive, &zone);
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return localize(date.and_hms_opt(0, 0, 0)?, &zone);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return localize(naive, &zone);
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return localize(date.and_hms_opt(0, 0, 0)?, &zone);
        }
    }
    None
}

/// Parse a relative age such as `3 days 4 hours` or `1天2小时` into an instant before `now`.
pub fn parse_ttl(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut total_secs = 0f64;
    let mut matched = false;

    for caps in TTL_PART.captures_iter(text) {
        let amount: f64 = caps[1].parse().ok()?;
        let unit = caps[2].to_lowercase();
        let secs = match unit.as_str() {
            u if u.starts_with("y") || u == "年" => 365.0 * 86400.0,
            u if u.starts_with("mo") || u == "个月" || u == "月" => 30.0 * 86400.0,
            u if u.starts_with("w") || u == "周" => 7.0 * 86400.0,
            u if u.starts_with("d") || u == "天" || u == "日" => 86400.0,
            u if u.starts_with("h") || u == "小时" || u == "時間" || u == "时" => 3600.0,
            u if u.starts_with("mi") || u == "分钟" || u == "分" => 60.0,
            _ => 1.0,
        };
        total_secs += amount * secs;
        matched = true;
    }

    if !matched || !total_secs.is_finite() {
        return None;
    }
    let age = TimeDelta::try_seconds(total_secs.round() as i64)?;
    now.checked_sub_signed(age)
}

/// Decode a Cloudflare `data-cfemail` hex string.
pub fn decode_cf_email(encoded: &str) -> Option<String> {
    if encoded.len() < 2 || encoded.len() % 2 != 0 {
        return None;
    }
    if !encoded.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let bytes: Vec<u8> = (0..encoded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&encoded[i..i + 2], 16))
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    let key = bytes[0];
    let decoded: Vec<u8> = bytes[1..].iter().map(|b| b ^ key).collect();
    String::from_utf8(decoded).ok()
}

/// Replace every Cloudflare-protected e-mail element in `html` with its plaintext address.
pub fn unmask_cf_emails(html: &str) -> Cow<'_, str> {
    if !html.contains("__cf_email__") {
        return Cow::Borrowed(html);
    }
    CF_EMAIL_ELEMENT.replace_all(html, |caps: &regex::Captures<'_>| {
        let element = &caps[0];
        CF_EMAIL_DATA
            .captures(element)
            .and_then(|data| decode_cf_email(&data[1]))
            .unwrap_or_else(|| element.to_string())
    })
}
