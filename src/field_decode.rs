//! Normalization boundary for the loosely-typed columns coming out of the
//! dispatch store. Decoders never error: failure resolves to a sentinel
//! (empty list, `None`, 0, or a caller default) so one bad field never
//! poisons a whole refresh.

use crate::DISPATCH_TZ;
use chrono::NaiveDateTime;
use chrono::TimeZone;
use serde_json::Value;

/// Decode a list-encoded field: a native array, or the text form of one.
/// A bare scalar becomes a one-element list. Anything unparseable is an
/// empty list, which callers treat as "no data".
pub fn decode_list(raw: &Value) -> Vec<Value> {
    match raw {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        Value::String(text) => match parse_list_text(text.trim()) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        },
        other => vec![other.clone()],
    }
}

// The store writes list columns in either JSON form or single-quoted
// list-literal form, depending on which upstream job produced the row.
fn parse_list_text(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    serde_json::from_str::<Value>(&text.replace('\'', "\"")).ok()
}

/// Decode a heterogeneous timestamp field to epoch milliseconds.
///
/// Calendar stamps win over raw epoch numbers: once the digit-only form
/// looks like YYYYMMDDHHMM or YYYYMMDDHHMMSS it is only ever read as civil
/// time in the dispatch zone. Everything else goes through the numeric
/// branch: epoch seconds in [1e9, 1e11), epoch milliseconds in [1e12, 1e14).
/// Any other magnitude, or a parse failure, is undetermined.
pub fn decode_epoch_ms(raw: &Value) -> Option<i64> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();

    if (digits.len() == 12 || digits.len() == 14)
        && (digits.starts_with("19") || digits.starts_with("20"))
    {
        let fmt = if digits.len() == 14 {
            "%Y%m%d%H%M%S"
        } else {
            "%Y%m%d%H%M"
        };
        let naive = NaiveDateTime::parse_from_str(&digits, fmt).ok()?;
        return DISPATCH_TZ
            .from_local_datetime(&naive)
            .single()
            .map(|civil| civil.timestamp_millis());
    }

    let n = text.parse::<f64>().ok()? as i64;
    if (1_000_000_000..100_000_000_000).contains(&n) {
        return Some(n * 1000);
    }
    if (1_000_000_000_000..100_000_000_000_000).contains(&n) {
        return Some(n);
    }
    None
}

/// Decode a boolean-ish field to 0/1. Textual truthy tokens and the numeric
/// value 1 map to 1; everything else, including parse failure, maps to 0.
pub fn decode_flag01(raw: &Value) -> i64 {
    let text = match raw {
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => return i64::from(*b),
        _ => return 0,
    };
    if matches!(text.as_str(), "1" | "true" | "t" | "yes" | "y") {
        return 1;
    }
    match text.parse::<f64>() {
        Ok(n) if n as i64 == 1 => 1,
        _ => 0,
    }
}

/// Best-effort integer coercion, accepting floating textual forms and
/// truncating toward zero. The caller supplies the failure default.
pub fn decode_int(raw: &Value, default: i64) -> i64 {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return default,
    };
    match text.parse::<f64>() {
        Ok(n) => n as i64,
        Err(_) => default,
    }
}

/// Normalize a decoded list element into a join key. Numeric dispatch ids
/// and their textual forms must hash identically.
pub fn decode_id(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build a [lon, lat] polyline from the two parallel coordinate-list
/// columns, trimmed to the shorter list. Malformed coordinates, or fewer
/// than 2 points, yield an empty polyline.
pub fn decode_polyline(lon_raw: &Value, lat_raw: &Value) -> Vec<[f64; 2]> {
    let lons = decode_list(lon_raw);
    let lats = decode_list(lat_raw);

    let mut points = Vec::with_capacity(lons.len().min(lats.len()));
    for (lon, lat) in lons.iter().zip(lats.iter()) {
        match (scalar_to_f64(lon), scalar_to_f64(lat)) {
            (Some(lon), Some(lat)) => points.push([lon, lat]),
            _ => return Vec::new(),
        }
    }

    if points.len() < 2 {
        return Vec::new();
    }
    points
}

fn scalar_to_f64(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
