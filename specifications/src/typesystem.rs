//! The user-parameter type system: a small grammar over class tags
//! (`Optional[T]`, `enum[a,b,...]`, and a handful of domain primitives) used
//! to validate and convert the string literals a caller submits alongside a
//! [`crate::task::TaskDAG`] into typed JSON values.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref OPTIONAL_RE: Regex = Regex::new(r"^Optional\[(.*)\]$").unwrap();
    static ref ENUM_RE: Regex = Regex::new(r"^enum\[(.*)\]$").unwrap();
}

const AIFS_PARAMS_LEVEL: &[&str] = &["q", "t", "u", "v", "w", "z"];
const AIFS_LEVELS: &[&str] = &["50", "100", "150", "200", "250", "300", "400", "500", "600", "700", "850", "925", "1000"];
const AIFS_PARAMS_SURFACE: &[&str] = &["10u", "10v", "2d", "2t", "msl", "skt", "sp", "tcw", "cp", "tp"];

fn truncate32(s: &str) -> &str {
    let end = s.char_indices().nth(32).map(|(i, _)| i).unwrap_or(s.len());
    &s[..end]
}

fn latitude(value: &str) -> Result<f64, String> {
    let f: f64 = value.parse().map_err(|_| format!("could not parse float from string: '{value}'"))?;
    if !(-90.0..=90.0).contains(&f) { return Err(format!("Latitude out of range [-90,90]: {value}")); }
    Ok(f)
}

fn longitude(value: &str) -> Result<f64, String> {
    let f: f64 = value.parse().map_err(|_| format!("could not parse float from string: '{value}'"))?;
    if !(-180.0..=180.0).contains(&f) { return Err(format!("Latitude out of range [-90,90]: {value}")); }
    Ok(f)
}

/// Validates a `"north/west/south/east"` bounding box and returns it
/// unchanged (the downstream consumer wants the original string, not a
/// parsed struct).
fn lat_lon_area(value: &str) -> Result<String, String> {
    let parts: Vec<&str> = value.split('/').collect();
    let [n, w, s, e] = parts[..] else {
        return Err(format!("expected 'north/west/south/east', got '{value}'"));
    };

    let mut errors = Vec::new();
    if latitude(n)? <= latitude(s)? { errors.push(format!("north lat {n} is under south lat {s}")); }
    if longitude(w)? >= longitude(e)? { errors.push(format!("west lat {n} is over south lat {s}")); }
    if !errors.is_empty() { return Err(errors.join(";")); }
    Ok(value.to_string())
}

/// Validates a single AIFS output parameter and returns its `(name, level)`
/// pair, with `level == 0` for surface parameters.
fn mars_param(value: &str) -> Result<(String, i64), String> {
    if AIFS_PARAMS_SURFACE.contains(&value) { return Ok((value.to_string(), 0)); }

    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() != 2 || !AIFS_PARAMS_LEVEL.contains(&parts[0]) || !AIFS_LEVELS.contains(&parts[1]) {
        return Err(format!("not a valid aifs output param: {}", truncate32(value)));
    }
    let level: i64 = parts[1].parse().map_err(|_| format!("not a valid aifs output param: {}", truncate32(value)))?;
    Ok((parts[0].to_string(), level))
}

/// Validates a comma-separated list of AIFS output parameters, or the
/// literal `"all"`, which expands to the full level x param cross product
/// plus every surface parameter.
fn mars_param_list(value: &str) -> Result<Vec<(String, i64)>, String> {
    if value == "all" {
        let mut out = Vec::new();
        for param in AIFS_PARAMS_LEVEL {
            for level in AIFS_LEVELS {
                out.push((param.to_string(), level.parse().unwrap()));
            }
        }
        for param in AIFS_PARAMS_SURFACE { out.push((param.to_string(), 0)); }
        Ok(out)
    } else {
        value.split(',').map(|e| mars_param(e.trim())).collect()
    }
}

fn datetime(value: &str) -> Result<chrono::NaiveDateTime, String> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| e.to_string())
}

fn six_hours(value: &str) -> Result<i64, String> {
    let v: i64 = value.parse().map_err(|_| format!("invalid literal for int() with base 10: '{value}'"))?;
    if v <= 0 || v % 6 != 0 { return Err(format!("value must be a positive multiple of six: {value}")); }
    Ok(v)
}


/***** LIBRARY *****/
/// Converts a literal string into a typed JSON value under the given class
/// tag. `into` may be a bare primitive (`latitude`, `datetime`, ...), an
/// `Optional[T]` wrapper (an empty `value` converts to `null` instead of
/// invoking `T`'s converter), or an `enum[a,b,...]` (membership of `value`
/// among the comma-separated, trimmed alternatives).
///
/// Returns `Err` with a human-readable message on any validation failure;
/// this is surfaced directly to API callers, so messages intentionally read
/// as plain English rather than as a structured error code.
pub fn convert(into: &str, value: &str) -> Result<serde_json::Value, String> {
    let mut into = into;

    if let Some(caps) = OPTIONAL_RE.captures(into) {
        if value.is_empty() { return Ok(serde_json::Value::Null); }
        into = caps.get(1).unwrap().as_str();
    }

    if let Some(caps) = ENUM_RE.captures(into) {
        let members: Vec<&str> = caps.get(1).unwrap().as_str().split(',').map(str::trim).collect();
        return if members.contains(&value) {
            Ok(serde_json::Value::String(value.to_string()))
        } else {
            Err(format!("value {} not a member of enum[{}]", truncate32(value), members.join(",")))
        };
    }

    match into {
        "latitude" => latitude(value).map(|f| serde_json::json!(f)),
        "longitude" => longitude(value).map(|f| serde_json::json!(f)),
        "latlonArea" => lat_lon_area(value).map(serde_json::Value::String),
        "marsParam" => mars_param(value).map(|(p, l)| serde_json::json!([p, l])),
        "marsParamList" | "aifsOutputParamList" => mars_param_list(value).map(|v| serde_json::json!(v)),
        "datetime" => datetime(value).map(|d| serde_json::Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string())),
        "six_hours" => six_hours(value).map(|v| serde_json::json!(v)),
        "str" => Ok(serde_json::Value::String(value.to_string())),
        "int" => value.parse::<i64>().map(|v| serde_json::json!(v)).map_err(|_| format!("invalid literal for int() with base 10: '{value}'")),
        "float" => value.parse::<f64>().map(|v| serde_json::json!(v)).map_err(|_| format!("could not parse float from string: '{value}'")),
        "bool" => match value {
            "true" | "True" | "1" => Ok(serde_json::Value::Bool(true)),
            "false" | "False" | "0" => Ok(serde_json::Value::Bool(false)),
            other => Err(format!("not a valid bool literal: '{other}'")),
        },
        other => Err(format!("unknown parameter class '{other}'")),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latitude_in_range() { assert_eq!(convert("latitude", "45.0").unwrap(), serde_json::json!(45.0)); }

    #[test]
    fn latitude_out_of_range_errors() { assert!(convert("latitude", "200").is_err()); }

    #[test]
    fn optional_empty_is_null() { assert_eq!(convert("Optional[latitude]", "").unwrap(), serde_json::Value::Null); }

    #[test]
    fn optional_non_empty_delegates() { assert_eq!(convert("Optional[latitude]", "10").unwrap(), serde_json::json!(10.0)); }

    #[test]
    fn enum_exact_member_matches() { assert_eq!(convert("enum[a,b,c]", "b").unwrap(), serde_json::json!("b")); }

    #[test]
    fn enum_non_member_errors() { assert!(convert("enum[a,b,c]", "d").is_err()); }

    #[test]
    fn lat_lon_area_valid() {
        assert_eq!(convert("latlonArea", "60/-10/50/10").unwrap(), serde_json::json!("60/-10/50/10"));
    }

    #[test]
    fn lat_lon_area_invalid_ordering_errors() {
        assert!(convert("latlonArea", "50/-10/60/10").is_err());
    }

    #[test]
    fn mars_param_surface() { assert_eq!(convert("marsParam", "2t").unwrap(), serde_json::json!(["2t", 0])); }

    #[test]
    fn mars_param_level() { assert_eq!(convert("marsParam", "q.500").unwrap(), serde_json::json!(["q", 500])); }

    #[test]
    fn mars_param_invalid() { assert!(convert("marsParam", "q.999").is_err()); }

    #[test]
    fn mars_param_list_all_expands() {
        let v = convert("marsParamList", "all").unwrap();
        let arr = v.as_array().unwrap();
        assert_eq!(arr.len(), AIFS_PARAMS_LEVEL.len() * AIFS_LEVELS.len() + AIFS_PARAMS_SURFACE.len());
    }

    #[test]
    fn mars_param_list_explicit() {
        let v = convert("marsParamList", "2t, q.500").unwrap();
        assert_eq!(v, serde_json::json!([["2t", 0], ["q", 500]]));
    }

    #[test]
    fn six_hours_rejects_non_multiple() { assert!(convert("six_hours", "7").is_err()); }

    #[test]
    fn six_hours_accepts_multiple() { assert_eq!(convert("six_hours", "18").unwrap(), serde_json::json!(18)); }

    #[test]
    fn datetime_accepts_with_and_without_seconds() {
        assert!(convert("datetime", "2024-01-01T00:00").is_ok());
        assert!(convert("datetime", "2024-01-01T00:00:30").is_ok());
    }

    #[test]
    fn unknown_class_errors() { assert!(convert("not-a-real-class", "x").is_err()); }
}
