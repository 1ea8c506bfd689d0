use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `key`.
pub fn hashed(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Identifier of the `ordinal`-th element of `category` owned by `owner`.
pub fn child_id(owner: &str, category: &str, ordinal: usize) -> String {
    hashed(&format!("{owner}_{category}_{ordinal}"))
}

/// Identifier of a single-valued child, such as a metric's scoring payload.
pub fn singleton_id(owner: &str, suffix: &str) -> String {
    hashed(&format!("{owner}_{suffix}"))
}

pub fn cna_container_id(cve_id: &str) -> String {
    format!("{cve_id}_cna")
}

/// `sequence` is 1-based.
pub fn adp_container_id(cve_id: &str, sequence: usize) -> String {
    format!("{cve_id}_adp_{sequence}")
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// SHA-256 of the canonical JSON text of `value`.
pub fn content_hash(value: &Value) -> String {
    hashed(&canonical_json(value))
}

/// Canonical JSON of a free-form value, `None` when absent or empty.
pub fn json_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) if items.is_empty() => None,
        Some(Value::Object(map)) if map.is_empty() => None,
        Some(value) => Some(canonical_json(value)),
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, value) in entries {
                sorted.insert(key.clone(), canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Parses the timestamp formats found in CVE records into UTC, truncated to whole seconds.
///
/// Accepts RFC 3339 with any offset, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC),
/// and a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    parsed.with_nanosecond(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test]
    fn child_ids_are_hex_sha256_of_the_key() {
        assert_eq!(
            hashed("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(child_id("CVE-2024-0001_cna", "desc", 0), hashed("CVE-2024-0001_cna_desc_0"));
        assert_ne!(child_id("owner", "desc", 0), child_id("owner", "desc", 1));
        assert_eq!(singleton_id("m", "cvssv3_1"), hashed("m_cvssv3_1"));
    }

    #[test]
    fn container_ids_are_readable() {
        assert_eq!(cna_container_id("CVE-2024-0001"), "CVE-2024-0001_cna");
        assert_eq!(adp_container_id("CVE-2024-0001", 2), "CVE-2024-0001_adp_2");
    }

    #[test]
    fn canonical_json_ignores_key_order() {
        let a = json!({"b": 1, "a": {"y": [1, {"d": 0, "c": 1}], "x": null}});
        let b = json!({"a": {"x": null, "y": [1, {"c": 1, "d": 0}]}, "b": 1});

        assert_eq!(canonical_json(&a), r#"{"a":{"x":null,"y":[1,{"c":1,"d":0}]},"b":1}"#);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn json_text_skips_empty_values() {
        assert_eq!(json_text(None), None);
        assert_eq!(json_text(Some(&Value::Null)), None);
        assert_eq!(json_text(Some(&json!([]))), None);
        assert_eq!(json_text(Some(&json!({}))), None);
        assert_eq!(json_text(Some(&json!(["x"]))), Some(r#"["x"]"#.to_string()));
    }

    #[test_case("2024-01-15T10:20:30Z", Some("2024-01-15 10:20:30") ; "zulu")]
    #[test_case("2024-01-15T10:20:30.123Z", Some("2024-01-15 10:20:30") ; "fractional seconds are truncated")]
    #[test_case("2024-01-15T12:20:30+02:00", Some("2024-01-15 10:20:30") ; "offset is converted to utc")]
    #[test_case("2024-01-15T10:20:30", Some("2024-01-15 10:20:30") ; "naive is utc")]
    #[test_case("2024-01-15T10:20:30.999999", Some("2024-01-15 10:20:30") ; "naive with fraction")]
    #[test_case("2024-01-15", Some("2024-01-15 00:00:00") ; "date only")]
    #[test_case("15/01/2024", None ; "unknown format")]
    #[test_case("", None ; "empty")]
    fn timestamps(raw: &str, expected: Option<&str>) {
        let parsed = parse_timestamp(raw).map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string());
        assert_eq!(parsed.as_deref(), expected);
    }
}
