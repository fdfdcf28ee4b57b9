use serde_json::Value;
use time::format_description::well_known::Rfc3339;

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Walks a dotted path (`"data.job"`). A numeric segment indexes into arrays.
/// Returns the value if every key along the path is present, even when the
/// final value is `null`.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path.split('.') {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Like [`get_path`] but treats an explicit `null` as absent.
pub fn get_present<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    get_path(root, path).filter(|v| !v.is_null())
}

/// First path in `paths` that resolves to a non-null value.
pub fn first_present<'a>(root: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|p| get_present(root, p))
}

pub fn first_str<'a>(root: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|p| get_present(root, p))
        .find_map(|v| v.as_str())
}

/// Reads an integer that the backend may have sent as a number, a float or a
/// numeric string.
pub fn as_loose_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim().trim_end_matches('%');
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

pub fn first_i64(root: &Value, paths: &[&str]) -> Option<i64> {
    paths
        .iter()
        .filter_map(|p| get_present(root, p))
        .find_map(as_loose_i64)
}

/// Lenient string rendering for scalar JSON values.
pub fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_lookup_distinguishes_null_from_missing() {
        let v = json!({"a": {"b": null}, "list": [{"job": 1}]});
        assert!(get_path(&v, "a.b").is_some());
        assert!(get_present(&v, "a.b").is_none());
        assert!(get_path(&v, "a.c").is_none());
        assert_eq!(get_path(&v, "list.0.job"), Some(&json!(1)));
    }

    #[test]
    fn loose_integers() {
        assert_eq!(as_loose_i64(&json!(45)), Some(45));
        assert_eq!(as_loose_i64(&json!(44.6)), Some(45));
        assert_eq!(as_loose_i64(&json!("70%")), Some(70));
        assert_eq!(as_loose_i64(&json!("n/a")), None);
    }
}
