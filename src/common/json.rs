use serde_json::{Map, Value};

/// Shallow merge: keys of `updates` overwrite keys of `base`.
///
/// Non-object inputs resolve to `updates`.
pub fn merge_json(base: &Value, updates: &Value) -> Value {
    match (base, updates) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => updates.clone(),
    }
}

/// Recursive merge: nested objects are merged key by key, everything else
/// (arrays included) is replaced wholesale.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(a), Value::Object(b)) => {
            for (k, v) in b {
                match a.get_mut(k) {
                    Some(existing) if existing.is_object() && v.is_object() => {
                        deep_merge(existing, v)
                    }
                    _ => {
                        a.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// Assign `value` at a dotted path such as `request.where`, creating
/// intermediate objects as needed. Non-object intermediates are replaced.
pub fn set_path(target: &mut Value, path: &str, value: Value) {
    let mut cursor = target;
    let mut parts = path.split('.').filter(|p| !p.is_empty()).peekable();
    while let Some(part) = parts.next() {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Value::Object(map) = cursor else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        cursor = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

pub fn get_path<'a>(target: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|p| !p.is_empty())
        .try_fold(target, |cur, part| cur.get(part))
}

/// Drop top-level keys starting with `prefix`.
pub fn strip_prefixed(value: &mut Value, prefix: &str) {
    if let Value::Object(map) = value {
        map.retain(|k, _| !k.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_json_preserves_unknown_fields() {
        let base = json!({"known": 1, "extra": {"keep": true}});
        let updates = json!({"known": 2});
        let merged = merge_json(&base, &updates);
        assert_eq!(merged["known"], json!(2));
        assert_eq!(merged["extra"], json!({"keep": true}));
    }

    #[test]
    fn deep_merge_keeps_siblings() {
        let mut base = json!({"request": {"expr": "up", "where": "a"}, "hide": false});
        deep_merge(&mut base, &json!({"request": {"where": "b"}}));
        assert_eq!(base, json!({"request": {"expr": "up", "where": "b"}, "hide": false}));
    }

    #[test]
    fn set_path_creates_intermediates() {
        let mut v = json!({"request": 3});
        set_path(&mut v, "request.where.host", json!("web"));
        assert_eq!(v, json!({"request": {"where": {"host": "web"}}}));
        assert_eq!(get_path(&v, "request.where.host"), Some(&json!("web")));
    }

    #[test]
    fn strips_internal_keys() {
        let mut v = json!({"__hover": true, "title": "t"});
        strip_prefixed(&mut v, "__");
        assert_eq!(v, json!({"title": "t"}));
    }
}
