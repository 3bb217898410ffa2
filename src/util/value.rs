//! JSON value helpers shared by the collector and the cache

use serde_json::Value;

/// Loose truthiness used by incomplete indicators
///
/// `null`, `false`, `0`, `""` and absent values are falsy; everything else,
/// including empty arrays and objects, is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Default page merge: append `next` to `acc`
///
/// Arrays are spliced one level; scalars and objects are appended as
/// single elements.
pub fn concat(acc: Value, next: Value) -> Value {
    let mut items = match acc {
        Value::Array(items) => items,
        other => vec![other],
    };
    match next {
        Value::Array(more) => items.extend(more),
        other => items.push(other),
    }
    Value::Array(items)
}

/// Default per-call merge: flatten one level
pub fn flatten(results: Vec<Value>) -> Value {
    let mut out = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Value::Array(items) => out.extend(items),
            other => out.push(other),
        }
    }
    Value::Array(out)
}

/// Stable ordering over JSON values used by `sort_by`
///
/// Numbers compare numerically, strings lexically; otherwise values are
/// ordered by kind (null < bool < number < string < array < object).
pub fn compare(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(null))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(is_truthy(Some(&json!("token"))));
        assert!(is_truthy(Some(&json!([]))));
        assert!(is_truthy(Some(&json!(1.5))));
    }

    #[test]
    fn test_concat_arrays_and_scalars() {
        assert_eq!(concat(json!([1, 2]), json!([3, 4])), json!([1, 2, 3, 4]));
        assert_eq!(concat(json!({"a": 1}), json!({"b": 2})), json!([{"a": 1}, {"b": 2}]));
        assert_eq!(concat(json!([1]), json!([[2]])), json!([1, [2]]));
    }

    #[test]
    fn test_flatten_one_level() {
        let flat = flatten(vec![json!([1, [2]]), json!(3), json!({"k": "v"})]);
        assert_eq!(flat, json!([1, [2], 3, {"k": "v"}]));
    }

    #[test]
    fn test_compare_mixed() {
        use std::cmp::Ordering;
        assert_eq!(compare(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare(None, Some(&json!(0))), Ordering::Less);
    }
}
