//! Dotted path access over JSON values
//!
//! Supports:
//! - a.b.c (dot notation)
//! - a[0].b and a.0.b (array index)
//! - $.a.b (optional root prefix)
//!
//! Used for input get/set, binding `path` formatters, result extraction,
//! pagination indicators and `sort_by`.

use serde_json::{Map, Value};

use crate::error::QuarryError;

/// A parsed path segment
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Object field access: .field
    Field(String),
    /// Array index access: [0]
    Index(usize),
}

/// Parse a dotted path into segments
///
/// Examples:
/// - "price.currency" → [Field("price"), Field("currency")]
/// - "items[0].name" → [Field("items"), Index(0), Field("name")]
pub fn parse(path: &str) -> Result<Vec<Segment>, QuarryError> {
    let trimmed = if let Some(stripped) = path.strip_prefix("$.") {
        stripped
    } else if path == "$" {
        return Ok(vec![]);
    } else {
        path
    };

    if trimmed.is_empty() {
        return Ok(vec![]);
    }

    let invalid = || QuarryError::InvalidPath {
        path: path.to_string(),
    };

    let mut segments = Vec::new();
    for part in trimmed.split('.') {
        if part.is_empty() {
            return Err(invalid());
        }

        if let Some(bracket_pos) = part.find('[') {
            let field = &part[..bracket_pos];
            if !field.is_empty() {
                segments.push(Segment::Field(field.to_string()));
            }

            // One or more trailing [n] groups
            let mut rest = &part[bracket_pos..];
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                if !rest.starts_with('[') {
                    return Err(invalid());
                }
                let index: usize = rest[1..close].parse().map_err(|_| invalid())?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
            }
        } else if let Ok(index) = part.parse::<usize>() {
            segments.push(Segment::Index(index));
        } else {
            segments.push(Segment::Field(part.to_string()));
        }
    }

    Ok(segments)
}

/// Walk segments through a value, borrowing the target
///
/// Numeric segments also match object keys ("0") the way dotted lookups do.
pub fn apply<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match (segment, current) {
            (Segment::Field(name), Value::Object(map)) => map.get(name)?,
            (Segment::Index(idx), Value::Array(items)) => items.get(*idx)?,
            (Segment::Index(idx), Value::Object(map)) => map.get(&idx.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Parse and apply in one step; an unparsable path resolves to nothing
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse(path).ok()?;
    apply(value, &segments)
}

/// Write `new_value` at `path`, creating intermediate objects/arrays
///
/// Non-container intermediates are replaced, matching dotted-set semantics.
pub fn set(target: &mut Value, path: &str, new_value: Value) -> Result<(), QuarryError> {
    let segments = parse(path)?;
    if segments.is_empty() {
        *target = new_value;
        return Ok(());
    }

    let mut current = target;
    for (i, segment) in segments.iter().enumerate() {
        let is_last = i + 1 == segments.len();
        let next_is_index = matches!(segments.get(i + 1), Some(Segment::Index(_)));

        current = match segment {
            Segment::Field(name) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                let Some(map) = current.as_object_mut() else {
                    return Err(QuarryError::InvalidPath {
                        path: path.to_string(),
                    });
                };
                let slot = map.entry(name.clone()).or_insert(Value::Null);
                if !is_last && !is_container(slot) {
                    *slot = empty_container(next_is_index);
                }
                slot
            }
            Segment::Index(idx) => {
                if !current.is_array() {
                    *current = Value::Array(Vec::new());
                }
                let Some(items) = current.as_array_mut() else {
                    return Err(QuarryError::InvalidPath {
                        path: path.to_string(),
                    });
                };
                if items.len() <= *idx {
                    items.resize(*idx + 1, Value::Null);
                }
                let slot = &mut items[*idx];
                if !is_last && !is_container(slot) {
                    *slot = empty_container(next_is_index);
                }
                slot
            }
        };
    }

    *current = new_value;
    Ok(())
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn empty_container(array: bool) -> Value {
    if array {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

/// Recursively merge `overlay` into `base`
///
/// Objects merge key by key; any other overlay value replaces the base value.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple() {
        let segments = parse("a.b.c").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Field("a".into()),
                Segment::Field("b".into()),
                Segment::Field("c".into())
            ]
        );
    }

    #[test]
    fn test_parse_with_root_prefix() {
        assert_eq!(parse("$.price").unwrap(), vec![Segment::Field("price".into())]);
        assert!(parse("$").unwrap().is_empty());
    }

    #[test]
    fn test_parse_brackets_and_numeric_segments() {
        assert_eq!(
            parse("items[0].name").unwrap(),
            vec![
                Segment::Field("items".into()),
                Segment::Index(0),
                Segment::Field("name".into())
            ]
        );
        assert_eq!(
            parse("grid[1][2]").unwrap(),
            vec![Segment::Field("grid".into()), Segment::Index(1), Segment::Index(2)]
        );
        assert_eq!(parse("items.3").unwrap()[1], Segment::Index(3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("a..b").is_err());
        assert!(parse("a[x]").is_err());
        assert!(parse("a[0").is_err());
    }

    #[test]
    fn test_get_nested() {
        let value = json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
        assert_eq!(get(&value, "data.items[1].id"), Some(&json!(2)));
        assert_eq!(get(&value, "data.items.0.id"), Some(&json!(1)));
        assert_eq!(get(&value, "data.missing"), None);
        assert_eq!(get(&value, "data..bad"), None);
    }

    #[test]
    fn test_get_numeric_key_on_object() {
        let value = json!({"0": "zero"});
        assert_eq!(get(&value, "0"), Some(&json!("zero")));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut value = json!({});
        set(&mut value, "a.b.c", json!(1)).unwrap();
        set(&mut value, "list[2]", json!("x")).unwrap();
        assert_eq!(value, json!({"a": {"b": {"c": 1}}, "list": [null, null, "x"]}));
    }

    #[test]
    fn test_set_overwrites_scalar_intermediate() {
        let mut value = json!({"a": 5});
        set(&mut value, "a.b", json!(true)).unwrap();
        assert_eq!(value, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_set_root_replaces() {
        let mut value = json!({"a": 1});
        set(&mut value, "$", json!([1])).unwrap();
        assert_eq!(value, json!([1]));
    }

    #[test]
    fn test_deep_merge_objects() {
        let mut base = json!({"region": "us-east-1", "auth": {"user": "a", "pass": "b"}});
        deep_merge(&mut base, &json!({"auth": {"pass": "c"}, "extra": 1}));
        assert_eq!(
            base,
            json!({"region": "us-east-1", "auth": {"user": "a", "pass": "c"}, "extra": 1})
        );
    }

    #[test]
    fn test_deep_merge_replaces_non_objects() {
        let mut base = json!({"ids": [1, 2]});
        deep_merge(&mut base, &json!({"ids": [3]}));
        assert_eq!(base, json!({"ids": [3]}));
    }
}
