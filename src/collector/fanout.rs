//! Parameter fan-out
//!
//! One logical parameter set becomes N concrete sets. Multi-valued
//! parameters are zipped element-wise (never a cartesian product), so every
//! multi-valued parameter must hold the same number of values. Single
//! values are copied into every set.

use serde_json::Value;

use crate::error::{debug_detail, QuarryError, Result};
use crate::schema::{Params, Schema};

/// Expand `params` into the ordered list of concrete parameter sets
///
/// The schema's static params form the base and are overlaid by `params`.
/// An empty multi-valued required parameter yields zero sets; an empty
/// optional one is passed through unsplit.
pub fn expand(schema: &Schema, params: &Params, debug: bool) -> Result<Vec<Params>> {
    let mut merged = schema.params.clone();
    for (name, value) in params {
        merged.insert(name.clone(), value.clone());
    }

    let mut single = Params::new();
    let mut multi: Vec<(String, Vec<Value>)> = Vec::new();

    for (name, value) in &merged {
        let Some(descriptor) = schema.descriptor(name) else {
            single.insert(name.clone(), value.clone());
            continue;
        };

        match descriptor.split(value) {
            // Empty optional lists pass through unsplit
            Some(values) if values.is_empty() && !schema.required.contains_key(name) => {
                single.insert(name.clone(), value.clone());
            }
            Some(values) => {
                let formatted = values.iter().map(|v| descriptor.format(v)).collect();
                multi.push((name.clone(), formatted));
            }
            None => {
                single.insert(name.clone(), descriptor.format(value));
            }
        }
    }

    let Some((_, first)) = multi.first() else {
        return Ok(vec![single]);
    };
    let expected = first.len();

    if let Some((param, values)) = multi.iter().find(|(_, values)| values.len() != expected) {
        return Err(QuarryError::ArrayLengthMismatch {
            schema: schema.name.clone(),
            param: param.clone(),
            expected,
            actual: values.len(),
            detail: debug_detail(debug, "params", &merged),
        });
    }

    Ok((0..expected)
        .map(|index| {
            let mut set = single.clone();
            for (name, values) in &multi {
                set.insert(name.clone(), values[index].clone());
            }
            set
        })
        .collect())
}
