//! Document model.
//!
//! A document is a JSON object. Fields are addressed with dotted paths
//! (`to.address`); a path that crosses an array fans out over its elements,
//! so one path can resolve to several values.

use serde_json::Value;
use std::cmp::Ordering;

/// A stored document. Always a JSON object at the top level.
pub type Document = Value;

/// Resolves a dotted `path` in `doc` and returns every value it reaches.
///
/// Arrays met along the way are flattened: `to.address` over
/// `{"to": [{"address": "a"}, {"address": "b"}]}` yields `["a", "b"]`.
/// A missing field yields nothing.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(map) = item {
                            if let Some(child) = map.get(segment) {
                                next.push(child);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }

    // A terminal array matches element-wise as well as as a whole.
    let mut out = Vec::with_capacity(current.len());
    for value in current {
        out.push(value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

/// Returns the first value at `path`, or `Value::Null` when the path is absent.
pub fn first_value(doc: &Value, path: &str) -> Value {
    lookup(doc, path).into_iter().next().cloned().unwrap_or(Value::Null)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values used for sorting and grouping.
///
/// Values of different types order as null < numbers < strings < objects <
/// arrays < booleans. Numbers compare numerically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}
