//! Type-aware helpers over JSON payload values.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Orders two JSON numbers, exactly for integers and by `f64` otherwise.
pub(crate) fn cmp_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a.cmp(&b);
    }
    let a = a.as_f64().unwrap_or(f64::NAN);
    let b = b.as_f64().unwrap_or(f64::NAN);
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Value equality that treats `100` and `100.0` as the same number.
pub(crate) fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => cmp_numbers(a, b) == Ordering::Equal,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| same(value, other)))
        }
        _ => a == b,
    }
}

/// The larger of two numbers; `local` on ties.
pub(crate) fn max_number<'a>(local: &'a Number, remote: &'a Number) -> &'a Number {
    if cmp_numbers(remote, local) == Ordering::Greater {
        remote
    } else {
        local
    }
}

/// Set-union of two arrays: local elements first, then remote elements not
/// already present. Duplicates are removed by value.
pub(crate) fn union(local: &[Value], remote: &[Value]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(local.len() + remote.len());
    for value in local.iter().chain(remote) {
        if !out.iter().any(|existing| same(existing, value)) {
            out.push(value.clone());
        }
    }
    out
}

/// Shallow merge: start from `base`, then every key of `top` replaces it.
pub(crate) fn overlay(base: &Map<String, Value>, top: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    for (key, value) in top {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// The merge-policy combination rule for one conflicting value.
///
/// Numbers take the maximum, arrays the set-union, objects a shallow merge
/// with local keys winning; anything else keeps the local value.
pub(crate) fn combine(local: &Value, remote: &Value) -> Value {
    match (local, remote) {
        (Value::Number(l), Value::Number(r)) => Value::Number(max_number(l, r).clone()),
        (Value::Array(l), Value::Array(r)) => Value::Array(union(l, r)),
        (Value::Object(l), Value::Object(r)) => Value::Object(overlay(r, l)),
        _ => local.clone(),
    }
}
