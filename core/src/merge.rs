//! Deep merge for settings values.
//!
//! Merge rules:
//! - objects merge recursively, key by key
//! - arrays concatenate (no deduplication, so merging a value into itself
//!   doubles every array it contains)
//! - everything else, including a mismatch between object and array, is
//!   overwritten by the source
//!
//! Cyclic values cannot be expressed with [`serde_json::Value`], so the
//! "no cycles" precondition holds by construction.

use serde_json::Value;

/// True for values that merge structurally (objects and arrays).
#[must_use]
pub const fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Merge `src` into `dst` in place.
pub fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        dst.insert(key, value);
                    },
                }
            }
        },
        (Value::Array(dst), Value::Array(src)) => dst.extend(src),
        (dst, src) => *dst = src,
    }
}

/// Merge every value of `items` into `dst`, in order.
pub fn deep_merge_all<I>(dst: &mut Value, items: I)
where
    I: IntoIterator<Item = Value>,
{
    for item in items {
        deep_merge(dst, item);
    }
}

/// Return a new value equal to `base` with `overlay` merged on top.
#[must_use]
pub fn merged(base: &Value, overlay: Value) -> Value {
    let mut out = base.clone();
    deep_merge(&mut out, overlay);
    out
}
