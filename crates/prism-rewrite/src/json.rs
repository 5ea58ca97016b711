//! Recursive JSON URL substitution.

use serde_json::Value;
use tracing::trace;

/// Replace `from_origin` with `to_base` in every string reachable from
/// `value`, skipping any object field named `xid`.
///
/// Returns the number of replacements. JSON values are trees, so plain
/// recursion terminates; the depth of registry payloads is small.
pub fn rewrite_value(value: &mut Value, from_origin: &str, to_base: &str) -> usize {
    if from_origin.is_empty() || from_origin == to_base {
        return 0;
    }
    rewrite_inner(value, from_origin, to_base)
}

fn rewrite_inner(value: &mut Value, from: &str, to: &str) -> usize {
    match value {
        Value::String(s) => {
            if let Some(rest) = s.strip_prefix(from) {
                *s = format!("{to}{rest}");
                1
            } else {
                0
            }
        }
        Value::Array(items) => items.iter_mut().map(|v| rewrite_inner(v, from, to)).sum(),
        Value::Object(map) => map
            .iter_mut()
            .map(|(key, v)| {
                if key == "xid" {
                    // canonical identifier: never rewritten
                    0
                } else {
                    rewrite_inner(v, from, to)
                }
            })
            .sum(),
        _ => 0,
    }
}

/// Rewrite a raw JSON body, or return `None` when the body does not parse
/// so the caller can pass the original bytes through unchanged.
pub fn rewrite_body(body: &[u8], from_origin: &str, to_base: &str) -> Option<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(body).ok()?;
    let replaced = rewrite_value(&mut value, from_origin, to_base);
    trace!(replaced, "rewrote proxied JSON body");
    serde_json::to_vec(&value).ok()
}
