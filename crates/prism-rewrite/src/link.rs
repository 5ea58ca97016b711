//! `Link` header rewriting.
//!
//! Non-JSON responses stream through untouched, but navigation in the
//! `Link` header must still point at the bridge.

/// Replace every occurrence of `from_origin` in a `Link` header value.
pub fn rewrite_link_header(value: &str, from_origin: &str, to_base: &str) -> String {
    if from_origin.is_empty() || from_origin == to_base {
        return value.to_string();
    }
    value.replace(from_origin, to_base)
}
