//! Typed request flags.
//!
//! The query string is parsed into a closed set of flags; anything outside
//! the enumerated set is a client error. `limit` and `offset` are kept raw
//! here and interpreted by the pagination layer.

use std::collections::BTreeSet;

use crate::error::ApiError;

/// Query flags recognized on every endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFlags {
    /// Collections to inline into the response (`model`, `endpoints`, `*`, ...).
    pub inline: BTreeSet<String>,
    /// Raw filter expression, evaluated by the filter engine.
    pub filter: Option<String>,
    /// Raw sort directive (`<field>=<asc|desc>`).
    pub sort: Option<String>,
    /// Document mode: self-contained export form.
    pub doc: bool,
    /// Requested schema identifier.
    pub schema: Option<String>,
    /// Expected entity epoch.
    pub epoch: Option<u64>,
    /// Suppress read-only decoration (accepted, no effect on this surface).
    pub no_readonly: bool,
    /// Raw `limit` value, interpreted by pagination.
    pub limit: Option<String>,
    /// Raw `offset` value, interpreted by pagination.
    pub offset: Option<String>,
}

impl RequestFlags {
    /// Parse decoded query pairs into flags.
    ///
    /// Unknown keys are rejected so typos surface as 400s instead of being
    /// silently ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut flags = RequestFlags::default();

        for (key, value) in pairs {
            match key {
                "inline" => {
                    for part in value.split(',').filter(|p| !p.is_empty()) {
                        flags.inline.insert(part.to_string());
                    }
                    // bare ?inline means "inline everything"
                    if value.is_empty() {
                        flags.inline.insert("*".to_string());
                    }
                }
                "filter" => flags.filter = Some(value.to_string()),
                "sort" => flags.sort = Some(value.to_string()),
                "doc" => flags.doc = true,
                "schema" => flags.schema = Some(value.to_string()),
                "epoch" => {
                    let parsed = value.parse::<u64>().map_err(|_| ApiError::BadRequest {
                        detail: format!("epoch must be a non-negative integer, got '{value}'"),
                    })?;
                    flags.epoch = Some(parsed);
                }
                "noreadonly" => flags.no_readonly = true,
                "limit" => flags.limit = Some(value.to_string()),
                "offset" => flags.offset = Some(value.to_string()),
                other => {
                    return Err(ApiError::BadRequest {
                        detail: format!("unknown query flag '{other}'"),
                    });
                }
            }
        }

        Ok(flags)
    }

    /// Parse a raw query string (`a=b&c=d`), percent-decoding values.
    pub fn from_query(query: &str) -> Result<Self, ApiError> {
        let mut decoded: Vec<(String, String)> = Vec::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            decoded.push((percent_decode(key), percent_decode(value)));
        }
        Self::from_pairs(decoded.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Whether the given collection should be inlined.
    pub fn inlines(&self, collection: &str) -> bool {
        self.inline.contains("*") || self.inline.contains(collection)
    }
}

/// Minimal percent-decoding for query components.
///
/// Invalid escapes are passed through verbatim rather than rejected; the
/// flag parser will then fail on the unknown key if one was mangled.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(byte) = hex {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_flags() {
        let flags = RequestFlags::from_query("inline=model,endpoints&filter=name=react*&doc").unwrap();
        assert!(flags.inlines("model"));
        assert!(flags.inlines("endpoints"));
        assert!(!flags.inlines("capabilities"));
        assert_eq!(flags.filter.as_deref(), Some("name=react*"));
        assert!(flags.doc);
    }

    #[test]
    fn bare_inline_means_everything() {
        let flags = RequestFlags::from_query("inline").unwrap();
        assert!(flags.inlines("model"));
        assert!(flags.inlines("anything"));
    }

    #[test]
    fn star_inline_means_everything() {
        let flags = RequestFlags::from_query("inline=*").unwrap();
        assert!(flags.inlines("capabilities"));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = RequestFlags::from_query("limit=5&frobnicate=1").unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn epoch_must_be_integer() {
        assert!(RequestFlags::from_query("epoch=7").unwrap().epoch == Some(7));
        assert!(RequestFlags::from_query("epoch=x").is_err());
    }

    #[test]
    fn limit_and_offset_stay_raw() {
        let flags = RequestFlags::from_query("limit=0&offset=9").unwrap();
        assert_eq!(flags.limit.as_deref(), Some("0"));
        assert_eq!(flags.offset.as_deref(), Some("9"));
    }

    #[test]
    fn percent_decoding_applies_to_values() {
        let flags = RequestFlags::from_query("filter=name%3Dreact%2A").unwrap();
        assert_eq!(flags.filter.as_deref(), Some("name=react*"));
    }
}
