//! Bridge base-URL derivation.
//!
//! Resolution order: an explicit configured override, then the
//! `X-Base-Url` header a fronting bridge injects, then the forwarded
//! headers, then plain `Host`.

use http::HeaderMap;

use crate::error::RewriteError;

/// Header carrying the bridge-visible base URL on proxied requests.
const BASE_URL_HEADER: &str = "X-Base-Url";

/// Derive the base URL clients should see in `self` and navigation URLs.
///
/// `api_path_prefix` is the path segment a fronting router strips before
/// dispatch; it is re-prepended here so composed URLs round-trip.
pub fn resolve_base_url(
    headers: &HeaderMap,
    api_path_prefix: &str,
    configured: Option<&str>,
) -> Result<String, RewriteError> {
    if let Some(base) = configured.filter(|b| !b.is_empty()) {
        return Ok(base.trim_end_matches('/').to_string());
    }

    if let Some(base) = header_str(headers, BASE_URL_HEADER) {
        return Ok(base.trim_end_matches('/').to_string());
    }

    let proto = header_str(headers, "x-forwarded-proto").unwrap_or("http");
    let host = header_str(headers, "x-forwarded-host")
        .or_else(|| header_str(headers, "host"))
        .ok_or(RewriteError::MissingHost)?;

    Ok(format!("{proto}://{host}{}", normalize_prefix(api_path_prefix)))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// An empty prefix stays empty; anything else gets exactly one leading
/// slash and no trailing slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn forwarded_headers_win_over_host() {
        let base = resolve_base_url(
            &headers(&[
                ("x-forwarded-proto", "https"),
                ("x-forwarded-host", "bridge.example"),
                ("host", "internal:3000"),
            ]),
            "",
            None,
        )
        .unwrap();
        assert_eq!(base, "https://bridge.example");
    }

    #[test]
    fn falls_back_to_host_with_default_proto() {
        let base = resolve_base_url(&headers(&[("host", "localhost:3000")]), "", None).unwrap();
        assert_eq!(base, "http://localhost:3000");
    }

    #[test]
    fn missing_host_is_an_error() {
        assert_eq!(
            resolve_base_url(&HeaderMap::new(), "", None),
            Err(RewriteError::MissingHost)
        );
    }

    #[test]
    fn api_path_prefix_is_normalized_and_appended() {
        let base = resolve_base_url(&headers(&[("host", "h")]), "registries/", None).unwrap();
        assert_eq!(base, "http://h/registries");
    }

    #[test]
    fn configured_override_beats_everything() {
        let base = resolve_base_url(
            &headers(&[("host", "ignored")]),
            "ignored",
            Some("https://api.example/prefix/"),
        )
        .unwrap();
        assert_eq!(base, "https://api.example/prefix");
    }

    #[test]
    fn bridge_injected_header_is_honored() {
        let base =
            resolve_base_url(&headers(&[("x-base-url", "https://bridge.example/reg")]), "", None)
                .unwrap();
        assert_eq!(base, "https://bridge.example/reg");
    }
}
