//! Pagination: `limit` / `offset` parsing and `Link: rel="next"`.
//!
//! The Link policy differs by query shape: a filtered page advertises a
//! next page whenever it is non-empty (the fan-out cap means more matches
//! may exist beyond what was examined); an unfiltered page advertises one
//! only when it came back full.

use prism_core::ApiError;
use prism_core::RequestFlags;
use prism_core::constants::DEFAULT_PAGE_LIMIT;

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Page size (>= 1).
    pub limit: usize,
    /// Items skipped before the page.
    pub offset: usize,
}

impl Page {
    /// Parse and validate the raw `limit` / `offset` flags.
    pub fn from_flags(flags: &RequestFlags) -> Result<Self, ApiError> {
        let limit = match flags.limit.as_deref() {
            None => DEFAULT_PAGE_LIMIT,
            Some(raw) => {
                let parsed = raw.parse::<i64>().map_err(|_| ApiError::BadRequest {
                    detail: format!("limit must be an integer, got '{raw}'"),
                })?;
                if parsed <= 0 {
                    return Err(ApiError::BadRequest {
                        detail: format!("limit must be >= 1, got {parsed}"),
                    });
                }
                parsed as usize
            }
        };

        let offset = match flags.offset.as_deref() {
            None => 0,
            Some(raw) => raw.parse::<u64>().map_err(|_| ApiError::BadRequest {
                detail: format!("offset must be a non-negative integer, got '{raw}'"),
            })? as usize,
        };

        Ok(Self { limit, offset })
    }
}

/// Compose the `Link` header value for the next page, if one is due.
pub fn next_link(
    collection_url: &str,
    flags: &RequestFlags,
    page: Page,
    returned: usize,
    filtered: bool,
) -> Option<String> {
    let due = if filtered { returned > 0 } else { returned == page.limit };
    if !due {
        return None;
    }

    let mut params = vec![
        format!("limit={}", page.limit),
        format!("offset={}", page.offset + page.limit),
    ];
    if let Some(filter) = &flags.filter {
        params.push(format!("filter={}", crate::ecosystems::npm::urlencode(filter)));
    }
    if let Some(sort) = &flags.sort {
        params.push(format!("sort={}", crate::ecosystems::npm::urlencode(sort)));
    }

    Some(format!("<{collection_url}?{}>; rel=\"next\"", params.join("&")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(query: &str) -> RequestFlags {
        RequestFlags::from_query(query).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let page = Page::from_flags(&flags("")).unwrap();
        assert_eq!(page, Page { limit: DEFAULT_PAGE_LIMIT, offset: 0 });
    }

    #[test]
    fn zero_and_negative_limits_are_rejected() {
        assert!(Page::from_flags(&flags("limit=0")).is_err());
        assert!(Page::from_flags(&flags("limit=-5")).is_err());
        assert!(Page::from_flags(&flags("limit=abc")).is_err());
    }

    #[test]
    fn explicit_page_parses() {
        let page = Page::from_flags(&flags("limit=2&offset=40")).unwrap();
        assert_eq!(page, Page { limit: 2, offset: 40 });
    }

    #[test]
    fn unfiltered_link_requires_a_full_page() {
        let f = flags("limit=2");
        let page = Page::from_flags(&f).unwrap();
        assert!(next_link("http://b/packages", &f, page, 2, false).is_some());
        assert!(next_link("http://b/packages", &f, page, 1, false).is_none());
    }

    #[test]
    fn filtered_link_requires_a_non_empty_page() {
        let f = flags("limit=3&filter=name%3Dreact%2A");
        let page = Page::from_flags(&f).unwrap();
        let link = next_link("http://b/packages", &f, page, 1, true).unwrap();
        assert!(link.starts_with("<http://b/packages?limit=3&offset=3"));
        assert!(link.ends_with("; rel=\"next\""));
        assert!(link.contains("filter=name%3Dreact%2A"));

        assert!(next_link("http://b/packages", &f, page, 0, true).is_none());
    }

    #[test]
    fn offset_advances_by_limit() {
        let f = flags("limit=10&offset=20");
        let page = Page::from_flags(&f).unwrap();
        let link = next_link("http://b/p", &f, page, 10, false).unwrap();
        assert!(link.contains("offset=30"));
    }
}
