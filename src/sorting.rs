//! Collection sorting.
//!
//! `sort=<field>=<asc|desc>` applies to the entire candidate set before
//! slicing. Sorting by `name` is answered from the index alone; any other
//! field needs metadata on every hit, which the facade arranges by
//! forcing enrichment (bounded by the fan-out cap).

use std::cmp::Ordering;

use prism_core::ApiError;
use prism_index::Field;
use prism_index::PackageHit;
use prism_index::field_values;

/// A parsed sort directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDirective {
    /// The field to order by.
    pub field: Field,
    /// Descending when true; ascending is the default.
    pub descending: bool,
}

impl SortDirective {
    /// Parse `<field>` or `<field>=<asc|desc>`.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let (field_str, direction) = match raw.split_once('=') {
            Some((f, d)) => (f, d),
            None => (raw, "asc"),
        };

        let field = Field::parse(field_str).map_err(|_| ApiError::BadRequest {
            detail: format!("unknown sort field '{field_str}'"),
        })?;

        let descending = match direction {
            "asc" | "" => false,
            "desc" => true,
            other => {
                return Err(ApiError::BadRequest {
                    detail: format!("sort direction must be 'asc' or 'desc', got '{other}'"),
                });
            }
        };

        Ok(Self { field, descending })
    }

    /// Whether this directive can be answered without metadata.
    pub fn needs_metadata(&self) -> bool {
        self.field != Field::Name
    }

    /// Order hits in place.
    ///
    /// Hits missing the sort field order after those carrying it; name is
    /// always the tiebreak, so the result is total and deterministic.
    pub fn apply(&self, hits: &mut [PackageHit]) {
        hits.sort_by(|a, b| {
            let ord = match self.field {
                Field::Name => a.name.cmp(&b.name),
                field => {
                    let left = sort_key(field, a);
                    let right = sort_key(field, b);
                    match (left, right) {
                        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => a.name.cmp(&b.name),
                    }
                }
            };
            if self.descending { ord.reverse() } else { ord }
        });
    }
}

fn sort_key(field: Field, hit: &PackageHit) -> Option<String> {
    let metadata = hit.metadata.as_ref()?;
    field_values(field, metadata).into_iter().next().map(|v| v.to_lowercase())
}
