//! Filter parsing and evaluation errors.

use snafu::Snafu;

/// Errors from the filter engine.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum FilterError {
    /// The expression did not parse.
    #[snafu(display("malformed filter expression: {detail}"))]
    Malformed {
        /// What was wrong.
        detail: String,
    },

    /// The expression referenced a field outside the taxonomy.
    #[snafu(display("unknown filter field '{field}'"))]
    UnknownField {
        /// The unrecognized field name.
        field: String,
    },
}

/// Result alias for filter operations.
pub type Result<T, E = FilterError> = std::result::Result<T, E>;
