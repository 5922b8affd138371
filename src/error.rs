//! Error types for configuration and coefficient tables.

use thiserror::Error;

/// Errors raised while building or loading simulation inputs.
///
/// The propagators themselves never fail; these only surface from
/// parameter validation, file I/O and coefficient-table construction.
#[derive(Error, Debug)]
pub enum GratingError {
    /// A simulation parameter is outside its physical range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Real/imaginary tables have the wrong length
    #[error("coefficient table length mismatch: expected {expected}, got {actual}")]
    TableLength { expected: usize, actual: usize },

    /// Requested diffraction order is not stored in the table
    #[error("diffraction order {order} outside table half-width {half_width}")]
    OrderOutOfRange { order: i32, half_width: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GratingError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        GratingError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GratingError>;
