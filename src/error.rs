pub use masterror::{AppError, AppResult};

/// Create contract violation error for `parse` on a non-candidate
pub fn non_candidate_error(dialect: &str) -> AppError {
    AppError::bad_request(format!(
        "expression is not a query candidate for the {} dialect; check is_candidate_for_query before parsing",
        dialect
    ))
}

/// Create error for an unknown or disabled dialect name
pub fn unknown_dialect_error(name: &str) -> AppError {
    AppError::bad_request(format!("unknown or disabled dialect '{}'", name))
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}
