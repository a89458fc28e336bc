//! Convenience result type alias for Chatis.

use crate::error::AppError;

/// A specialized `Result` type for Chatis operations.
pub type AppResult<T> = Result<T, AppError>;
