//! Result type alias for ftpsync operations

use crate::Error;

/// Result type alias for ftpsync operations
pub type Result<T> = std::result::Result<T, Error>;
