//! Media plane result type

use super::error::MpfError;

/// Standard result type for media plane operations
pub type Result<T> = std::result::Result<T, MpfError>;
