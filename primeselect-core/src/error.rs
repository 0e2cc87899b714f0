use thiserror::Error;

use crate::CacheKey;

/// Errors reported by selector creation, cache lookup and clearing.
///
/// All variants are local, synchronous failures. Nothing is retried
/// internally and a failed call never modifies any cache cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimeSelectError {
    /// A selector was created with an empty name.
    #[error("selector should have a valid, non-empty name")]
    InvalidName,

    /// A selector with the same name is already registered.
    #[error("selector with name `{0}` already exists, use a unique name for each selector")]
    NameConflict(String),

    /// Metrics or clearing were requested for a cache that is not registered,
    /// or a selector created before a reset was called.
    #[error("selector `{0}` not found")]
    NotFound(CacheKey),

    /// The cache under this key holds a different result type.
    ///
    /// Only reachable through direct [`CacheRegistry`](crate::CacheRegistry)
    /// use; selectors always resolve their own slots.
    #[error("cache `{0}` holds a result of a different type")]
    TypeMismatch(CacheKey),
}

/// Result type used across the crate.
pub type Result<T, E = PrimeSelectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PrimeSelectError::NameConflict("users".to_string()).to_string(),
            "selector with name `users` already exists, use a unique name for each selector"
        );
        assert_eq!(
            PrimeSelectError::NotFound(CacheKey::sub("users", "42")).to_string(),
            "selector `users[42]` not found"
        );
    }
}
