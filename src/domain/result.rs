//! Result type alias for Lantern
//!
//! This module provides a convenient Result type alias that uses LanternError
//! as the error type.

use super::errors::LanternError;

/// Result type alias for Lantern operations
///
/// # Examples
///
/// ```
/// use lantern::domain::result::Result;
/// use lantern::domain::errors::LanternError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(LanternError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, LanternError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::LanternError;

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(LanternError::Validation("test error".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
