use super::ApiError;

pub fn validate_id(field: &str, id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "{field} is required and must be a positive integer"
        )));
    }
    Ok(id)
}

pub fn validate_not_empty<T>(field: &str, items: &[T]) -> Result<(), ApiError> {
    if items.is_empty() {
        return Err(ApiError::validation(format!("{field} list is empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("user_id", 1).is_ok());
        assert!(validate_id("user_id", 0).is_err());
        assert!(validate_id("user_id", -4).is_err());
    }

    #[test]
    fn test_validate_not_empty() {
        assert!(validate_not_empty("users", &[1]).is_ok());
        assert!(validate_not_empty::<u8>("users", &[]).is_err());
    }
}
