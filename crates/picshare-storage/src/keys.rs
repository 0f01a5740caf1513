//! Shared key generation for storage backends.

use uuid::Uuid;

/// Storage key for an image's bytes: `images/{image_id}`.
pub fn image_key(image_id: Uuid) -> String {
    format!("images/{}", image_id)
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<(), crate::StorageError> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(crate::StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_key_layout() {
        let id = Uuid::nil();
        assert_eq!(image_key(id), "images/00000000-0000-0000-0000-000000000000");
        assert!(validate_key(&image_key(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("").is_err());
    }
}
