//! Shared key generation for storage backends.
//!
//! Key format: `documents/{owner_id}/{document_id}.{ext}`.

use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Generate the storage key for a document.
///
/// All backends must use this format for consistency.
pub fn document_key(owner_id: Uuid, document_id: Uuid, extension: &str) -> String {
    format!("documents/{}/{}.{}", owner_id, document_id, extension)
}

/// Reject keys that could escape the storage root.
pub(crate) fn check_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty()
        || storage_key.contains("..")
        || storage_key.starts_with('/')
        || storage_key.contains('\\')
        || storage_key.contains('\0')
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_key_layout() {
        let owner = Uuid::nil();
        let doc = Uuid::nil();
        assert_eq!(
            document_key(owner, doc, "pdf"),
            format!("documents/{}/{}.pdf", owner, doc)
        );
    }

    #[test]
    fn test_check_key() {
        assert!(check_key("documents/a/b.pdf").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("../etc/passwd").is_err());
        assert!(check_key("/etc/passwd").is_err());
        assert!(check_key("documents\\a").is_err());
    }
}
