use docshield_core::{AppError, UploadConfig};
use std::path::Path;

/// Envelope validation errors for uploaded documents
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Content type {content_type} does not match extension '{extension}'")]
    ContentTypeMismatch {
        content_type: String,
        extension: String,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

/// Upload envelope validator.
///
/// Checks what the client claims about a file before any byte is parsed.
/// None of these checks are trusted for safety; the structural validator and
/// the reputation gate look at the bytes.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl UploadValidator {
    pub fn new(
        max_file_size: usize,
        allowed_extensions: Vec<String>,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            max_file_size,
            allowed_extensions,
            allowed_content_types,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_document_size_bytes,
            config.allowed_extensions.clone(),
            config.allowed_content_types.clone(),
        )
    }

    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = extension_of(filename)?;
        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }
        Ok(())
    }

    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = normalize_content_type(content_type);
        if !self.allowed_content_types.iter().any(|ct| ct == &normalized) {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }
        Ok(())
    }

    /// Reject a declared content type that does not fit the filename's extension.
    pub fn validate_extension_content_type_match(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let extension = extension_of(filename)?;
        let normalized = normalize_content_type(content_type);

        let expected: &[&str] = match extension.as_str() {
            "pdf" => &["application/pdf", "application/x-pdf"],
            "png" => &["image/png"],
            "jpg" | "jpeg" => &["image/jpeg", "image/jpg"],
            _ => {
                return Err(ValidationError::InvalidExtension {
                    extension,
                    allowed: self.allowed_extensions.clone(),
                })
            }
        };

        if !expected.contains(&normalized.as_str()) {
            return Err(ValidationError::ContentTypeMismatch {
                content_type: content_type.to_string(),
                extension,
            });
        }
        Ok(())
    }

    pub fn validate_all(
        &self,
        filename: &str,
        content_type: &str,
        file_size: usize,
    ) -> Result<(), ValidationError> {
        self.validate_file_size(file_size)?;
        self.validate_extension(filename)?;
        self.validate_content_type(content_type)?;
        self.validate_extension_content_type_match(filename, content_type)?;
        Ok(())
    }
}

fn extension_of(filename: &str) -> Result<String, ValidationError> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))
}

/// Lowercase and drop parameters such as `; charset=binary`.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> UploadValidator {
        UploadValidator::new(
            1024 * 1024,
            vec!["pdf".to_string(), "png".to_string(), "jpg".to_string()],
            vec![
                "application/pdf".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
            ],
        )
    }

    #[test]
    fn test_file_size() {
        let validator = test_validator();
        assert!(validator.validate_file_size(100).is_ok());
        assert!(matches!(
            validator.validate_file_size(0),
            Err(ValidationError::EmptyFile)
        ));
        assert!(matches!(
            validator.validate_file_size(2 * 1024 * 1024),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_extension() {
        let validator = test_validator();
        assert!(validator.validate_extension("report.PDF").is_ok());
        assert!(validator.validate_extension("scan.jpg").is_ok());
        assert!(validator.validate_extension("notes.docx").is_err());
        assert!(matches!(
            validator.validate_extension("no_extension"),
            Err(ValidationError::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_content_type_ignores_parameters() {
        let validator = test_validator();
        assert!(validator
            .validate_content_type("Application/PDF; charset=binary")
            .is_ok());
        assert!(validator.validate_content_type("text/html").is_err());
    }

    #[test]
    fn test_extension_content_type_mismatch() {
        let validator = test_validator();
        assert!(validator
            .validate_extension_content_type_match("a.pdf", "application/pdf")
            .is_ok());
        assert!(matches!(
            validator.validate_extension_content_type_match("a.pdf", "image/png"),
            Err(ValidationError::ContentTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_errors_map_to_app_errors() {
        let too_large: AppError = ValidationError::FileTooLarge { size: 2, max: 1 }.into();
        assert!(matches!(too_large, AppError::PayloadTooLarge(_)));
        let empty: AppError = ValidationError::EmptyFile.into();
        assert!(matches!(empty, AppError::InvalidInput(_)));
    }
}
