//! Request validation boundary
//!
//! Every public operation validates its input shape once, here, and gets a
//! typed `AppError` back instead of scattering ad hoc checks.

use validator::Validate;

use crate::error::AppError;

/// Validate a single request value.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input.validate().map_err(AppError::from)
}

/// Validate every element of a list, naming the first offending index.
pub fn validate_each<T: Validate>(items: &[T], what: &str) -> Result<(), AppError> {
    for (index, item) in items.iter().enumerate() {
        item.validate().map_err(|e| {
            AppError::InvalidInput(format!("{} #{} is invalid: {}", what, index, e))
        })?;
    }
    Ok(())
}

/// Strip directories and unsafe characters from a user-supplied filename.
pub fn sanitize_filename(filename: &str) -> String {
    const MAX: usize = 255;
    let path = std::path::Path::new(filename);
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    if base.contains("..") {
        return "invalid_filename".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim().is_empty() || s.len() < 3 {
        "file".to_string()
    } else {
        s
    }
}
