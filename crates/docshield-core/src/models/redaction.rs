use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Tolerance for float rounding at the page edge
const EDGE_EPSILON: f64 = 1e-6;

/// A rectangle on one page, in page-relative units.
///
/// Coordinates are fractions of the page's MediaBox with the origin at the
/// top-left corner: `x` grows to the right, `y` grows downward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_area_bounds"))]
pub struct RedactionArea {
    /// 0-based page index
    pub page: u32,
    #[validate(range(min = 0.0, max = 1.0, message = "x must be within [0, 1]"))]
    pub x: f64,
    #[validate(range(min = 0.0, max = 1.0, message = "y must be within [0, 1]"))]
    pub y: f64,
    #[validate(range(
        exclusive_min = 0.0,
        max = 1.0,
        message = "width must be within (0, 1]"
    ))]
    pub width: f64,
    #[validate(range(
        exclusive_min = 0.0,
        max = 1.0,
        message = "height must be within (0, 1]"
    ))]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

impl RedactionArea {
    pub fn new(page: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page,
            x,
            y,
            width,
            height,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

fn validate_area_bounds(area: &RedactionArea) -> Result<(), ValidationError> {
    let finite = [area.x, area.y, area.width, area.height]
        .iter()
        .all(|v| v.is_finite());
    if !finite {
        let mut err = ValidationError::new("area_not_finite");
        err.message = Some("Area coordinates must be finite numbers".into());
        return Err(err);
    }
    if area.x + area.width > 1.0 + EDGE_EPSILON || area.y + area.height > 1.0 + EDGE_EPSILON {
        let mut err = ValidationError::new("area_outside_page");
        err.message = Some("Area extends beyond the page edge".into());
        return Err(err);
    }
    Ok(())
}

/// Visual options shared by preview and permanent redaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RedactionStyle {
    /// RGB fill for the opaque boxes
    #[serde(default = "default_fill")]
    pub fill_color: [u8; 3],
    /// Optional text stamped inside each box (ASCII only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 1, max = 64, message = "Label must be between 1 and 64 characters"),
        custom(function = "validate_label")
    )]
    pub label: Option<String>,
}

fn default_fill() -> [u8; 3] {
    [0, 0, 0]
}

impl Default for RedactionStyle {
    fn default() -> Self {
        Self {
            fill_color: default_fill(),
            label: None,
        }
    }
}

fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("label_charset");
        err.message = Some("Label must be printable ASCII".into());
        Err(err)
    }
}

/// How often a rule matched during a pattern-driven scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternUsage {
    /// `None` for rules taken from the system catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub rule_id: String,
    pub count: usize,
}

/// Audit evidence that a redaction was applied. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionRecord {
    pub id: Uuid,
    pub source_document_id: Uuid,
    pub result_document_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub areas: Vec<RedactionArea>,
    pub patterns: Vec<PatternUsage>,
    pub is_permanent: bool,
    pub redaction_count: u32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_validation() {
        assert!(RedactionArea::new(0, 0.1, 0.1, 0.5, 0.2).validate().is_ok());
        assert!(RedactionArea::new(0, 0.0, 0.0, 1.0, 1.0).validate().is_ok());

        // zero or negative sizes
        assert!(RedactionArea::new(0, 0.1, 0.1, 0.0, 0.2).validate().is_err());
        assert!(RedactionArea::new(0, 0.1, 0.1, 0.2, -0.1).validate().is_err());

        // outside the page
        assert!(RedactionArea::new(0, -0.1, 0.1, 0.2, 0.2).validate().is_err());
        assert!(RedactionArea::new(0, 0.9, 0.1, 0.2, 0.2).validate().is_err());
        assert!(RedactionArea::new(0, 0.1, f64::NAN, 0.2, 0.2)
            .validate()
            .is_err());
    }

    #[test]
    fn test_style_label_must_be_ascii() {
        let style = RedactionStyle {
            fill_color: [0, 0, 0],
            label: Some("REDACTED".to_string()),
        };
        assert!(style.validate().is_ok());

        let style = RedactionStyle {
            label: Some("expurgé".to_string()),
            ..RedactionStyle::default()
        };
        assert!(style.validate().is_err());
    }

    #[test]
    fn test_area_deserializes_without_reason() {
        let area: RedactionArea =
            serde_json::from_str(r#"{"page":2,"x":0.1,"y":0.2,"width":0.3,"height":0.05}"#)
                .unwrap();
        assert_eq!(area.page, 2);
        assert!(area.reason.is_none());
    }
}
