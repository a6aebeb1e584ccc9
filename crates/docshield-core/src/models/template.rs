use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Maximum length of a rule or template identifier
pub const MAX_RULE_ID_LENGTH: usize = 64;

/// Category tag attached to every detection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Contact,
    Identity,
    Financial,
    LawEnforcement,
    Medical,
    Location,
    Network,
    Other,
}

/// A single named detection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RedactionRule {
    #[validate(custom(function = "validate_rule_id"))]
    pub id: String,
    #[validate(length(
        min = 1,
        max = 128,
        message = "Rule label must be between 1 and 128 characters"
    ))]
    pub label: String,
    #[validate(length(
        min = 1,
        max = 2048,
        message = "Rule pattern must be between 1 and 2048 characters"
    ))]
    pub pattern: String,
    pub category: RuleCategory,
    /// Token written in place of a match; defaults to `[ID]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 64, message = "Replacement must be at most 64 characters"))]
    pub replacement: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl RedactionRule {
    pub fn replacement_token(&self) -> String {
        match &self.replacement {
            Some(token) => token.clone(),
            None => format!("[{}]", self.id.to_uppercase()),
        }
    }
}

/// Whether a template ships with the system or belongs to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateKind {
    System,
    Custom { owner_id: Uuid, shared: bool },
}

/// A named, ordered set of detection rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: TemplateKind,
    pub rules: Vec<RedactionRule>,
    pub created_at: DateTime<Utc>,
}

impl RedactionTemplate {
    pub fn is_system(&self) -> bool {
        matches!(self.kind, TemplateKind::System)
    }

    pub fn owner_id(&self) -> Option<Uuid> {
        match self.kind {
            TemplateKind::System => None,
            TemplateKind::Custom { owner_id, .. } => Some(owner_id),
        }
    }

    /// System templates and shared custom templates are visible to everyone.
    pub fn is_visible_to(&self, viewer: Uuid) -> bool {
        match self.kind {
            TemplateKind::System => true,
            TemplateKind::Custom { owner_id, shared } => shared || owner_id == viewer,
        }
    }

    pub fn rule(&self, rule_id: &str) -> Option<&RedactionRule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }
}

/// Request to register a user-authored template.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NewCustomTemplate {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Template name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1024, message = "Description must be at most 1024 characters"))]
    pub description: Option<String>,
    #[validate(
        length(min = 1, max = 200, message = "A template needs between 1 and 200 rules"),
        nested
    )]
    pub rules: Vec<RedactionRule>,
    #[serde(default)]
    pub shared: bool,
}

fn validate_rule_id(id: &str) -> Result<(), ValidationError> {
    let well_formed = !id.is_empty()
        && id.len() <= MAX_RULE_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if well_formed {
        Ok(())
    } else {
        let mut err = ValidationError::new("rule_id");
        err.message = Some(
            "Rule id must be 1-64 characters of letters, digits, '_' or '-'".into(),
        );
        Err(err)
    }
}
