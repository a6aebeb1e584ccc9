//! Built-in detection rules and the system templates that group them.

use chrono::{DateTime, Utc};
use docshield_core::models::{RedactionRule, RedactionTemplate, RuleCategory, TemplateKind};

struct RuleDef {
    id: &'static str,
    label: &'static str,
    pattern: &'static str,
    category: RuleCategory,
    replacement: Option<&'static str>,
    case_insensitive: bool,
}

const RULES: &[RuleDef] = &[
    RuleDef {
        id: "email",
        label: "Email address",
        pattern: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        category: RuleCategory::Contact,
        replacement: None,
        case_insensitive: false,
    },
    RuleDef {
        id: "phone",
        label: "Phone number",
        pattern: r"(?:\+?1[-.\s]?)?(?:\(\d{3}\)\s?|\d{3}[-.\s])\d{3}[-.\s]\d{4}\b",
        category: RuleCategory::Contact,
        replacement: None,
        case_insensitive: false,
    },
    RuleDef {
        id: "ssn",
        label: "Social security number",
        pattern: r"\b\d{3}-\d{2}-\d{4}\b",
        category: RuleCategory::Identity,
        replacement: None,
        case_insensitive: false,
    },
    RuleDef {
        id: "credit_card",
        label: "Payment card number",
        pattern: r"\b(?:\d{4}[- ]?){3}\d{4}\b",
        category: RuleCategory::Financial,
        replacement: None,
        case_insensitive: false,
    },
    RuleDef {
        id: "date_of_birth",
        label: "Date of birth",
        pattern: r"\b(?:dob|date of birth)\s*[:\-]?\s*\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b",
        category: RuleCategory::Identity,
        replacement: Some("[DOB]"),
        case_insensitive: true,
    },
    RuleDef {
        id: "street_address",
        label: "Street address",
        pattern: r"\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way)\b\.?",
        category: RuleCategory::Location,
        replacement: Some("[ADDRESS]"),
        case_insensitive: false,
    },
    RuleDef {
        id: "ip_address",
        label: "IPv4 address",
        pattern: r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
        category: RuleCategory::Network,
        replacement: None,
        case_insensitive: false,
    },
    RuleDef {
        id: "drivers_license",
        label: "Driver's license number",
        pattern: r"\b(?:dl|driver'?s? licen[cs]e)\s*(?:#|no\.?|number)?\s*[:\-]?\s*[a-z0-9]{5,13}\b",
        category: RuleCategory::Identity,
        replacement: None,
        case_insensitive: true,
    },
    RuleDef {
        id: "badge_number",
        label: "Officer badge number",
        pattern: r"\bbadge\s*(?:#|no\.?|number)?\s*[:\-]?\s*\d{3,6}\b",
        category: RuleCategory::LawEnforcement,
        replacement: Some("[BADGE]"),
        case_insensitive: true,
    },
    RuleDef {
        id: "case_number",
        label: "Case number",
        pattern: r"\b\d{2,4}-[A-Z]{2,4}-\d{3,8}\b",
        category: RuleCategory::LawEnforcement,
        replacement: None,
        case_insensitive: false,
    },
    RuleDef {
        id: "vehicle_vin",
        label: "Vehicle identification number",
        pattern: r"\b[A-HJ-NPR-Z0-9]{17}\b",
        category: RuleCategory::LawEnforcement,
        replacement: Some("[VIN]"),
        case_insensitive: false,
    },
    RuleDef {
        id: "medical_record_number",
        label: "Medical record number",
        pattern: r"\bmrn\s*[:#]?\s*\d{6,10}\b",
        category: RuleCategory::Medical,
        replacement: Some("[MRN]"),
        case_insensitive: true,
    },
    RuleDef {
        id: "bank_account",
        label: "Bank account number",
        pattern: r"\b(?:account|acct)\s*(?:#|no\.?|number)?\s*[:\-]?\s*\d{8,17}\b",
        category: RuleCategory::Financial,
        replacement: None,
        case_insensitive: true,
    },
];

struct TemplateDef {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    rules: &'static [&'static str],
}

const TEMPLATES: &[TemplateDef] = &[
    TemplateDef {
        id: "pii",
        name: "Personal information",
        description: "Common personally identifying details",
        rules: &[
            "email",
            "phone",
            "ssn",
            "date_of_birth",
            "street_address",
            "drivers_license",
        ],
    },
    TemplateDef {
        id: "contact",
        name: "Contact details",
        description: "Ways to reach a person",
        rules: &["email", "phone", "street_address"],
    },
    TemplateDef {
        id: "financial",
        name: "Financial",
        description: "Payment cards, bank accounts and tax identifiers",
        rules: &["credit_card", "bank_account", "ssn"],
    },
    TemplateDef {
        id: "law_enforcement",
        name: "Law enforcement",
        description: "Officer, case and vehicle identifiers in incident reports",
        rules: &[
            "badge_number",
            "case_number",
            "vehicle_vin",
            "drivers_license",
            "phone",
            "street_address",
        ],
    },
    TemplateDef {
        id: "medical",
        name: "Medical",
        description: "Patient identifiers in clinical records",
        rules: &["medical_record_number", "date_of_birth", "ssn", "phone"],
    },
];

/// Every built-in rule, in catalog order.
pub fn system_rules() -> Vec<RedactionRule> {
    RULES
        .iter()
        .map(|def| RedactionRule {
            id: def.id.to_string(),
            label: def.label.to_string(),
            pattern: def.pattern.to_string(),
            category: def.category,
            replacement: def.replacement.map(str::to_string),
            case_insensitive: def.case_insensitive,
        })
        .collect()
}

/// The built-in templates. Rules are copied out of the catalog.
pub fn system_templates() -> Vec<RedactionTemplate> {
    let rules = system_rules();
    TEMPLATES
        .iter()
        .map(|def| RedactionTemplate {
            id: def.id.to_string(),
            name: def.name.to_string(),
            description: Some(def.description.to_string()),
            kind: TemplateKind::System,
            rules: def
                .rules
                .iter()
                .filter_map(|id| rules.iter().find(|r| r.id == *id).cloned())
                .collect(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        })
        .collect()
}

pub fn is_system_template_id(id: &str) -> bool {
    TEMPLATES.iter().any(|t| t.id == id)
}
