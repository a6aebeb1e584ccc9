//! Pattern library: compiled system rules plus user-authored templates.
//!
//! Every rule is compiled once, when it enters the library. Scans never
//! compile anything. Custom templates are fully compiled before the registry
//! write lock is taken, so readers see either the old set or the new one.

use chrono::Utc;
use docshield_core::models::{NewCustomTemplate, RedactionRule, RedactionTemplate, TemplateKind};
use docshield_core::validation::validate_input;
use docshield_core::{AppError, PatternConfig};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::catalog::{is_system_template_id, system_rules, system_templates};

/// A rule together with its compiled matcher.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: RedactionRule,
    pub regex: Regex,
}

#[derive(Debug)]
struct CompiledTemplate {
    template: RedactionTemplate,
    rules: Vec<Arc<CompiledRule>>,
}

impl CompiledTemplate {
    fn rule(&self, rule_id: &str) -> Option<&Arc<CompiledRule>> {
        self.rules.iter().find(|c| c.rule.id == rule_id)
    }
}

/// A rule picked for a scan, with the template it was taken from.
#[derive(Debug, Clone)]
pub struct SelectedRule {
    pub template_id: Option<String>,
    pub compiled: Arc<CompiledRule>,
}

/// Which rules a scan should run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleSelection {
    /// Every rule in the system catalog
    All,
    /// System catalog rules by id
    Rules(Vec<String>),
    /// `(template_id, rule_id)` pairs, for rules owned by a template
    Qualified(Vec<(String, String)>),
    /// All rules of one template
    Template(String),
}

#[derive(Default)]
struct Registry {
    custom: Vec<Arc<CompiledTemplate>>,
}

pub struct PatternLibrary {
    catalog: Vec<Arc<CompiledRule>>,
    system: Vec<Arc<CompiledTemplate>>,
    registry: RwLock<Registry>,
    regex_size_limit: usize,
    max_custom_rules: usize,
}

impl PatternLibrary {
    pub fn new(regex_size_limit: usize, max_custom_rules: usize) -> Result<Self, AppError> {
        let catalog = system_rules()
            .into_iter()
            .map(|rule| compile_rule(rule, regex_size_limit).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let system = system_templates()
            .into_iter()
            .map(|template| {
                let rules = template
                    .rules
                    .iter()
                    .filter_map(|r| catalog.iter().find(|c| c.rule.id == r.id).cloned())
                    .collect();
                Arc::new(CompiledTemplate { template, rules })
            })
            .collect();

        Ok(Self {
            catalog,
            system,
            registry: RwLock::new(Registry::default()),
            regex_size_limit,
            max_custom_rules,
        })
    }

    pub fn from_config(config: &PatternConfig) -> Result<Self, AppError> {
        Self::new(config.regex_size_limit, config.max_custom_rules)
    }

    /// System rules in catalog order.
    pub fn system_rules(&self) -> Vec<RedactionRule> {
        self.catalog.iter().map(|c| c.rule.clone()).collect()
    }

    /// System templates followed by every custom template, oldest first.
    pub fn list_templates(&self) -> Vec<RedactionTemplate> {
        let registry = self.read();
        self.system
            .iter()
            .chain(registry.custom.iter())
            .map(|c| c.template.clone())
            .collect()
    }

    /// Templates `viewer` may use: system, shared, and their own.
    pub fn list_templates_for(&self, viewer: Uuid) -> Vec<RedactionTemplate> {
        self.list_templates()
            .into_iter()
            .filter(|t| t.is_visible_to(viewer))
            .collect()
    }

    pub fn get_template(&self, id: &str) -> Result<RedactionTemplate, AppError> {
        self.find_template(id)
            .map(|c| c.template.clone())
            .ok_or_else(|| AppError::NotFound(format!("Template {}", id)))
    }

    /// Validate, compile and register a user template.
    #[tracing::instrument(skip(self, request))]
    pub fn add_custom_template(
        &self,
        owner_id: Uuid,
        request: NewCustomTemplate,
    ) -> Result<RedactionTemplate, AppError> {
        validate_input(&request)?;
        if request.rules.len() > self.max_custom_rules {
            return Err(AppError::InvalidInput(format!(
                "A template may hold at most {} rules",
                self.max_custom_rules
            )));
        }

        let template = RedactionTemplate {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            description: request.description,
            kind: TemplateKind::Custom {
                owner_id,
                shared: request.shared,
            },
            rules: request.rules,
            created_at: Utc::now(),
        };
        let compiled = self.compile_template(template)?;
        let template = compiled.template.clone();

        self.write().custom.push(Arc::new(compiled));
        tracing::info!(
            template_id = %template.id,
            rules = template.rules.len(),
            "Custom template registered"
        );
        Ok(template)
    }

    /// Remove a custom template. Only its owner may remove it.
    pub fn remove_custom_template(
        &self,
        owner_id: Uuid,
        id: &str,
    ) -> Result<RedactionTemplate, AppError> {
        if is_system_template_id(id) {
            return Err(AppError::InvalidInput(
                "System templates cannot be removed".to_string(),
            ));
        }

        let mut registry = self.write();
        let position = registry
            .custom
            .iter()
            .position(|c| c.template.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Template {}", id)))?;
        if registry.custom[position].template.owner_id() != Some(owner_id) {
            return Err(AppError::AccessDenied(format!(
                "template {} is not owned by {}",
                id, owner_id
            )));
        }
        let removed = registry.custom.remove(position);
        Ok(removed.template.clone())
    }

    /// Register previously persisted custom templates, replacing any already
    /// loaded under the same id. Nothing is registered if one fails to compile.
    pub fn load_custom(&self, templates: Vec<RedactionTemplate>) -> Result<usize, AppError> {
        let compiled = templates
            .into_iter()
            .map(|template| {
                if template.is_system() || is_system_template_id(&template.id) {
                    return Err(AppError::InvalidInput(format!(
                        "Template {} is not a custom template",
                        template.id
                    )));
                }
                self.compile_template(template).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = compiled.len();
        let mut registry = self.write();
        for template in compiled {
            registry
                .custom
                .retain(|c| c.template.id != template.template.id);
            registry.custom.push(template);
        }
        Ok(count)
    }

    /// Resolve a selection into compiled rules, deduplicated, in request order.
    pub fn resolve(&self, selection: &RuleSelection) -> Result<Vec<SelectedRule>, AppError> {
        let mut selected = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |template_id: Option<String>, compiled: Arc<CompiledRule>| {
            if seen.insert((template_id.clone(), compiled.rule.id.clone())) {
                selected.push(SelectedRule {
                    template_id,
                    compiled,
                });
            }
        };

        match selection {
            RuleSelection::All => {
                for compiled in &self.catalog {
                    push(None, compiled.clone());
                }
            }
            RuleSelection::Rules(ids) => {
                for id in ids {
                    let compiled = self
                        .catalog
                        .iter()
                        .find(|c| &c.rule.id == id)
                        .ok_or_else(|| AppError::NotFound(format!("Rule {}", id)))?;
                    push(None, compiled.clone());
                }
            }
            RuleSelection::Qualified(pairs) => {
                for (template_id, rule_id) in pairs {
                    let template = self
                        .find_template(template_id)
                        .ok_or_else(|| AppError::NotFound(format!("Template {}", template_id)))?;
                    let compiled = template.rule(rule_id).ok_or_else(|| {
                        AppError::NotFound(format!("Rule {} in template {}", rule_id, template_id))
                    })?;
                    push(Some(template_id.clone()), compiled.clone());
                }
            }
            RuleSelection::Template(template_id) => {
                let template = self
                    .find_template(template_id)
                    .ok_or_else(|| AppError::NotFound(format!("Template {}", template_id)))?;
                for compiled in &template.rules {
                    push(Some(template_id.clone()), compiled.clone());
                }
            }
        }
        Ok(selected)
    }

    fn find_template(&self, id: &str) -> Option<Arc<CompiledTemplate>> {
        if let Some(system) = self.system.iter().find(|c| c.template.id == id) {
            return Some(system.clone());
        }
        self.read()
            .custom
            .iter()
            .find(|c| c.template.id == id)
            .cloned()
    }

    fn compile_template(&self, template: RedactionTemplate) -> Result<CompiledTemplate, AppError> {
        let mut ids = HashSet::new();
        for rule in &template.rules {
            if !ids.insert(rule.id.as_str()) {
                return Err(AppError::InvalidInput(format!(
                    "Duplicate rule id '{}' in template",
                    rule.id
                )));
            }
        }
        let rules = template
            .rules
            .iter()
            .cloned()
            .map(|rule| compile_rule(rule, self.regex_size_limit).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledTemplate { template, rules })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn compile_rule(rule: RedactionRule, size_limit: usize) -> Result<CompiledRule, AppError> {
    let regex = RegexBuilder::new(&rule.pattern)
        .case_insensitive(rule.case_insensitive)
        .size_limit(size_limit)
        .dfa_size_limit(size_limit)
        .build()
        .map_err(|e| AppError::InvalidPattern {
            rule_id: rule.id.clone(),
            reason: e.to_string(),
        })?;
    if regex.is_match("") {
        return Err(AppError::InvalidPattern {
            rule_id: rule.id.clone(),
            reason: "pattern matches the empty string".to_string(),
        });
    }
    Ok(CompiledRule { rule, regex })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshield_core::models::RuleCategory;

    fn library() -> PatternLibrary {
        PatternLibrary::new(1 << 20, 50).unwrap()
    }

    fn rule(id: &str, pattern: &str) -> RedactionRule {
        RedactionRule {
            id: id.to_string(),
            label: id.to_string(),
            pattern: pattern.to_string(),
            category: RuleCategory::Other,
            replacement: None,
            case_insensitive: false,
        }
    }

    fn request(rules: Vec<RedactionRule>, shared: bool) -> NewCustomTemplate {
        NewCustomTemplate {
            name: "Project codes".to_string(),
            description: None,
            rules,
            shared,
        }
    }

    #[test]
    fn test_system_templates_are_listed_first() {
        let templates = library().list_templates();
        let ids: Vec<_> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["pii", "contact", "financial", "law_enforcement", "medical"]
        );
    }

    #[test]
    fn test_custom_template_visibility() {
        let lib = library();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let private = lib
            .add_custom_template(owner, request(vec![rule("code", r"PRJ-\d{4}")], false))
            .unwrap();
        let shared = lib
            .add_custom_template(owner, request(vec![rule("code", r"TKT-\d{4}")], true))
            .unwrap();

        let mine: Vec<_> = lib.list_templates_for(owner).into_iter().map(|t| t.id).collect();
        assert!(mine.contains(&private.id) && mine.contains(&shared.id));

        let theirs: Vec<_> = lib.list_templates_for(other).into_iter().map(|t| t.id).collect();
        assert!(!theirs.contains(&private.id));
        assert!(theirs.contains(&shared.id));
    }

    #[test]
    fn test_invalid_pattern_is_rejected_with_rule_id() {
        let lib = library();
        let err = lib
            .add_custom_template(Uuid::new_v4(), request(vec![rule("broken", "(unclosed")], false))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPattern { ref rule_id, .. } if rule_id == "broken"));
        assert_eq!(lib.list_templates().len(), 5);
    }

    #[test]
    fn test_empty_match_pattern_is_rejected() {
        let err = library()
            .add_custom_template(Uuid::new_v4(), request(vec![rule("optional", "x?")], false))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPattern { .. }));
    }

    #[test]
    fn test_oversized_pattern_is_rejected() {
        let err = library()
            .add_custom_template(Uuid::new_v4(), request(vec![rule("huge", r"\w{5000}")], false))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPattern { .. }));
    }

    #[test]
    fn test_duplicate_rule_ids_and_rule_limit() {
        let lib = PatternLibrary::new(1 << 20, 2).unwrap();
        let owner = Uuid::new_v4();

        let dup = lib.add_custom_template(
            owner,
            request(vec![rule("a", "alpha"), rule("a", "beta")], false),
        );
        assert!(matches!(dup, Err(AppError::InvalidInput(_))));

        let too_many = lib.add_custom_template(
            owner,
            request(
                vec![rule("a", "alpha"), rule("b", "beta"), rule("c", "gamma")],
                false,
            ),
        );
        assert!(matches!(too_many, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_only_owner_removes_custom_template() {
        let lib = library();
        let owner = Uuid::new_v4();
        let template = lib
            .add_custom_template(owner, request(vec![rule("code", r"PRJ-\d{4}")], true))
            .unwrap();

        assert!(matches!(
            lib.remove_custom_template(Uuid::new_v4(), &template.id),
            Err(AppError::AccessDenied(_))
        ));
        assert!(matches!(
            lib.remove_custom_template(owner, "pii"),
            Err(AppError::InvalidInput(_))
        ));
        lib.remove_custom_template(owner, &template.id).unwrap();
        assert!(matches!(
            lib.get_template(&template.id),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_qualified_and_unknown_rules() {
        let lib = library();
        let selected = lib
            .resolve(&RuleSelection::Qualified(vec![
                ("contact".to_string(), "email".to_string()),
                ("contact".to_string(), "email".to_string()),
            ]))
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].template_id.as_deref(), Some("contact"));

        let missing = lib.resolve(&RuleSelection::Rules(vec!["passport".to_string()]));
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let wrong_template = lib.resolve(&RuleSelection::Qualified(vec![(
            "contact".to_string(),
            "ssn".to_string(),
        )]));
        assert!(matches!(wrong_template, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_load_custom_replaces_by_id() {
        let lib = library();
        let owner = Uuid::new_v4();
        let mut template = lib
            .add_custom_template(owner, request(vec![rule("code", r"PRJ-\d{4}")], false))
            .unwrap();

        template.name = "Renamed".to_string();
        assert_eq!(lib.load_custom(vec![template.clone()]).unwrap(), 1);
        assert_eq!(lib.list_templates().len(), 6);
        assert_eq!(lib.get_template(&template.id).unwrap().name, "Renamed");

        let system = lib.get_template("pii").unwrap();
        assert!(lib.load_custom(vec![system]).is_err());
    }
}
