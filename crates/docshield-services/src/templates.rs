//! Custom template management backed by a repository.

use docshield_core::models::{NewCustomTemplate, RedactionTemplate};
use docshield_core::AppError;
use docshield_db::TemplateRepository;
use std::sync::Arc;
use uuid::Uuid;

use crate::redaction::PatternLibrary;

#[derive(Clone)]
pub struct TemplateService {
    library: Arc<PatternLibrary>,
    repository: Arc<dyn TemplateRepository>,
}

impl TemplateService {
    pub fn new(library: Arc<PatternLibrary>, repository: Arc<dyn TemplateRepository>) -> Self {
        Self {
            library,
            repository,
        }
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    /// Compile every persisted custom template into the library.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Result<usize, AppError> {
        let templates = self.repository.list_custom().await?;
        let count = self.library.load_custom(templates)?;
        tracing::info!(count, "Custom templates loaded");
        Ok(count)
    }

    pub fn list_for(&self, viewer: Uuid) -> Vec<RedactionTemplate> {
        self.library.list_templates_for(viewer)
    }

    /// Register and persist. If persisting fails the template is taken back
    /// out of the library.
    pub async fn create(
        &self,
        owner_id: Uuid,
        request: NewCustomTemplate,
    ) -> Result<RedactionTemplate, AppError> {
        let template = self.library.add_custom_template(owner_id, request)?;
        if let Err(e) = self.repository.save(&template).await {
            if let Err(rollback) = self.library.remove_custom_template(owner_id, &template.id) {
                tracing::error!(template_id = %template.id, error = %rollback, "Failed to roll back template registration");
            }
            return Err(e);
        }
        Ok(template)
    }

    pub async fn remove(&self, owner_id: Uuid, template_id: &str) -> Result<(), AppError> {
        let removed = self.library.remove_custom_template(owner_id, template_id)?;
        if let Err(e) = self.repository.delete(template_id).await {
            if let Err(restore) = self.library.load_custom(vec![removed]) {
                tracing::error!(template_id = %template_id, error = %restore, "Failed to restore template after delete error");
            }
            return Err(e);
        }
        Ok(())
    }
}
