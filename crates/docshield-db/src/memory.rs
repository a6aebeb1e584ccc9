//! In-memory repositories
//!
//! Backed by `tokio::sync::RwLock` maps. Used by unit/integration tests and by
//! the CLI, which runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshield_core::models::{
    AccessLogEntry, RedactionRecord, RedactionTemplate, SafetyState, SecureDocument,
};
use docshield_core::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repository::{
    AccessLogRepository, DocumentRepository, RedactionRecordRepository, TemplateRepository,
};

#[derive(Clone, Default)]
pub struct InMemoryDocumentRepository {
    documents: Arc<RwLock<HashMap<Uuid, SecureDocument>>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `change` to one stored row under the write lock.
    async fn modify(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut SecureDocument) + Send,
    ) -> Result<(), AppError> {
        match self.documents.write().await.get_mut(&id) {
            Some(document) => {
                change(document);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Document {}", id))),
        }
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn create(&self, document: &SecureDocument) -> Result<(), AppError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Err(AppError::Conflict(format!(
                "Document {} already exists",
                document.id
            )));
        }
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SecureDocument>, AppError> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn update(&self, document: &SecureDocument) -> Result<(), AppError> {
        match self.documents.write().await.get_mut(&document.id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Document {}", document.id))),
        }
    }

    async fn record_access(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        self.modify(id, |document| document.record_access(at)).await
    }

    async fn update_content(
        &self,
        id: Uuid,
        content_hash: &str,
        file_size: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.modify(id, |document| {
            document.content_hash = content_hash.to_string();
            document.file_size = file_size;
            document.updated_at = updated_at;
        })
        .await
    }

    async fn update_safety_state(
        &self,
        id: Uuid,
        state: SafetyState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.modify(id, |document| {
            document.safety_state = state;
            document.updated_at = updated_at;
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.documents.write().await.remove(&id).is_some())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<SecureDocument>, AppError> {
        let mut documents: Vec<SecureDocument> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.created_at);
        Ok(documents)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTemplateRepository {
    templates: Arc<RwLock<HashMap<String, RedactionTemplate>>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn save(&self, template: &RedactionTemplate) -> Result<(), AppError> {
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.templates.write().await.remove(id).is_some())
    }

    async fn list_custom(&self) -> Result<Vec<RedactionTemplate>, AppError> {
        let mut templates: Vec<RedactionTemplate> =
            self.templates.read().await.values().cloned().collect();
        templates.sort_by_key(|t| t.created_at);
        Ok(templates)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRedactionRecordRepository {
    records: Arc<RwLock<Vec<RedactionRecord>>>,
}

impl InMemoryRedactionRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RedactionRecordRepository for InMemoryRedactionRecordRepository {
    async fn create(&self, record: &RedactionRecord) -> Result<(), AppError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn list_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<RedactionRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.source_document_id == document_id)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAccessLogRepository {
    entries: Arc<RwLock<Vec<AccessLogEntry>>>,
}

impl InMemoryAccessLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in append order (for test assertions)
    pub async fn all(&self) -> Vec<AccessLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AccessLogRepository for InMemoryAccessLogRepository {
    async fn append(&self, entry: &AccessLogEntry) -> Result<(), AppError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<AccessLogEntry>, AppError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect())
    }
}
