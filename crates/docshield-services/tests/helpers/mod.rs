#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshield_core::models::{
    AccessLogEntry, RedactionRecord, SafetyState, SecureDocument, UploadRequest,
};
use docshield_core::{
    AccessConfig, AppError, ReputationConfig, ReputationProvider, UploadConfig,
};
use docshield_db::{
    AccessLogRepository, DocumentRepository, InMemoryAccessLogRepository,
    InMemoryDocumentRepository, InMemoryRedactionRecordRepository, RedactionRecordRepository,
};
use docshield_processing::{BlankRasterizer, RedactionEngine, UploadValidator};
use docshield_services::access::FixedCodeVerifier;
use docshield_services::{
    AccessGate, ContentScanner, DocumentServiceParts, MemoryStorage, PatternLibrary,
    ReputationGate, ReputationService, ReputationVerdict, SecureDocumentService,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

pub const MFA_CODE: &str = "246810";
pub const GRANT_SECRET: &str = "integration-test-grant-secret-0123456789";

pub struct Harness {
    pub service: SecureDocumentService,
    pub storage: Arc<MemoryStorage>,
    pub documents: Arc<InMemoryDocumentRepository>,
    pub records: Arc<InMemoryRedactionRecordRepository>,
    pub access_log: Arc<dyn AccessLogRepository>,
}

pub fn reputation_config() -> ReputationConfig {
    ReputationConfig {
        provider: ReputationProvider::Disabled,
        timeout_secs: 1,
        block_active_content: true,
        block_embedded_files: false,
        allow_encrypted: false,
    }
}

fn upload_config() -> UploadConfig {
    UploadConfig {
        max_document_size_bytes: 5 * 1024 * 1024,
        allowed_extensions: vec!["pdf".into(), "png".into(), "jpg".into(), "jpeg".into()],
        allowed_content_types: vec![
            "application/pdf".into(),
            "image/png".into(),
            "image/jpeg".into(),
        ],
    }
}

pub fn harness() -> Harness {
    build(None, Arc::new(InMemoryAccessLogRepository::new()), Overrides::default())
}

pub fn harness_with_reputation(service: Arc<dyn ReputationService>) -> Harness {
    build(
        Some(service),
        Arc::new(InMemoryAccessLogRepository::new()),
        Overrides::default(),
    )
}

pub fn harness_with_access_log(log: Arc<dyn AccessLogRepository>) -> Harness {
    build(None, log, Overrides::default())
}

/// A harness whose service reaches documents through [`ScriptedDocuments`].
/// `Harness::documents` stays the backing store, so assertions read the
/// real rows.
pub fn scripted_harness(
    records: Option<Arc<dyn RedactionRecordRepository>>,
) -> (Harness, Arc<ScriptedDocuments>) {
    let inner = Arc::new(InMemoryDocumentRepository::new());
    let scripted = Arc::new(ScriptedDocuments::new(inner.clone()));
    let documents: Arc<dyn DocumentRepository> = scripted.clone();
    let h = build(
        None,
        Arc::new(InMemoryAccessLogRepository::new()),
        Overrides {
            inner: Some(inner),
            documents: Some(documents),
            records,
        },
    );
    (h, scripted)
}

#[derive(Default)]
struct Overrides {
    inner: Option<Arc<InMemoryDocumentRepository>>,
    documents: Option<Arc<dyn DocumentRepository>>,
    records: Option<Arc<dyn RedactionRecordRepository>>,
}

fn build(
    reputation: Option<Arc<dyn ReputationService>>,
    log: Arc<dyn AccessLogRepository>,
    overrides: Overrides,
) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let documents = overrides
        .inner
        .unwrap_or_else(|| Arc::new(InMemoryDocumentRepository::new()));
    let records = Arc::new(InMemoryRedactionRecordRepository::new());
    let service_documents: Arc<dyn DocumentRepository> = match overrides.documents {
        Some(documents) => documents,
        None => documents.clone(),
    };
    let service_records: Arc<dyn RedactionRecordRepository> = match overrides.records {
        Some(records) => records,
        None => records.clone(),
    };

    let access = AccessGate::new(
        service_documents.clone(),
        log.clone(),
        Arc::new(FixedCodeVerifier::new(MFA_CODE)),
        &AccessConfig {
            grant_secret: GRANT_SECRET.to_string(),
            grant_ttl_secs: 3600,
        },
    );
    let library = Arc::new(PatternLibrary::new(1 << 20, 50).unwrap());

    let service = SecureDocumentService::new(DocumentServiceParts {
        storage: storage.clone(),
        documents: service_documents,
        records: service_records,
        gate: Arc::new(ReputationGate::new(reputation, &reputation_config())),
        access,
        engine: Arc::new(RedactionEngine::new(Arc::new(BlankRasterizer), 72)),
        scanner: ContentScanner::new(library),
        uploads: UploadValidator::from_config(&upload_config()),
    });

    Harness {
        service,
        storage,
        documents,
        records,
        access_log: log,
    }
}

pub fn pdf_upload(owner_id: Uuid) -> UploadRequest {
    UploadRequest {
        owner_id,
        filename: "report.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        requires_mfa: false,
        access_password: None,
        expires_at: None,
    }
}

/// Returns one fixed verdict.
pub struct StaticReputation(pub ReputationVerdict);

#[async_trait]
impl ReputationService for StaticReputation {
    async fn lookup(&self, _sha256: &str, _data: &[u8]) -> anyhow::Result<ReputationVerdict> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub struct FailingReputation;

#[async_trait]
impl ReputationService for FailingReputation {
    async fn lookup(&self, _sha256: &str, _data: &[u8]) -> anyhow::Result<ReputationVerdict> {
        Err(anyhow::anyhow!("connection refused"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Never answers within the gate's timeout.
pub struct HangingReputation;

#[async_trait]
impl ReputationService for HangingReputation {
    async fn lookup(&self, _sha256: &str, _data: &[u8]) -> anyhow::Result<ReputationVerdict> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ReputationVerdict::Safe)
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

/// Access log whose storage is down.
pub struct FailingAccessLog;

#[async_trait]
impl AccessLogRepository for FailingAccessLog {
    async fn append(&self, _entry: &AccessLogEntry) -> Result<(), AppError> {
        Err(AppError::Internal("access log unavailable".to_string()))
    }

    async fn list_for_document(&self, _document_id: Uuid) -> Result<Vec<AccessLogEntry>, AppError> {
        Ok(Vec::new())
    }
}

/// Document store that can pause one read or fail chosen writes.
pub struct ScriptedDocuments {
    inner: Arc<InMemoryDocumentRepository>,
    pause_next_get: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_update_content: AtomicBool,
    /// Signalled once the paused `get` has read its row.
    pub paused: Notify,
    /// Lets the paused `get` return.
    pub release: Notify,
}

impl ScriptedDocuments {
    pub fn new(inner: Arc<InMemoryDocumentRepository>) -> Self {
        Self {
            inner,
            pause_next_get: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_update_content: AtomicBool::new(false),
            paused: Notify::new(),
            release: Notify::new(),
        }
    }

    /// The next `get` holds its (by then stale) row until `release` fires.
    pub fn pause_next_get(&self) {
        self.pause_next_get.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentRepository for ScriptedDocuments {
    async fn create(&self, document: &SecureDocument) -> Result<(), AppError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::Internal("document store unavailable".to_string()));
        }
        self.inner.create(document).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<SecureDocument>, AppError> {
        let row = self.inner.get(id).await?;
        if self.pause_next_get.swap(false, Ordering::SeqCst) {
            self.paused.notify_one();
            self.release.notified().await;
        }
        Ok(row)
    }

    async fn update(&self, document: &SecureDocument) -> Result<(), AppError> {
        self.inner.update(document).await
    }

    async fn record_access(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        self.inner.record_access(id, at).await
    }

    async fn update_content(
        &self,
        id: Uuid,
        content_hash: &str,
        file_size: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.fail_update_content.load(Ordering::SeqCst) {
            return Err(AppError::Internal("document store unavailable".to_string()));
        }
        self.inner
            .update_content(id, content_hash, file_size, updated_at)
            .await
    }

    async fn update_safety_state(
        &self,
        id: Uuid,
        state: SafetyState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.inner.update_safety_state(id, state, updated_at).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.delete(id).await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<SecureDocument>, AppError> {
        self.inner.list_by_owner(owner_id).await
    }
}

/// Redaction record store whose storage is down.
pub struct FailingRedactionRecords;

#[async_trait]
impl RedactionRecordRepository for FailingRedactionRecords {
    async fn create(&self, _record: &RedactionRecord) -> Result<(), AppError> {
        Err(AppError::Internal("redaction records unavailable".to_string()))
    }

    async fn list_for_document(&self, _document_id: Uuid) -> Result<Vec<RedactionRecord>, AppError> {
        Ok(Vec::new())
    }
}
