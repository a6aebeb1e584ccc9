//! The secure document pipeline.
//!
//! Upload runs the envelope checks, the structural validator and the
//! reputation gate before anything is stored. Every read of stored bytes goes
//! through the access gate first. Permanent redaction runs under the
//! per-document lock and replaces stored bytes with a single storage write.

use chrono::Utc;
use docshield_core::models::{
    AccessPolicy, AccessType, ClientInfo, DocumentFormat, DocumentScanResult, PatternUsage,
    RedactionArea, RedactionRecord, RedactionStyle, SafetyState, SecureDocument, UploadRequest,
    VirusScanSummary,
};
use docshield_core::validation::{sanitize_filename, validate_input};
use docshield_core::AppError;
use docshield_db::{DocumentRepository, RedactionRecordRepository};
use docshield_infra::DocumentLocks;
use docshield_processing::{
    extract_text, PermanentRedaction, RedactionEngine, RedactionOutput, StructuralValidator,
    UploadValidator,
};
use docshield_storage::{document_key, Storage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::access::{hash_access_password, AccessCredential, AccessGate, AccessGrant};
use crate::redaction::{ContentScanner, RuleSelection, TextScanResult};
use crate::reputation::gate::sha256_hex;
use crate::reputation::ReputationGate;

/// Where the output of a permanent redaction goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    /// Replace the stored bytes of the source document
    #[default]
    InPlace,
    /// Store the output as a new document owned by the same user
    NewDocument,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedactRequest {
    pub areas: Vec<RedactionArea>,
    #[serde(default)]
    pub style: RedactionStyle,
    #[serde(default)]
    pub mode: RedactionMode,
    /// Pattern matches that led to these areas, kept as audit evidence
    #[serde(default)]
    pub patterns: Vec<PatternUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedactionOutcome {
    pub record: RedactionRecord,
    /// The rewritten source, or the new document in `NewDocument` mode
    pub document: SecureDocument,
    pub pages_flattened: Vec<u32>,
}

/// What a permanent redaction changed, kept until its record is written.
enum Applied {
    InPlace {
        previous: SecureDocument,
        current: SecureDocument,
    },
    NewDocument {
        derived: SecureDocument,
    },
}

impl Applied {
    fn document(&self) -> &SecureDocument {
        match self {
            Applied::InPlace { current, .. } => current,
            Applied::NewDocument { derived } => derived,
        }
    }

    fn into_document(self) -> SecureDocument {
        match self {
            Applied::InPlace { current, .. } => current,
            Applied::NewDocument { derived } => derived,
        }
    }
}

/// Stored bytes released after a granted access evaluation.
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub grant: AccessGrant,
    pub document: SecureDocument,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageScan {
    pub page: u32,
    pub result: TextScanResult,
}

/// Collaborators of the document service.
pub struct DocumentServiceParts {
    pub storage: Arc<dyn Storage>,
    pub documents: Arc<dyn DocumentRepository>,
    pub records: Arc<dyn RedactionRecordRepository>,
    pub gate: Arc<ReputationGate>,
    pub access: AccessGate,
    pub engine: Arc<RedactionEngine>,
    pub scanner: ContentScanner,
    pub uploads: UploadValidator,
}

pub struct SecureDocumentService {
    storage: Arc<dyn Storage>,
    documents: Arc<dyn DocumentRepository>,
    records: Arc<dyn RedactionRecordRepository>,
    gate: Arc<ReputationGate>,
    access: AccessGate,
    engine: Arc<RedactionEngine>,
    scanner: ContentScanner,
    uploads: UploadValidator,
    validator: StructuralValidator,
    locks: DocumentLocks,
}

impl SecureDocumentService {
    pub fn new(parts: DocumentServiceParts) -> Self {
        Self {
            storage: parts.storage,
            documents: parts.documents,
            records: parts.records,
            gate: parts.gate,
            access: parts.access,
            engine: parts.engine,
            scanner: parts.scanner,
            uploads: parts.uploads,
            validator: StructuralValidator::new(),
            locks: DocumentLocks::new(),
        }
    }

    pub fn access_gate(&self) -> &AccessGate {
        &self.access
    }

    pub fn locks(&self) -> &DocumentLocks {
        &self.locks
    }

    /// Validate, scan and register an upload.
    ///
    /// A document that fails any check is still recorded, in state `unsafe`,
    /// with its scan evidence. Its bytes are not stored.
    #[tracing::instrument(skip(self, request, data), fields(owner_id = %request.owner_id, size = data.len()))]
    pub async fn upload(
        &self,
        request: UploadRequest,
        data: Vec<u8>,
    ) -> Result<SecureDocument, AppError> {
        let start = Instant::now();
        validate_input(&request)?;
        self.uploads
            .validate_all(&request.filename, &request.content_type, data.len())?;
        let filename = sanitize_filename(&request.filename);

        let scan = self
            .gate
            .scan_declared(&data, &filename, &request.content_type)
            .await;
        let format = scan.validation.format;

        let access_password_hash = request
            .access_password
            .as_deref()
            .map(hash_access_password)
            .transpose()?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut document = SecureDocument {
            id,
            owner_id: request.owner_id,
            original_filename: filename,
            file_size: data.len() as i64,
            content_type: format.mime_type().to_string(),
            content_hash: scan.hash,
            storage_key: document_key(request.owner_id, id, format.extension()),
            safety_state: SafetyState::PendingScan,
            scan_result: None,
            policy: AccessPolicy {
                requires_mfa: request.requires_mfa,
                access_password_hash,
                is_encrypted: false,
                expires_at: request.expires_at,
            },
            page_count: None,
            access_count: 0,
            last_accessed_at: None,
            created_at: now,
            updated_at: now,
        };
        document.apply_scan_result(DocumentScanResult {
            validation: scan.validation,
            virus_scan: scan.virus_scan,
            gate_safe: scan.safe,
        })?;

        let stored = document.safety_state == SafetyState::Safe;
        if stored {
            self.storage
                .put(&document.storage_key, data, &document.content_type)
                .await?;
        }

        if let Err(e) = self.documents.create(&document).await {
            if stored {
                if let Err(cleanup) = self.storage.delete(&document.storage_key).await {
                    tracing::warn!(
                        storage_key = %document.storage_key,
                        error = %cleanup,
                        "Failed to remove bytes of unrecorded document"
                    );
                }
            }
            return Err(e);
        }

        if stored {
            tracing::info!(
                document_id = %document.id,
                format = %format,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Document accepted"
            );
        } else {
            tracing::warn!(
                document_id = %document.id,
                message = %scan.message,
                "Document rejected by upload checks"
            );
        }
        Ok(document)
    }

    /// Document metadata without its bytes.
    pub async fn get(&self, document_id: Uuid) -> Result<SecureDocument, AppError> {
        self.documents
            .get(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {}", document_id)))
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<SecureDocument>, AppError> {
        self.documents.list_by_owner(owner_id).await
    }

    /// Release stored bytes after a granted `download` evaluation.
    #[tracing::instrument(skip(self, credential, client))]
    pub async fn read(
        &self,
        document_id: Uuid,
        actor_id: Uuid,
        credential: &AccessCredential,
        client: &ClientInfo,
    ) -> Result<DocumentContent, AppError> {
        let grant = self
            .access
            .evaluate(document_id, actor_id, credential, AccessType::Download, client)
            .await?;
        let document = self.get(document_id).await?;
        let bytes = self.storage.get(&document.storage_key).await?;
        Ok(DocumentContent {
            grant,
            document,
            bytes,
        })
    }

    /// Run the content scanner over the text of every page.
    #[tracing::instrument(skip(self, credential, selection, client))]
    pub async fn scan_text(
        &self,
        document_id: Uuid,
        actor_id: Uuid,
        credential: &AccessCredential,
        selection: &RuleSelection,
        client: &ClientInfo,
    ) -> Result<Vec<PageScan>, AppError> {
        self.access
            .evaluate(document_id, actor_id, credential, AccessType::View, client)
            .await?;
        let document = self.get(document_id).await?;
        if DocumentFormat::from_mime(&document.content_type) != DocumentFormat::Pdf {
            return Err(AppError::UnsupportedFormat(
                "Text can only be scanned in PDF documents".to_string(),
            ));
        }
        let bytes = self.storage.get(&document.storage_key).await?;

        extract_text(&bytes)?
            .into_iter()
            .map(|page| {
                Ok(PageScan {
                    page: page.page,
                    result: self.scanner.scan(&page.text, selection)?,
                })
            })
            .collect()
    }

    /// Overlay boxes on a copy of the stored document. Nothing is persisted.
    #[tracing::instrument(skip(self, credential, areas, style, client))]
    pub async fn preview(
        &self,
        document_id: Uuid,
        actor_id: Uuid,
        credential: &AccessCredential,
        areas: &[RedactionArea],
        style: &RedactionStyle,
        client: &ClientInfo,
    ) -> Result<RedactionOutput, AppError> {
        self.access
            .evaluate(
                document_id,
                actor_id,
                credential,
                AccessType::PreviewRedaction,
                client,
            )
            .await?;
        let document = self.get(document_id).await?;
        let bytes = self.storage.get(&document.storage_key).await?;
        self.engine.preview(&bytes, areas, style)
    }

    /// Permanently redact a stored document.
    ///
    /// The stored bytes change with exactly one storage write, after the
    /// output is complete. Any failure before that leaves them untouched. If
    /// the row or the redaction record cannot be written afterwards, the
    /// previous bytes and row are put back before the error is returned.
    #[tracing::instrument(skip(self, credential, request, client), fields(areas = request.areas.len(), mode = ?request.mode))]
    pub async fn redact(
        &self,
        document_id: Uuid,
        actor_id: Uuid,
        credential: &AccessCredential,
        request: RedactRequest,
        client: &ClientInfo,
    ) -> Result<RedactionOutcome, AppError> {
        let start = Instant::now();
        self.access
            .evaluate(
                document_id,
                actor_id,
                credential,
                AccessType::ApplyRedaction,
                client,
            )
            .await?;

        let _guard = self.locks.try_acquire(document_id)?;
        let source = self.get(document_id).await?;
        let original = self.storage.get(&source.storage_key).await?;

        let permanent = self
            .engine
            .apply_permanent(&original, &request.areas, &request.style)
            .await?
            .into_permanent()
            .ok_or_else(|| AppError::Internal("Redaction engine returned a preview".to_string()))?;
        let redaction_count = permanent.redaction_count;
        let pages_flattened = permanent.pages_flattened.clone();

        let now = Utc::now();
        let applied = match request.mode {
            RedactionMode::InPlace => {
                let mut current = source.clone();
                current.content_hash = sha256_hex(&permanent.bytes);
                current.file_size = permanent.bytes.len() as i64;
                current.updated_at = now;
                Applied::InPlace {
                    previous: source,
                    current,
                }
            }
            RedactionMode::NewDocument => Applied::NewDocument {
                derived: self.derived_document(&source, &permanent)?,
            },
        };

        self.storage
            .put(
                &applied.document().storage_key,
                permanent.bytes,
                permanent.format.mime_type(),
            )
            .await?;

        if let Err(e) = self.write_row(&applied).await {
            self.roll_back(&applied, original, false).await;
            return Err(e);
        }

        let result_document_id = match &applied {
            Applied::InPlace { .. } => None,
            Applied::NewDocument { derived } => Some(derived.id),
        };
        let record = RedactionRecord {
            id: Uuid::new_v4(),
            source_document_id: document_id,
            result_document_id,
            actor_id,
            areas: request.areas,
            patterns: request.patterns,
            is_permanent: true,
            redaction_count,
            created_at: now,
        };
        if let Err(e) = self.records.create(&record).await {
            self.roll_back(&applied, original, true).await;
            return Err(e);
        }

        tracing::info!(
            document_id = %document_id,
            result_document_id = ?result_document_id,
            redaction_count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Permanent redaction applied"
        );

        Ok(RedactionOutcome {
            record,
            document: applied.into_document(),
            pages_flattened,
        })
    }

    async fn write_row(&self, applied: &Applied) -> Result<(), AppError> {
        match applied {
            Applied::InPlace { current, .. } => {
                self.documents
                    .update_content(
                        current.id,
                        &current.content_hash,
                        current.file_size,
                        current.updated_at,
                    )
                    .await
            }
            Applied::NewDocument { derived } => self.documents.create(derived).await,
        }
    }

    /// Undo a redaction whose bytes were stored but whose bookkeeping failed.
    /// Failures here are logged; the caller returns the original error.
    async fn roll_back(&self, applied: &Applied, original: Vec<u8>, row_written: bool) {
        match applied {
            Applied::InPlace { previous, .. } => {
                if let Err(e) = self
                    .storage
                    .put(&previous.storage_key, original, &previous.content_type)
                    .await
                {
                    tracing::error!(
                        document_id = %previous.id,
                        error = %e,
                        "Failed to restore document bytes after redaction failure"
                    );
                }
                if row_written {
                    if let Err(e) = self
                        .documents
                        .update_content(
                            previous.id,
                            &previous.content_hash,
                            previous.file_size,
                            previous.updated_at,
                        )
                        .await
                    {
                        tracing::error!(
                            document_id = %previous.id,
                            error = %e,
                            "Failed to restore document row after redaction failure"
                        );
                    }
                }
            }
            Applied::NewDocument { derived } => {
                if row_written {
                    if let Err(e) = self.documents.delete(derived.id).await {
                        tracing::error!(
                            document_id = %derived.id,
                            error = %e,
                            "Failed to remove row of unrecorded redaction output"
                        );
                    }
                }
                if let Err(e) = self.storage.delete(&derived.storage_key).await {
                    tracing::warn!(
                        storage_key = %derived.storage_key,
                        error = %e,
                        "Failed to remove bytes of unrecorded redaction output"
                    );
                }
            }
        }
    }

    pub async fn redaction_history(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<RedactionRecord>, AppError> {
        self.records.list_for_document(document_id).await
    }

    /// Administrative: move an `unsafe` document to `quarantined`.
    #[tracing::instrument(skip(self))]
    pub async fn quarantine(&self, document_id: Uuid) -> Result<SecureDocument, AppError> {
        let _guard = self.locks.try_acquire(document_id)?;
        let mut document = self.get(document_id).await?;
        document.quarantine()?;
        self.documents
            .update_safety_state(document_id, document.safety_state, document.updated_at)
            .await?;
        tracing::warn!(document_id = %document_id, "Document quarantined");
        Ok(document)
    }

    /// Metadata for the output of a `NewDocument` redaction. The output is
    /// produced here rather than uploaded, so only the structural validator
    /// runs on it.
    fn derived_document(
        &self,
        source: &SecureDocument,
        permanent: &PermanentRedaction,
    ) -> Result<SecureDocument, AppError> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut document = SecureDocument {
            id,
            owner_id: source.owner_id,
            original_filename: format!("redacted_{}", source.original_filename),
            file_size: permanent.bytes.len() as i64,
            content_type: permanent.format.mime_type().to_string(),
            content_hash: sha256_hex(&permanent.bytes),
            storage_key: document_key(source.owner_id, id, permanent.format.extension()),
            safety_state: SafetyState::PendingScan,
            scan_result: None,
            policy: source.policy.clone(),
            page_count: None,
            access_count: 0,
            last_accessed_at: None,
            created_at: now,
            updated_at: now,
        };
        document.apply_scan_result(DocumentScanResult {
            validation: self.validator.validate(&permanent.bytes),
            virus_scan: VirusScanSummary {
                scanned: false,
                safe: true,
                message: format!("Derived from document {}", source.id),
            },
            gate_safe: true,
        })?;
        Ok(document)
    }
}
