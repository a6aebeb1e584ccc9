//! Per-document mutation locks
//!
//! Mutating operations on one document (permanent redaction, quarantine,
//! policy changes) are serialized. A second mutation that arrives while one is
//! running fails fast with `AppError::Conflict` instead of queueing.

use docshield_core::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Registry of one async mutex per document id.
#[derive(Clone, Default)]
pub struct DocumentLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of a mutation; dropping it frees the document.
pub struct DocumentGuard {
    document_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl DocumentGuard {
    pub fn document_id(&self) -> Uuid {
        self.document_id
    }
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the mutation lock for `document_id` without waiting.
    pub fn try_acquire(&self, document_id: Uuid) -> Result<DocumentGuard, AppError> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only referenced by the map are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(document_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        match lock.try_lock_owned() {
            Ok(guard) => Ok(DocumentGuard {
                document_id,
                _guard: guard,
            }),
            Err(_) => {
                tracing::warn!(document_id = %document_id, "Concurrent mutation rejected");
                Err(AppError::Conflict(format!(
                    "Document {} is being modified by another operation",
                    document_id
                )))
            }
        }
    }

    /// Number of documents currently tracked (held or just released)
    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_conflicts() {
        let locks = DocumentLocks::new();
        let id = Uuid::new_v4();

        let guard = locks.try_acquire(id).unwrap();
        assert_eq!(guard.document_id(), id);
        assert!(matches!(locks.try_acquire(id), Err(AppError::Conflict(_))));

        // other documents are unaffected
        assert!(locks.try_acquire(Uuid::new_v4()).is_ok());

        drop(guard);
        assert!(locks.try_acquire(id).is_ok());
    }

    #[test]
    fn test_released_locks_are_pruned() {
        let locks = DocumentLocks::new();
        for _ in 0..10 {
            let _guard = locks.try_acquire(Uuid::new_v4()).unwrap();
        }
        let _held = locks.try_acquire(Uuid::new_v4()).unwrap();
        assert!(locks.tracked() <= 2);
    }
}
