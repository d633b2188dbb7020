use std::sync::Arc;

use chrono::Utc;
use models::{BookEntry, EntrySubmission};
use tracing::{error, info, instrument, warn};

use crate::documents::{DocumentError, DocumentStore};
use crate::errors::ServiceError;
use crate::media::{DestroyOutcome, MediaStore, UploadedMedia};
use crate::pagination::{Page, Pagination};

/// Outcome of a successful create: the uploaded image and the record that
/// points at it.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEntry {
    pub entry: BookEntry,
    pub media: UploadedMedia,
}

/// Per-id outcome of a batch delete. An id whose media destroy failed but
/// whose record was removed shows up in both `deleted` and `media_failures`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchDeleteReport {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
    pub media_failures: Vec<String>,
    pub record_failures: Vec<String>,
}

impl BatchDeleteReport {
    pub fn processed(&self) -> usize {
        self.deleted.len() + self.missing.len() + self.record_failures.len()
    }
}

/// Guest-book operations over a media store and a document store.
///
/// Neither store participates in a transaction; create and delete are
/// sequenced so that a record never points at media that was never uploaded.
pub struct GuestbookService {
    media: Arc<dyn MediaStore>,
    documents: Arc<dyn DocumentStore>,
}

impl GuestbookService {
    pub fn new(media: Arc<dyn MediaStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { media, documents }
    }

    /// Validate, upload the signature, then write the record.
    ///
    /// A record failure leaves the uploaded image in place; it is logged with
    /// its public id and not cleaned up.
    #[instrument(skip(self, submission))]
    pub async fn create_entry(&self, submission: EntrySubmission) -> Result<StoredEntry, ServiceError> {
        let (file, pending) = submission.validate()?.into_parts();

        let media = self.media.upload(&file).await.map_err(|e| {
            error!(error = %e, "signature upload failed");
            ServiceError::MediaUpload(e)
        })?;

        let record = pending.complete(media.public_id.clone(), Utc::now());
        match self.documents.create(&record).await {
            Ok(entry) => {
                info!(entry_id = %entry.id, public_id = %media.public_id, event = "entry_created", "entry saved");
                Ok(StoredEntry { entry, media })
            }
            Err(e) => {
                error!(public_id = %media.public_id, error = %e, event = "orphaned_media", "record write failed after upload");
                Err(e.into())
            }
        }
    }

    /// Destroy the signature, then the record. A media failure leaves the
    /// record untouched.
    #[instrument(skip(self))]
    pub async fn delete_entry(&self, id: &str) -> Result<(), ServiceError> {
        let entry = self.lookup(id).await?.ok_or_else(|| ServiceError::not_found("entry"))?;

        let outcome = self
            .media
            .destroy(&entry.signature_file_id)
            .await
            .map_err(|source| ServiceError::MediaDelete { public_id: entry.signature_file_id.clone(), source })?;
        if outcome == DestroyOutcome::NotFound {
            warn!(public_id = %entry.signature_file_id, "signature already gone from media store");
        }

        self.documents.delete(id).await?;
        info!(entry_id = %id, public_id = %entry.signature_file_id, event = "entry_deleted", "entry deleted");
        Ok(())
    }

    /// Delete every listed entry independently and in order. Failures are
    /// logged and recorded in the report; nothing aborts the loop, and the
    /// record delete is attempted even when the media destroy failed.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_entries(&self, ids: &[String]) -> BatchDeleteReport {
        let mut report = BatchDeleteReport::default();
        for id in ids {
            let entry = match self.lookup(id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    warn!(entry_id = %id, "entry not found, skipping");
                    report.missing.push(id.clone());
                    continue;
                }
                Err(e) => {
                    error!(entry_id = %id, error = %e, "entry lookup failed");
                    report.record_failures.push(id.clone());
                    continue;
                }
            };

            if let Err(e) = self.media.destroy(&entry.signature_file_id).await {
                error!(entry_id = %id, public_id = %entry.signature_file_id, error = %e, "signature delete failed");
                report.media_failures.push(id.clone());
            }

            match self.documents.delete(id).await {
                Ok(()) => report.deleted.push(id.clone()),
                Err(e) => {
                    error!(entry_id = %id, error = %e, "record delete failed");
                    report.record_failures.push(id.clone());
                }
            }
        }
        info!(
            deleted = report.deleted.len(),
            missing = report.missing.len(),
            media_failures = report.media_failures.len(),
            record_failures = report.record_failures.len(),
            event = "batch_delete_finished",
            "batch delete finished"
        );
        report
    }

    /// Signed delivery URL valid from now.
    pub fn signed_url(&self, public_id: &str) -> Result<String, ServiceError> {
        self.signed_url_at(public_id, Utc::now().timestamp())
    }

    pub fn signed_url_at(&self, public_id: &str, timestamp: i64) -> Result<String, ServiceError> {
        self.media.signed_url(public_id, timestamp).map_err(ServiceError::SignedUrl)
    }

    /// All entries, oldest first, cut to one page.
    #[instrument(skip(self))]
    pub async fn list_entries(&self, pagination: Pagination) -> Result<Page<BookEntry>, ServiceError> {
        let mut entries = self.documents.list().await?;
        BookEntry::sort_chronologically(&mut entries);
        Ok(pagination.apply(entries))
    }

    #[instrument(skip(self))]
    pub async fn get_entry(&self, id: &str) -> Result<BookEntry, ServiceError> {
        self.lookup(id).await?.ok_or_else(|| ServiceError::not_found("entry"))
    }

    /// An id the store cannot address is treated as absent.
    async fn lookup(&self, id: &str) -> Result<Option<BookEntry>, DocumentError> {
        match self.documents.get(id).await {
            Err(DocumentError::InvalidId(_)) => Ok(None),
            other => other,
        }
    }
}
