use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// One visitor record as stored in the document database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub id: String,
    pub name: String,
    pub address_or_license: String,
    pub date_and_time: DateTime<Utc>,
    pub signature_file_id: String,
}

impl BookEntry {
    /// Oldest first; ties broken by id so the order is stable across pages.
    pub fn sort_chronologically(entries: &mut [BookEntry]) {
        entries.sort_by(|a, b| {
            a.date_and_time
                .cmp(&b.date_and_time)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

/// Record fields written on create; the store assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBookEntry {
    pub name: String,
    pub address_or_license: String,
    pub date_and_time: DateTime<Utc>,
    pub signature_file_id: String,
}

impl NewBookEntry {
    pub fn with_id(self, id: impl Into<String>) -> BookEntry {
        BookEntry {
            id: id.into(),
            name: self.name,
            address_or_license: self.address_or_license,
            date_and_time: self.date_and_time,
            signature_file_id: self.signature_file_id,
        }
    }
}

/// Uploaded signature image as received from the client.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

impl SignatureFile {
    pub fn mime(&self) -> &str {
        self.content_type.as_deref().unwrap_or("application/octet-stream")
    }

    pub fn len(&self) -> usize { self.bytes.len() }

    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }
}

/// Raw form of a create request; every part may be missing.
#[derive(Clone, Debug, Default)]
pub struct EntrySubmission {
    pub file: Option<SignatureFile>,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// A submission whose file and text fields are all present.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidSubmission {
    pub file: SignatureFile,
    pub name: String,
    pub address_or_license: String,
}

impl EntrySubmission {
    /// The file is checked before the text fields; an empty file part counts
    /// as no file. Text fields are trimmed.
    pub fn validate(self) -> Result<ValidSubmission, ModelError> {
        let file = match self.file {
            Some(f) if !f.is_empty() => f,
            _ => return Err(ModelError::MissingFile),
        };
        let name = non_blank(self.name);
        let address = non_blank(self.address);
        match (name, address) {
            (Some(name), Some(address_or_license)) => Ok(ValidSubmission { file, name, address_or_license }),
            _ => Err(ModelError::MissingFields),
        }
    }
}

impl ValidSubmission {
    /// Split into the bytes to upload and a builder for the record that must
    /// wait for the upload's media id.
    pub fn into_parts(self) -> (SignatureFile, PendingRecord) {
        (
            self.file,
            PendingRecord { name: self.name, address_or_license: self.address_or_license },
        )
    }
}

/// Text half of a submission, held while the signature upload runs.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRecord {
    pub name: String,
    pub address_or_license: String,
}

impl PendingRecord {
    pub fn complete(self, signature_file_id: impl Into<String>, now: DateTime<Utc>) -> NewBookEntry {
        NewBookEntry {
            name: self.name,
            address_or_license: self.address_or_license,
            date_and_time: now,
            signature_file_id: signature_file_id.into(),
        }
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
