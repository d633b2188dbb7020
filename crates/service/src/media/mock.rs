//! In-memory media store for tests and local wiring.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use models::SignatureFile;

use super::signing::signed_delivery_url;
use super::{DestroyOutcome, MediaError, MediaStore, UploadedMedia};
use crate::journal::{Call, CallJournal};

#[derive(Default)]
pub struct InMemoryMediaStore {
    objects: Mutex<HashMap<String, SignatureFile>>,
    next_id: Mutex<u64>,
    fail_uploads: Mutex<bool>,
    fail_destroy: Mutex<HashSet<String>>,
    journal: CallJournal,
}

impl InMemoryMediaStore {
    pub fn new(journal: CallJournal) -> Self {
        Self { journal, ..Default::default() }
    }

    /// Make every following upload fail with an upstream error.
    pub fn fail_uploads(&self, fail: bool) {
        *self.fail_uploads.lock().unwrap() = fail;
    }

    /// Make destroy fail for this public id.
    pub fn fail_destroy_for(&self, public_id: &str) {
        self.fail_destroy.lock().unwrap().insert(public_id.to_string());
    }

    /// Place an object directly, bypassing the journal.
    pub fn seed(&self, public_id: &str) {
        let file = SignatureFile { bytes: vec![0], content_type: Some("image/png".into()), filename: None };
        self.objects.lock().unwrap().insert(public_id.to_string(), file);
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(public_id)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn upload(&self, file: &SignatureFile) -> Result<UploadedMedia, MediaError> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(MediaError::Upstream { status: 500, message: "injected upload failure".into() });
        }
        let public_id = {
            let mut n = self.next_id.lock().unwrap();
            *n += 1;
            format!("signatures/sig{:04}", *n)
        };
        self.journal.record(Call::MediaUpload(public_id.clone()));
        self.objects.lock().unwrap().insert(public_id.clone(), file.clone());
        Ok(UploadedMedia {
            public_id,
            version: Some(1),
            secure_url: None,
            bytes: Some(file.len() as u64),
            format: None,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<DestroyOutcome, MediaError> {
        self.journal.record(Call::MediaDestroy(public_id.to_string()));
        if self.fail_destroy.lock().unwrap().contains(public_id) {
            return Err(MediaError::Transport("injected destroy failure".into()));
        }
        match self.objects.lock().unwrap().remove(public_id) {
            Some(_) => Ok(DestroyOutcome::Deleted),
            None => Ok(DestroyOutcome::NotFound),
        }
    }

    fn signed_url(&self, public_id: &str, timestamp: i64) -> Result<String, MediaError> {
        signed_delivery_url("https://media.test", "test-cloud", public_id, timestamp, "test-secret")
    }
}
