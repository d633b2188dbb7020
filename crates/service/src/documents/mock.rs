//! In-memory document store for tests and local wiring.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use models::{BookEntry, NewBookEntry};

use super::{validate_document_id, DocumentError, DocumentStore};
use crate::journal::{Call, CallJournal};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: Mutex<BTreeMap<String, BookEntry>>,
    fail_creates: Mutex<bool>,
    fail_gets: Mutex<HashSet<String>>,
    fail_deletes: Mutex<HashSet<String>>,
    journal: CallJournal,
}

impl InMemoryDocumentStore {
    pub fn new(journal: CallJournal) -> Self {
        Self { journal, ..Default::default() }
    }

    pub fn fail_creates(&self, fail: bool) {
        *self.fail_creates.lock().unwrap() = fail;
    }

    pub fn fail_get_for(&self, id: &str) {
        self.fail_gets.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_delete_for(&self, id: &str) {
        self.fail_deletes.lock().unwrap().insert(id.to_string());
    }

    /// Insert a record directly, bypassing the journal.
    pub fn seed(&self, entry: BookEntry) {
        self.docs.lock().unwrap().insert(entry.id.clone(), entry);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.lock().unwrap().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, entry: &NewBookEntry) -> Result<BookEntry, DocumentError> {
        if *self.fail_creates.lock().unwrap() {
            return Err(DocumentError::Upstream { status: 503, message: "injected create failure".into() });
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.journal.record(Call::DocCreate(id.clone()));
        let stored = entry.clone().with_id(id.clone());
        self.docs.lock().unwrap().insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<BookEntry>, DocumentError> {
        validate_document_id(id)?;
        self.journal.record(Call::DocGet(id.to_string()));
        if self.fail_gets.lock().unwrap().contains(id) {
            return Err(DocumentError::Transport("injected get failure".into()));
        }
        Ok(self.docs.lock().unwrap().get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), DocumentError> {
        validate_document_id(id)?;
        self.journal.record(Call::DocDelete(id.to_string()));
        if self.fail_deletes.lock().unwrap().contains(id) {
            return Err(DocumentError::Transport("injected delete failure".into()));
        }
        self.docs.lock().unwrap().remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BookEntry>, DocumentError> {
        self.journal.record(Call::DocList);
        Ok(self.docs.lock().unwrap().values().cloned().collect())
    }
}
