//! Guest-book orchestration: the two-store pipelines behind every route.

pub mod service;

pub use service::{BatchDeleteReport, GuestbookService, StoredEntry};
