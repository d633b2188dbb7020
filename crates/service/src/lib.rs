//! Service layer of the guest book.
//! - Collaborator traits (`MediaStore`, `DocumentStore`, `IdentityVerifier`)
//!   with remote and in-memory implementations.
//! - `GuestbookService` sequencing the two stores for every operation.
//! - Clear error types; no HTTP concerns.

pub mod errors;
pub mod documents;
pub mod google;
pub mod guestbook;
pub mod http;
pub mod identity;
pub mod journal;
pub mod media;
pub mod pagination;
pub mod runtime;

pub use errors::ServiceError;
pub use guestbook::{BatchDeleteReport, GuestbookService, StoredEntry};
