//! Domain types of the guest book: the stored entry and the validated
//! submission that precedes it.

pub mod errors;
pub mod book_entry;

pub use book_entry::{BookEntry, EntrySubmission, NewBookEntry, PendingRecord, SignatureFile, ValidSubmission};
pub use errors::ModelError;
