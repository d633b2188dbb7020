use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

// Prometheus metrics (default registry)
pub static ENTRIES_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "guestbook_entries_created_total",
        "Entries stored after a successful signature upload"
    )
    .expect("register entries_created_total")
});

pub static ENTRIES_DELETED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "guestbook_entries_deleted_total",
        "Entry records deleted, single and batch"
    )
    .expect("register entries_deleted_total")
});

pub static BATCH_ITEMS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "guestbook_batch_delete_items_total",
        "Ids processed by batch delete"
    )
    .expect("register batch_delete_items_total")
});

pub static MEDIA_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "guestbook_media_failures_total",
        "Failed media store calls"
    )
    .expect("register media_failures_total")
});

pub static AUTH_REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "guestbook_auth_rejected_total",
        "Requests rejected by the bearer token gate"
    )
    .expect("register auth_rejected_total")
});

/// Force registration so `/metrics` lists every counter from the first scrape.
pub fn register_all() {
    Lazy::force(&ENTRIES_CREATED_TOTAL);
    Lazy::force(&ENTRIES_DELETED_TOTAL);
    Lazy::force(&BATCH_ITEMS_TOTAL);
    Lazy::force(&MEDIA_FAILURES_TOTAL);
    Lazy::force(&AUTH_REJECTED_TOTAL);
}
