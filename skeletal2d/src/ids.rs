use std::sync::atomic::{AtomicU32, Ordering};

// Process-global counters. Deform and sequence timelines match attachments by these ids, so two
// attachments built independently never alias.
static NEXT_VERTEX_ATTACHMENT_ID: AtomicU32 = AtomicU32::new(1);
static NEXT_SEQUENCE_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_vertex_attachment_id() -> u32 {
    NEXT_VERTEX_ATTACHMENT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn next_sequence_id() -> u32 {
    NEXT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed)
}
