use std::sync::atomic::{AtomicU64, Ordering};

/// Allocator for worker / session / connection ids.
///
/// Strictly increasing, never reused for the lifetime of the process, safe
/// under unbounded concurrent callers. Zero is never handed out.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Fixed-width display form of an id, used in log lines and filenames.
pub fn sprint_id(id: u64) -> String {
    format!("{:016x}", id)
}
