//! Small identifier helpers shared by the naming, factory and connector
//! layers. None of these need to be globally unique across processes —
//! only unique within the Manager that minted them — so a process-local
//! atomic counter is enough; no UUID dependency is pulled in for it.

use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// A monotonically increasing, process-unique identifier rendered with a
/// caller-chosen prefix (e.g. `"conn-7"`, `"ec-3"`).
pub fn next_id(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{n}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = next_id("conn");
        let b = next_id("conn");
        assert_ne!(a, b);
        assert!(a.starts_with("conn-"));
    }
}
