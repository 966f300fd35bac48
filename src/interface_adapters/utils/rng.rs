use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-unique id for connections and sessions.
///
/// Seeded from the wall clock once, then strictly increasing, so ids never
/// repeat within a process and rarely repeat across restarts.
pub fn rand_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    COUNTER
        .get_or_init(|| {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64;
            AtomicU64::new(seed)
        })
        .fetch_add(1, Ordering::Relaxed)
}
