//! Shared helpers for `wallet-keeper-core` unit tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

static SCRATCH_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Create a fresh, empty directory under the system temp dir.
///
/// Names combine the caller's label, the process id and a counter so that
/// parallel tests never share a directory. Callers remove it when done.
pub fn scratch_dir(label: &str) -> PathBuf {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "wallet-keeper-{label}-{}-{n}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("scratch dir must be creatable");
    dir
}
