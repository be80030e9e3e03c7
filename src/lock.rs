//! Process-level exclusive lock on the data root.
//!
//! At most one mutating command touches sessions and reports at any time.
//! The lock is released when the guard is dropped.

use crate::config::Config;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Name of the lock file under the data root.
const LOCK_FILE_NAME: &str = ".ptwctl.lock";

/// Backoff between try_lock attempts.
const POLL_INTERVAL_MS: u64 = 100;

/// Guard that holds the exclusive lock; releasing on drop.
pub struct DataLockGuard {
    _file: std::fs::File,
}

/// Acquires an exclusive lock on the data root, waiting up to the configured
/// timeout.
pub fn acquire_data_lock(config: &Config) -> Result<DataLockGuard> {
    lock_dir(
        &config.paths.data_root,
        Duration::from_secs(config.concurrency.lock_timeout_secs),
    )
}

fn lock_dir(data_root: &Path, timeout: Duration) -> Result<DataLockGuard> {
    if !data_root.exists() {
        anyhow::bail!(
            "Data root does not exist: {}. Run 'ptwctl init' first.",
            data_root.display()
        );
    }

    let lock_path = data_root.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

    let deadline = Instant::now() + timeout;
    let poll = Duration::from_millis(POLL_INTERVAL_MS);

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                return Ok(DataLockGuard { _file: file });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    anyhow::bail!(
                        "Another ptwctl command is writing to {}. \
                         Wait for it to finish or retry later. \
                         (Timed out after {} seconds waiting for exclusive access.)",
                        data_root.display(),
                        timeout.as_secs()
                    );
                }
                thread::sleep(poll);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to acquire lock: {}", lock_path.display()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_root_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = lock_dir(&temp.path().join("ptw"), Duration::ZERO)
            .err()
            .unwrap();
        assert!(err.to_string().contains("ptwctl init"));
    }

    #[test]
    fn second_holder_times_out() {
        let temp = tempfile::TempDir::new().unwrap();
        let _held = lock_dir(temp.path(), Duration::ZERO).unwrap();
        let err = lock_dir(temp.path(), Duration::ZERO).err().unwrap();
        assert!(err.to_string().contains("Timed out"));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let temp = tempfile::TempDir::new().unwrap();
        drop(lock_dir(temp.path(), Duration::ZERO).unwrap());
        assert!(lock_dir(temp.path(), Duration::ZERO).is_ok());
        assert!(temp.path().join(LOCK_FILE_NAME).exists());
    }
}
