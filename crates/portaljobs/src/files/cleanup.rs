//! Age-based removal of generated files.

use std::path::Path;
use std::time::{Duration, SystemTime};

/// Deletes regular files in `dir` last modified more than `max_age` ago.
///
/// A missing directory counts as nothing to remove.
pub async fn remove_older_than(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };
        let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        if modified < cutoff {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }
    }

    Ok(removed)
}
