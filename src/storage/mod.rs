//! Persistence for the "last seen" state and the generated feed.
//!
//! ## Files
//!
//! ```text
//! {working dir}/
//! ├── ema_monitor_state.json   # product name → last seen signature
//! └── ema_updates.xml          # regenerated RSS feed
//! ```
//!
//! Both files are replaced with a temp-file-then-rename so an interrupted
//! run never leaves a half-written file behind.

pub mod local;
pub mod memory;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

// Re-export for convenience
pub use local::JsonStateStore;
pub use memory::MemoryStateStore;

/// Product name → signature of the last update seen for it.
pub type StateMap = BTreeMap<String, String>;

/// Trait for "last seen" state backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the full mapping. A missing or unreadable backing store is empty state.
    async fn load(&self) -> Result<StateMap>;

    /// Replace the stored mapping with `state`.
    async fn save(&self, state: &StateMap) -> Result<()>;
}

/// Write bytes atomically (write to temp, then rename).
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/feed.xml");

        write_atomic(&path, b"first version, longer").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!tmp.path().join("out/feed.xml.tmp").exists());
    }
}
