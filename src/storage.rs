//! Upload storage collaborator.
//!
//! The lifecycle never touches files; only the upload glue around it does,
//! through this trait. The default implementation writes to a local uploads
//! directory, which is what the deployment target uses.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    /// Stores the bytes under `subfolder` and returns the reference to keep
    /// in the database (`subfolder/filename`).
    async fn save(&self, bytes: Vec<u8>, subfolder: &str, original_name: &str) -> Result<String>;

    async fn delete(&self, reference: &str) -> Result<()>;
}

pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }
}

fn extension_of(original_name: &str) -> &str {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin")
}

#[async_trait]
impl FileStore for DiskStore {
    async fn save(&self, bytes: Vec<u8>, subfolder: &str, original_name: &str) -> Result<String> {
        let filename = format!("{}.{}", Uuid::new_v4(), extension_of(original_name));
        let dir = self.root.join(subfolder);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create upload dir {}", dir.display()))?;
        let path = dir.join(&filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write upload {}", path.display()))?;
        Ok(format!("{subfolder}/{filename}"))
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        let path = self.resolve(reference);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to delete {}", path.display())),
        }
    }
}

/// Removes a stored file without letting a storage failure surface to the
/// caller; orphaned files are preferable to failed mutations.
pub async fn delete_best_effort(store: &dyn FileStore, reference: &str) {
    if let Err(err) = store.delete(reference).await {
        warn!(reference, error = %err, "failed to remove stored file");
    }
}
