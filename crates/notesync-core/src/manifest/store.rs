//! Manifest persistence

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{ManifestError, SyncManifest};

/// Durable storage for a client's [`SyncManifest`]
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Load the persisted manifest, or the default one when nothing was saved yet
    ///
    /// Unreadable or invalid content is reported as [`ManifestError::Corrupt`].
    async fn load(&self) -> Result<SyncManifest, ManifestError>;

    /// Replace the persisted manifest. Durable once this returns.
    async fn save(&self, manifest: &SyncManifest) -> Result<(), ManifestError>;
}

fn parse_manifest(raw: &str) -> Result<SyncManifest, ManifestError> {
    let manifest: SyncManifest =
        serde_json::from_str(raw).map_err(|error| ManifestError::Corrupt(error.to_string()))?;
    manifest.validate()?;
    Ok(manifest)
}

/// Manifest stored as a JSON file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct FileManifestStore {
    path: PathBuf,
}

impl FileManifestStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the manifest file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "manifest.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ManifestStore for FileManifestStore {
    async fn load(&self) -> Result<SyncManifest, ManifestError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No manifest at {}; starting fresh", self.path.display());
                return Ok(SyncManifest::default());
            }
            Err(error) => return Err(error.into()),
        };

        parse_manifest(&raw)
    }

    async fn save(&self, manifest: &SyncManifest) -> Result<(), ManifestError> {
        let payload = serde_json::to_vec_pretty(manifest)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&payload).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;
        tracing::debug!(
            "Saved manifest at revision {} to {}",
            manifest.last_synced_revision,
            self.path.display()
        );
        Ok(())
    }
}

/// In-memory manifest store holding the serialized JSON
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryManifestStore {
    raw: Arc<Mutex<Option<String>>>,
}

impl MemoryManifestStore {
    /// Empty store; `load` returns the default manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with an arbitrary payload, valid or not
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    /// Currently stored payload
    pub fn raw(&self) -> Option<String> {
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ManifestStore for MemoryManifestStore {
    async fn load(&self) -> Result<SyncManifest, ManifestError> {
        match self.raw() {
            Some(raw) => parse_manifest(&raw),
            None => Ok(SyncManifest::default()),
        }
    }

    async fn save(&self, manifest: &SyncManifest) -> Result<(), ManifestError> {
        let payload = serde_json::to_string(manifest)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload);
        Ok(())
    }
}
