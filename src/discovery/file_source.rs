//! Async file-based discovery source with SHA256 change detection.
//!
//! [`FileSource`] reads a targets document (YAML or JSON, chosen by file
//! extension), resolves it into addresses and versions it by content hash.
//! An external watcher (a sidecar dumping `kubectl get endpoints -o json`,
//! a config-management agent, ...) keeps the file current.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::endpoints::TargetsDocument;
use super::{sha256_hex, DiscoverySource, SnapshotVersion};
use crate::config::DiscoverySettings;
use crate::error::BroadcastError;
use crate::registry::TargetAddress;

pub struct FileSource {
    path: PathBuf,
    settings: DiscoverySettings,
}

impl FileSource {
    /// Fails on an extension no compiled-in format can read.
    pub fn new(path: PathBuf, settings: DiscoverySettings) -> Result<Self, BroadcastError> {
        let ext = extension(&path);
        if !is_supported(ext) {
            return Err(BroadcastError::UnsupportedFormat(ext.to_string()));
        }
        Ok(Self { path, settings })
    }

    async fn read_content(&self) -> Result<String, BroadcastError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BroadcastError::TargetsFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                BroadcastError::Io(e)
            }
        })
    }
}

#[async_trait]
impl DiscoverySource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<(Vec<TargetAddress>, SnapshotVersion), BroadcastError> {
        let content = self.read_content().await?;
        let document = parse_targets_str(
            extension(&self.path),
            &content,
            &self.path.display().to_string(),
        )?;

        let hash = sha256_hex(content.as_bytes());
        Ok((document.resolve(&self.settings), SnapshotVersion::Hash(hash)))
    }

    async fn has_changed(&self, current: &SnapshotVersion) -> Result<bool, BroadcastError> {
        let content = self.read_content().await?;
        let hash = sha256_hex(content.as_bytes());
        Ok(*current != SnapshotVersion::Hash(hash))
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

fn is_supported(ext: &str) -> bool {
    match ext {
        "json" => true,
        "yaml" | "yml" => cfg!(feature = "yaml"),
        _ => false,
    }
}

/// Parse a targets document based on file extension.
pub fn parse_targets_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<TargetsDocument, BroadcastError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| BroadcastError::TargetsParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        "json" => serde_json::from_str(content).map_err(|e| BroadcastError::TargetsParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(BroadcastError::UnsupportedFormat(other.to_string())),
    }
}
