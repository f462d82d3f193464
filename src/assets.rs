use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

/// Logical asset path resolution. Paths are tried as given first, then
/// against the optional fallback root.
#[derive(Debug, Clone, Default)]
pub struct AssetPaths {
    root: Option<PathBuf>,
}

impl AssetPaths {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let direct = PathBuf::from(path);
        if direct.exists() {
            return direct;
        }
        if let Some(root) = &self.root {
            let joined = root.join(path);
            if joined.exists() {
                return joined;
            }
        }
        direct
    }

    /// Reads an asset's bytes; an empty file is an error.
    pub fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve(path);
        let bytes = fs::read(&resolved)
            .with_context(|| format!("failed to read asset {}", resolved.display()))?;
        if bytes.is_empty() {
            bail!("asset {} is empty", resolved.display());
        }
        Ok(bytes)
    }
}
