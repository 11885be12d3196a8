//! Local model artifact cache
//!
//! Model files are resolved by filename inside a local cache directory. A file
//! that is already present is used as is; otherwise it is fetched from an
//! [`ArtifactSource`] into a `.part` file and renamed into place, so a crashed
//! fetch never leaves a truncated model behind under the real name.

use std::path::{Path, PathBuf};

use crate::utils::error::{DiagnosisError, Result};

/// Somewhere model artifacts can be copied from
pub trait ArtifactSource: Send + Sync {
    /// Human-readable location, for logs
    fn describe(&self) -> String;

    /// Write artifact `name` to `dest`
    fn fetch(&self, name: &str, dest: &Path) -> Result<()>;
}

/// Artifacts stored in a mounted directory (network share, volume, ...)
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactSource for DirectorySource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn fetch(&self, name: &str, dest: &Path) -> Result<()> {
        let src = self.root.join(name);
        if !src.is_file() {
            return Err(DiagnosisError::Artifact(
                src,
                "not found in artifact source".to_string(),
            ));
        }
        std::fs::copy(&src, dest)
            .map_err(|e| DiagnosisError::Artifact(src.clone(), e.to_string()))?;
        Ok(())
    }
}

/// Cache directory holding model artifacts by filename
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached location of an artifact (whether or not it exists yet)
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Make sure `name` is present locally, fetching it if needed
    pub fn ensure(&self, name: &str, source: Option<&dyn ArtifactSource>) -> Result<PathBuf> {
        let path = self.path_of(name);
        if path.is_file() {
            tracing::info!("{} already exists, skipping fetch", name);
            return Ok(path);
        }

        let source = source.ok_or_else(|| {
            DiagnosisError::Artifact(
                path.clone(),
                "not cached and no artifact source configured".to_string(),
            )
        })?;

        std::fs::create_dir_all(&self.dir)?;
        let partial = self.dir.join(format!("{}.part", name));

        tracing::info!("Fetching {} from {}...", name, source.describe());
        if let Err(e) = source.fetch(name, &partial) {
            let _ = std::fs::remove_file(&partial);
            return Err(e);
        }
        std::fs::rename(&partial, &path)?;
        tracing::info!("Fetch complete: {:?}", path);

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl ArtifactSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn fetch(&self, _name: &str, dest: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(dest, b"weights")?;
            Ok(())
        }
    }

    #[test]
    fn test_present_artifact_skips_fetch() {
        let cache_dir = tempfile::tempdir().unwrap();
        std::fs::write(cache_dir.path().join("model.mpk"), b"cached").unwrap();

        let source = CountingSource { calls: AtomicUsize::new(0) };
        let cache = ArtifactCache::new(cache_dir.path());
        let path = cache.ensure("model.mpk", Some(&source as &dyn ArtifactSource)).unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(path).unwrap(), b"cached");
    }

    #[test]
    fn test_missing_artifact_is_fetched_once() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(cache_dir.path().join("models"));
        let source = CountingSource { calls: AtomicUsize::new(0) };

        let first = cache.ensure("model.mpk", Some(&source as &dyn ArtifactSource)).unwrap();
        let second = cache.ensure("model.mpk", Some(&source as &dyn ArtifactSource)).unwrap();

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!cache.dir().join("model.mpk.part").exists());
    }

    #[test]
    fn test_missing_without_source_fails() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(cache_dir.path());

        let err = cache.ensure("model.mpk", None).unwrap_err();
        assert!(matches!(err, DiagnosisError::Artifact(..)));
    }

    #[test]
    fn test_directory_source() {
        let storage = tempfile::tempdir().unwrap();
        std::fs::write(storage.path().join("symptom_model.json"), b"{}").unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        let source = DirectorySource::new(storage.path());
        let cache = ArtifactCache::new(cache_dir.path());

        let path = cache
            .ensure("symptom_model.json", Some(&source as &dyn ArtifactSource))
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"{}");

        let err = cache.ensure("absent.mpk", Some(&source as &dyn ArtifactSource)).unwrap_err();
        assert!(matches!(err, DiagnosisError::Artifact(..)));
        assert!(!cache.dir().join("absent.mpk.part").exists());
    }
}
