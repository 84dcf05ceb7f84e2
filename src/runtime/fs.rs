//! File system operations (read, atomic write, lock, directory).

use anyhow::{Context, Result, anyhow};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_atomic_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("No parent directory for {:?}", path))?;
        let mut tmp = NamedTempFile::new_in(parent).context("Failed to create temporary file")?;
        tmp.write_all(contents)
            .context("Failed to write temporary file")?;
        tmp.flush()?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .context("Failed to replace file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn lock_exclusive_impl(&self, path: &Path) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .context("Failed to open lock file")?;
        file.lock_exclusive().context("Failed to lock file")?;
        Ok(file)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context("Failed to read file to string")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).context("Failed to create directory")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use fs2::FileExt;
    use tempfile::tempdir;

    #[test]
    fn test_real_runtime_file_ops() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.json");

        runtime.write_atomic(&file_path, b"{}").unwrap();
        assert!(runtime.exists(&file_path));
        assert_eq!(runtime.read_to_string(&file_path).unwrap(), "{}");

        runtime.write_atomic(&file_path, b"[]").unwrap();
        assert_eq!(runtime.read_to_string(&file_path).unwrap(), "[]");
        // Only the target remains, no temporary files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_real_runtime_lock_is_exclusive() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("local.json.lock");

        let held = runtime.lock_exclusive(&lock_path).unwrap();
        let other = std::fs::File::open(&lock_path).unwrap();
        assert!(other.try_lock_exclusive().is_err());

        drop(held);
        assert!(other.try_lock_exclusive().is_ok());
    }

    #[test]
    fn test_real_runtime_create_dir_all() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let sub_dir = dir.path().join("sub/nested");

        runtime.create_dir_all(&sub_dir).unwrap();
        assert!(runtime.exists(&sub_dir));
    }

    #[test]
    fn test_real_runtime_errors() {
        let runtime = RealRuntime;

        let result = runtime.read_to_string(std::path::Path::new("/nonexistent/path/file.txt"));
        assert!(result.is_err());

        let result = runtime.write_atomic(std::path::Path::new("/nonexistent/a.json"), b"{}");
        assert!(result.is_err());
    }
}
