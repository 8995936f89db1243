//! Audio directory file store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::application::ports::{FileError, FileStore};

/// File store rooted at the audio directory
pub struct AudioDirectory {
    root: PathBuf,
}

impl AudioDirectory {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The audio root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_error(operation: &'static str, path: &Path, e: std::io::Error) -> FileError {
        if e.kind() == ErrorKind::NotFound && operation != "write" {
            return FileError::NotFound(path.display().to_string());
        }
        FileError::Persistence {
            operation,
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl FileStore for AudioDirectory {
    fn resolve(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<(), FileError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_error("write", &self.root, e))?;

        let path = self.resolve(file_name);
        fs::write(&path, bytes)
            .await
            .map_err(|e| Self::io_error("write", &path, e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Wrote audio file");
        Ok(())
    }

    async fn read(&self, file_name: &str) -> Result<Vec<u8>, FileError> {
        let path = self.resolve(file_name);
        fs::read(&path)
            .await
            .map_err(|e| Self::io_error("read", &path, e))
    }

    async fn read_head(&self, file_name: &str, len: usize) -> Result<Vec<u8>, FileError> {
        let path = self.resolve(file_name);
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::io_error("read", &path, e))?;

        let mut head = Vec::with_capacity(len);
        file.take(len as u64)
            .read_to_end(&mut head)
            .await
            .map_err(|e| Self::io_error("read", &path, e))?;
        Ok(head)
    }

    async fn remove(&self, file_name: &str) -> Result<(), FileError> {
        let path = self.resolve(file_name);
        fs::remove_file(&path)
            .await
            .map_err(|e| Self::io_error("remove", &path, e))?;

        debug!(path = %path.display(), "Removed audio file");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, FileError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error("list", &self.root, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error("list", &self.root, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = AudioDirectory::new(dir.path().join("audio"));

        let mut bytes = vec![0u8; 4096];
        rand::thread_rng().fill_bytes(&mut bytes);

        store.write("clip.webm", &bytes).await.unwrap();
        assert_eq!(store.read("clip.webm").await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = AudioDirectory::new(dir.path());

        store.write("clip.webm", b"first").await.unwrap();
        store.write("clip.webm", b"second").await.unwrap();
        assert_eq!(store.read("clip.webm").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = AudioDirectory::new(dir.path());
        let err = store.read("missing.webm").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn read_head_stops_at_len() {
        let dir = TempDir::new().unwrap();
        let store = AudioDirectory::new(dir.path());
        store.write("clip.webm", b"abcdefgh").await.unwrap();
        store.write("short.webm", b"ab").await.unwrap();

        assert_eq!(store.read_head("clip.webm", 4).await.unwrap(), b"abcd");
        assert_eq!(store.read_head("short.webm", 4).await.unwrap(), b"ab");
        assert!(store.read_head("missing.webm", 4).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = AudioDirectory::new(dir.path());
        let err = store.remove("missing.webm").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn remove_deletes_file() {
        let dir = TempDir::new().unwrap();
        let store = AudioDirectory::new(dir.path());
        store.write("clip.webm", b"data").await.unwrap();
        store.remove("clip.webm").await.unwrap();
        assert!(!dir.path().join("clip.webm").exists());
    }

    #[tokio::test]
    async fn write_under_a_file_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = AudioDirectory::new(blocker.join("audio"));
        let err = store.write("clip.webm", b"data").await.unwrap_err();
        assert!(matches!(err, FileError::Persistence { operation: "write", .. }));
    }

    #[tokio::test]
    async fn list_returns_sorted_file_names() {
        let dir = TempDir::new().unwrap();
        let store = AudioDirectory::new(dir.path());
        store.write("b.webm", b"b").await.unwrap();
        store.write("a.webm", b"a").await.unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["a.webm", "b.webm"]);
    }

    #[tokio::test]
    async fn list_of_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = AudioDirectory::new(dir.path().join("nope"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn resolve_joins_root() {
        let store = AudioDirectory::new("/data/audio");
        assert_eq!(store.resolve("x.webm"), PathBuf::from("/data/audio/x.webm"));
    }
}
