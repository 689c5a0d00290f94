//! Object storage for uploaded lesson videos.
//!
//! Objects live in named buckets under `storage.root_dir`, one directory per bucket. They are
//! never served directly: readers receive a time-limited signed URL (see [`signing`]) that the
//! `/storage/{bucket}/{*path}` route checks before streaming the object.

pub mod signing;

use async_trait::async_trait;
use bytes::Bytes;
use rand::prelude::RngExt;
use rand::rng;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::Error;

/// Bucket holding uploaded lesson videos
pub const LESSON_VIDEOS_BUCKET: &str = "lesson-videos";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object {0} not found")]
    NotFound(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => Error::NotFound {
                resource: "Object".to_string(),
                id: path,
            },
            StorageError::InvalidPath(message) => Error::BadRequest { message },
            StorageError::Io(e) => Error::Other(anyhow::Error::from(e).context("object storage I/O")),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// An object opened for streaming
pub struct StoredObject {
    pub file: fs::File,
    pub size: u64,
}

/// An object being written chunk by chunk.
///
/// Nothing is visible at the object path until [`ObjectWriter::commit`]. Dropping an uncommitted
/// writer discards what was written.
#[async_trait]
pub trait ObjectWriter: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Publish the object, replacing any previous content. Returns the bytes written.
    async fn commit(self: Box<Self>) -> Result<u64>;
}

/// Trait for object storage backends
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Start writing an object at `path`
    async fn create(&self, bucket: &str, path: &str) -> Result<Box<dyn ObjectWriter>>;

    /// Write a whole object in one call
    async fn store(&self, bucket: &str, path: &str, data: Bytes) -> Result<()> {
        let mut writer = self.create(bucket, path).await?;
        writer.write_chunk(&data).await?;
        writer.commit().await?;
        Ok(())
    }

    /// Open an object for streaming
    async fn open(&self, bucket: &str, path: &str) -> Result<StoredObject>;

    /// Delete an object. Returns false when it did not exist.
    async fn delete(&self, bucket: &str, path: &str) -> Result<bool>;

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool>;
}

/// Reject anything that could escape the bucket directory.
pub fn validate_object_path(bucket: &str, path: &str) -> Result<PathBuf> {
    let invalid = |why: &str| StorageError::InvalidPath(format!("{bucket}/{path}: {why}"));

    if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
        return Err(invalid("bad bucket name"));
    }
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(invalid("path must be relative"));
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(invalid("empty or relative segment"));
    }

    let relative = Path::new(bucket).join(path);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(invalid("path must stay inside the bucket"));
    }
    Ok(relative)
}

/// Object key for a new lesson video: `{module_id}/{unix_millis}-{random}.{ext}`
pub fn lesson_video_key(module_id: uuid::Uuid, file_name: Option<&str>, now_millis: i64) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rng();
    let suffix: String = (0..8)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect();

    let extension = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());

    format!("{module_id}/{now_millis}-{suffix}.{extension}")
}

/// Local filesystem storage backend
pub struct LocalFileStorage {
    base_path: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        Ok(self.base_path.join(validate_object_path(bucket, path)?))
    }
}

/// Writes into a hidden sibling file, renamed over the object path on commit
struct LocalObjectWriter {
    file: Option<fs::File>,
    partial_path: PathBuf,
    final_path: PathBuf,
    written: u64,
    committed: bool,
}

#[async_trait]
impl ObjectWriter for LocalObjectWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("object writer already closed"))?;
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        fs::rename(&self.partial_path, &self.final_path).await?;
        self.committed = true;

        tracing::debug!(path = %self.final_path.display(), bytes = self.written, "Stored object");
        Ok(self.written)
    }
}

impl Drop for LocalObjectWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        match std::fs::remove_file(&self.partial_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.partial_path.display(), error = %e, "Failed to remove partial object");
            }
            _ => {}
        }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn create(&self, bucket: &str, path: &str) -> Result<Box<dyn ObjectWriter>> {
        let final_path = self.resolve(bucket, path)?;

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file_name = final_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StorageError::InvalidPath(format!("{bucket}/{path}")))?;
        let partial_path = final_path.with_file_name(format!(".{file_name}.{}.partial", uuid::Uuid::new_v4().simple()));
        let file = fs::File::create(&partial_path).await?;

        Ok(Box::new(LocalObjectWriter {
            file: Some(file),
            partial_path,
            final_path,
            written: 0,
            committed: false,
        }))
    }

    async fn open(&self, bucket: &str, path: &str) -> Result<StoredObject> {
        let full_path = self.resolve(bucket, path)?;

        let file = match fs::File::open(&full_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{bucket}/{path}")));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        Ok(StoredObject { file, size })
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<bool> {
        let full_path = self.resolve(bucket, path)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        let full_path = self.resolve(bucket, path)?;
        Ok(fs::try_exists(&full_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use uuid::Uuid;

    #[test]
    fn test_validate_object_path() {
        assert!(validate_object_path("lesson-videos", "m1/123-abc.mp4").is_ok());

        for bad in ["", "/etc/passwd", "../x", "a/../b", "a//b", "a/./b", "a\\b"] {
            assert!(validate_object_path("lesson-videos", bad).is_err(), "accepted {bad:?}");
        }
        assert!(validate_object_path("..", "x").is_err());
        assert!(validate_object_path("a/b", "x").is_err());
    }

    #[test]
    fn test_lesson_video_key_shape() {
        let module_id = Uuid::new_v4();
        let key = lesson_video_key(module_id, Some("Intro Video.MP4"), 1_700_000_000_000);

        let (prefix, name) = key.split_once('/').unwrap();
        assert_eq!(prefix, module_id.to_string());
        assert!(name.starts_with("1700000000000-"));
        assert!(name.ends_with(".mp4"));
        assert!(validate_object_path(LESSON_VIDEOS_BUCKET, &key).is_ok());

        let no_ext = lesson_video_key(module_id, Some("blob"), 1);
        assert!(no_ext.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_local_storage_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());

        assert!(!storage.exists("videos", "a/b.mp4").await.unwrap());

        storage
            .store("videos", "a/b.mp4", Bytes::from_static(b"frames"))
            .await
            .unwrap();
        assert!(storage.exists("videos", "a/b.mp4").await.unwrap());

        let mut object = storage.open("videos", "a/b.mp4").await.unwrap();
        assert_eq!(object.size, 6);
        let mut content = Vec::new();
        object.file.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"frames");

        assert!(storage.delete("videos", "a/b.mp4").await.unwrap());
        assert!(!storage.delete("videos", "a/b.mp4").await.unwrap());
        assert!(matches!(
            storage.open("videos", "a/b.mp4").await,
            Err(StorageError::NotFound(_))
        ));
    }

    async fn entries(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut read_dir = fs::read_dir(dir).await.unwrap();
        while let Some(entry) = read_dir.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_streamed_object_appears_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());

        let mut writer = storage.create("videos", "m/clip.mp4").await.unwrap();
        writer.write_chunk(b"first ").await.unwrap();
        writer.write_chunk(b"second").await.unwrap();
        assert!(!storage.exists("videos", "m/clip.mp4").await.unwrap());

        assert_eq!(writer.commit().await.unwrap(), 12);

        let mut object = storage.open("videos", "m/clip.mp4").await.unwrap();
        let mut content = Vec::new();
        object.file.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"first second");
        assert_eq!(entries(&dir.path().join("videos/m")).await, vec!["clip.mp4"]);
    }

    #[tokio::test]
    async fn test_dropped_writer_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());

        let mut writer = storage.create("videos", "m/clip.mp4").await.unwrap();
        writer.write_chunk(b"half a video").await.unwrap();
        drop(writer);

        assert!(!storage.exists("videos", "m/clip.mp4").await.unwrap());
        assert!(entries(&dir.path().join("videos/m")).await.is_empty());
    }

    #[tokio::test]
    async fn test_local_storage_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().join("root"));

        let result = storage.store("videos", "../../escape", Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }
}
