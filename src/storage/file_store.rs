//! Uploaded file storage
//!
//! Stores binary uploads (images, PDFs) under a per-user, per-type
//! directory layout. Stored URLs are deterministic paths of the form
//! `/uploads/<userId>/<images|pdfs>/<generatedFilename>`, with image
//! thumbnails beside the original as `thumb-<generatedFilename>`.

use crate::config::THUMBNAIL_PREFIX;
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const URL_PREFIX: &str = "/uploads/";

/// Upload category, one directory per item file type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Images,
    Pdfs,
}

impl FileCategory {
    pub fn dir(&self) -> &'static str {
        match self {
            FileCategory::Images => "images",
            FileCategory::Pdfs => "pdfs",
        }
    }
}

/// A stored file: its generated name plus the public URL path
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub url: String,
}

/// Extract a usable lowercase extension from a client filename.
/// Anything suspicious (too long, spaces) is dropped.
fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit('.')
        .next()
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && !ext.contains(' '))
        .filter(|ext| *ext != filename)
        .map(|s| s.to_lowercase())
}

/// Generate a unique filename preserving the original extension
fn generate_filename(original_name: &str) -> String {
    let id = Uuid::new_v4();
    match extension_of(original_name) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

/// Per-user upload store
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the uploads directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Initialize the store (create the root if needed)
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("File store initialized at: {:?}", self.root);
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, user_id: &str, category: FileCategory, file_name: &str) -> String {
        format!("{}{}/{}/{}", URL_PREFIX, user_id, category.dir(), file_name)
    }

    /// Map a stored URL back to its on-disk path
    pub fn resolve(&self, url: &str) -> Result<PathBuf> {
        let relative = url
            .strip_prefix(URL_PREFIX)
            .ok_or_else(|| AppError::Generic(format!("Unexpected file URL: {}", url)))?;

        if relative.split('/').any(|part| part == "..") {
            return Err(AppError::Generic(format!("Unexpected file URL: {}", url)));
        }

        Ok(self.root.join(relative))
    }

    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to temp file first, then rename into place
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(temp_path, path).await?;

        Ok(())
    }

    /// Store an upload under a freshly generated filename
    pub async fn store(
        &self,
        user_id: &str,
        category: FileCategory,
        original_name: &str,
        data: &[u8],
    ) -> Result<StoredFile> {
        let file_name = generate_filename(original_name);
        self.store_named(user_id, category, &file_name, data).await
    }

    /// Store bytes under an explicit filename (thumbnails)
    pub async fn store_named(
        &self,
        user_id: &str,
        category: FileCategory,
        file_name: &str,
        data: &[u8],
    ) -> Result<StoredFile> {
        let url = self.url_for(user_id, category, file_name);
        let path = self.resolve(&url)?;

        self.write_atomic(&path, data).await?;

        tracing::debug!("Stored file: {} ({} bytes)", url, data.len());

        Ok(StoredFile {
            file_name: file_name.to_string(),
            url,
        })
    }

    /// Read a stored file back. A URL pointing at nothing is NOT_FOUND,
    /// never a crash.
    pub async fn read(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.resolve(url)?;

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound("File".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Duplicate a stored file under a fresh generated filename in the
    /// same directory. Returns the new file.
    pub async fn duplicate(&self, url: &str) -> Result<StoredFile> {
        let file_name = url
            .rsplit('/')
            .next()
            .ok_or_else(|| AppError::Generic(format!("Unexpected file URL: {}", url)))?;

        self.copy_as(url, &generate_filename(file_name)).await
    }

    /// Duplicate a stored file under an explicit new name in the same
    /// directory (thumbnail copies track their original's name).
    pub async fn copy_as(&self, url: &str, new_file_name: &str) -> Result<StoredFile> {
        let source = self.resolve(url)?;
        let target = source
            .parent()
            .ok_or_else(|| AppError::Generic(format!("Unexpected file URL: {}", url)))?
            .join(new_file_name);

        match fs::copy(&source, &target).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound("File".to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let new_url = match url.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}", dir, new_file_name),
            None => new_file_name.to_string(),
        };

        tracing::debug!("Copied file: {} -> {}", url, new_url);

        Ok(StoredFile {
            file_name: new_file_name.to_string(),
            url: new_url,
        })
    }

    /// Delete a stored file. Missing files are treated as already
    /// deleted (idempotent cleanup).
    pub async fn remove(&self, url: &str) -> Result<()> {
        let path = self.resolve(url)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted file: {}", url);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Thumbnail filename for a stored image filename
pub fn thumbnail_name(file_name: &str) -> String {
    format!("{}{}", THUMBNAIL_PREFIX, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("uploads"));
        store.initialize().await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_store_and_read() {
        let (store, _temp) = create_test_store().await;

        let stored = store
            .store("u1", FileCategory::Images, "photo.png", b"pixels")
            .await
            .unwrap();

        assert!(stored.url.starts_with("/uploads/u1/images/"));
        assert!(stored.url.ends_with(".png"));

        let data = store.read(&stored.url).await.unwrap();
        assert_eq!(data, b"pixels");
    }

    #[tokio::test]
    async fn test_generated_names_are_unique() {
        let (store, _temp) = create_test_store().await;

        let a = store
            .store("u1", FileCategory::Pdfs, "doc.pdf", b"a")
            .await
            .unwrap();
        let b = store
            .store("u1", FileCategory::Pdfs, "doc.pdf", b"b")
            .await
            .unwrap();

        assert_ne!(a.url, b.url);
    }

    #[tokio::test]
    async fn test_duplicate_copies_bytes() {
        let (store, _temp) = create_test_store().await;

        let original = store
            .store("u1", FileCategory::Images, "photo.jpg", b"image-bytes")
            .await
            .unwrap();

        let copy = store.duplicate(&original.url).await.unwrap();

        assert_ne!(copy.url, original.url);
        assert_eq!(store.read(&copy.url).await.unwrap(), b"image-bytes");
        // Original is untouched.
        assert_eq!(store.read(&original.url).await.unwrap(), b"image-bytes");
    }

    #[tokio::test]
    async fn test_duplicate_missing_source() {
        let (store, _temp) = create_test_store().await;

        let result = store.duplicate("/uploads/u1/images/gone.png").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (store, _temp) = create_test_store().await;

        let stored = store
            .store("u1", FileCategory::Pdfs, "doc.pdf", b"pdf")
            .await
            .unwrap();

        store.remove(&stored.url).await.unwrap();
        // Second removal of the same URL is not an error.
        store.remove(&stored.url).await.unwrap();

        assert!(matches!(
            store.read(&stored.url).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let (store, _temp) = create_test_store().await;

        assert!(store.resolve("/uploads/../etc/passwd").is_err());
        assert!(store.resolve("/elsewhere/file").is_err());
    }

    #[test]
    fn test_thumbnail_name() {
        assert_eq!(thumbnail_name("abc.png"), "thumb-abc.png");
    }

    #[test]
    fn test_extension_handling() {
        assert_eq!(extension_of("photo.PNG"), Some("png".to_string()));
        assert_eq!(extension_of("no-extension"), None);
        assert_eq!(extension_of("weird.a b"), None);
    }
}
