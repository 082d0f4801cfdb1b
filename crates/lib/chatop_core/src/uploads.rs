//! Image upload validation and storage.
//!
//! Untrusted uploads are checked in a fixed order and the first failing
//! check wins:
//!
//! 1. present and non-empty
//! 2. at most `max_bytes`
//! 3. filename free of traversal sequences after path cleaning
//! 4. extension in the allow-list
//! 5. declared content type in the allow-list
//!
//! Accepted files are written under a fresh `{uuid}.{ext}` name. Nothing of
//! the original filename except its validated extension reaches the disk.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Default accepted file extensions (lowercase, without the dot).
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Default accepted declared content types.
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// URL path segment under which stored files are served.
pub const UPLOADS_PATH: &str = "/uploads";

/// Why an upload was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("No file was provided. Please choose an image to upload.")]
    Missing,

    #[error("The uploaded file is empty.")]
    Empty,

    #[error("The file exceeds the maximum allowed size of {max_bytes} bytes.")]
    TooLarge { max_bytes: u64 },

    #[error("The file name contains invalid characters.")]
    InvalidFilename,

    #[error("Unsupported file format. Only images are accepted ({allowed}).")]
    UnsupportedExtension { allowed: String },

    #[error("Unsupported file type. Only images are accepted.")]
    UnsupportedContentType,
}

/// Upload errors.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Invalid(#[from] UploadRejection),

    #[error("Could not store file: {0}")]
    Io(#[from] std::io::Error),
}

/// An untrusted uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadArtifact {
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadArtifact {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A validated, renamed and persisted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFileReference {
    /// Generated `{uuid}.{ext}` name.
    pub filename: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Publicly resolvable URL.
    pub url: String,
}

/// Limits and allow-lists applied to uploads.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadPolicy {
    /// Run every check against `artifact`, returning the lowercase extension.
    pub fn validate(&self, artifact: Option<&UploadArtifact>) -> Result<String, UploadRejection> {
        let artifact = artifact.ok_or(UploadRejection::Missing)?;

        if artifact.bytes.is_empty() {
            return Err(UploadRejection::Empty);
        }

        if artifact.size() > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                max_bytes: self.max_bytes,
            });
        }

        let filename = artifact
            .original_filename
            .as_deref()
            .ok_or(UploadRejection::InvalidFilename)?;
        if filename.contains('\0') {
            return Err(UploadRejection::InvalidFilename);
        }
        let cleaned = clean_path(filename);
        if cleaned.is_empty() || cleaned.contains("..") {
            return Err(UploadRejection::InvalidFilename);
        }

        let extension = file_extension(&cleaned).to_ascii_lowercase();
        if !self.allowed_extensions.iter().any(|e| *e == extension) {
            return Err(UploadRejection::UnsupportedExtension {
                allowed: self.allowed_extensions.join(", "),
            });
        }

        let mime = artifact
            .content_type
            .as_deref()
            .map(normalize_mime)
            .ok_or(UploadRejection::UnsupportedContentType)?;
        if !self.allowed_mime_types.iter().any(|m| *m == mime) {
            return Err(UploadRejection::UnsupportedContentType);
        }

        Ok(extension)
    }
}

/// Validates uploads and writes accepted ones under a fixed root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    public_base: String,
    policy: UploadPolicy,
}

impl FileStorage {
    /// Open (and create if needed) the storage root.
    pub fn new(
        root: impl Into<PathBuf>,
        public_base: &str,
        policy: UploadPolicy,
    ) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_base: public_base.trim_end_matches('/').to_string(),
            policy,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Delete a previously stored file whose owning record was never saved.
    pub async fn discard(&self, stored: &StoredFileReference) {
        match tokio::fs::remove_file(&stored.path).await {
            Ok(()) => info!(filename = %stored.filename, "discarded upload"),
            Err(e) => warn!(filename = %stored.filename, "could not discard upload: {e}"),
        }
    }

    /// Public URL for a stored filename.
    pub fn public_url(&self, filename: &str) -> String {
        format!("{}{UPLOADS_PATH}/{filename}", self.public_base)
    }

    /// Validate `artifact` and persist it under a freshly generated name.
    ///
    /// Every call writes a new file, even for identical content.
    pub async fn store(
        &self,
        artifact: Option<UploadArtifact>,
    ) -> Result<StoredFileReference, UploadError> {
        let extension = match self.policy.validate(artifact.as_ref()) {
            Ok(ext) => ext,
            Err(rejection) => {
                warn!(reason = %rejection, "rejected upload");
                return Err(rejection.into());
            }
        };
        // validate() only succeeds for a present artifact
        let Some(artifact) = artifact else {
            return Err(UploadRejection::Missing.into());
        };

        let filename = format!("{}.{extension}", Uuid::new_v4());
        let path = self.root.join(&filename);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let written = match file.write_all(&artifact.bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        drop(file);
        if let Err(e) = written {
            remove_partial(&path).await;
            return Err(e.into());
        }

        info!(filename = %filename, size = artifact.size(), "stored upload");

        Ok(StoredFileReference {
            url: self.public_url(&filename),
            filename,
            path,
        })
    }
}

/// Remove a file left behind by a failed write.
async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), "could not remove partial upload: {e}");
    }
}

/// Normalize a path: unify separators, drop `.` segments and fold `dir/..`
/// pairs. Leading `..` segments that cannot be folded are kept.
pub fn clean_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let absolute = normalized.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Text after the last `.`, or empty if there is none.
fn file_extension(filename: &str) -> &str {
    filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Lowercase a content type and drop any parameters.
fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    fn artifact(name: &str, mime: &str, bytes: Vec<u8>) -> UploadArtifact {
        UploadArtifact {
            original_filename: Some(name.to_string()),
            content_type: Some(mime.to_string()),
            bytes,
        }
    }

    fn png(name: &str) -> UploadArtifact {
        artifact(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    fn storage(dir: &Path) -> FileStorage {
        FileStorage::new(dir, "http://localhost:3001/", UploadPolicy::default()).unwrap()
    }

    #[test]
    fn clean_path_folds_segments() {
        assert_eq!(clean_path("a/./b/../c.png"), "a/c.png");
        assert_eq!(clean_path("a\\b\\..\\c.png"), "a/c.png");
        assert_eq!(clean_path("../../etc/passwd.png"), "../../etc/passwd.png");
        assert_eq!(clean_path("/a/../../x.png"), "/../x.png");
        assert_eq!(clean_path("photo.png"), "photo.png");
    }

    #[test]
    fn accepts_every_allowed_format() {
        let policy = UploadPolicy::default();
        for (name, mime, ext) in [
            ("a.jpg", "image/jpeg", "jpg"),
            ("a.JPEG", "image/jpeg", "jpeg"),
            ("a.png", "IMAGE/PNG", "png"),
            ("a.gif", "image/gif", "gif"),
            ("a.webp", "image/webp", "webp"),
        ] {
            let a = artifact(name, mime, vec![1]);
            assert_eq!(policy.validate(Some(&a)).unwrap(), ext, "{name}");
        }
    }

    #[test]
    fn accepts_exactly_max_size() {
        let policy = UploadPolicy::default();
        let a = artifact("a.png", "image/png", vec![0; DEFAULT_MAX_UPLOAD_BYTES as usize]);
        assert!(policy.validate(Some(&a)).is_ok());
    }

    #[test]
    fn rejects_missing_and_empty() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.validate(None), Err(UploadRejection::Missing));
        let empty = artifact("a.png", "image/png", Vec::new());
        assert_eq!(policy.validate(Some(&empty)), Err(UploadRejection::Empty));
    }

    #[test]
    fn rejects_oversized() {
        let policy = UploadPolicy::default();
        let big = artifact("a.png", "image/png", vec![0; 11 * 1024 * 1024]);
        assert_eq!(
            policy.validate(Some(&big)),
            Err(UploadRejection::TooLarge {
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES
            })
        );
    }

    #[test]
    fn rejects_traversal() {
        let policy = UploadPolicy::default();
        for name in ["../../etc/passwd.png", "..\\..\\x.png", "a..png", "/../x.png"] {
            assert_eq!(
                policy.validate(Some(&png(name))),
                Err(UploadRejection::InvalidFilename),
                "{name}"
            );
        }
    }

    #[test]
    fn rejects_missing_filename() {
        let policy = UploadPolicy::default();
        let mut a = png("x.png");
        a.original_filename = None;
        assert_eq!(policy.validate(Some(&a)), Err(UploadRejection::InvalidFilename));
    }

    #[test]
    fn rejects_unknown_extension() {
        let policy = UploadPolicy::default();
        for name in ["virus.exe", "noext", "image.png.exe", "dir.png/file"] {
            let err = policy.validate(Some(&png(name))).unwrap_err();
            assert!(
                matches!(err, UploadRejection::UnsupportedExtension { .. }),
                "{name}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_mismatched_content_type() {
        let policy = UploadPolicy::default();
        let video = artifact("movie.png", "video/mp4", vec![1]);
        assert_eq!(
            policy.validate(Some(&video)),
            Err(UploadRejection::UnsupportedContentType)
        );

        let mut untyped = png("a.png");
        untyped.content_type = None;
        assert_eq!(
            policy.validate(Some(&untyped)),
            Err(UploadRejection::UnsupportedContentType)
        );
    }

    #[test]
    fn first_failing_check_wins() {
        let policy = UploadPolicy::default();
        // empty beats bad name, bad extension and bad type
        let a = artifact("../evil.exe", "video/mp4", Vec::new());
        assert_eq!(policy.validate(Some(&a)), Err(UploadRejection::Empty));
        // traversal beats bad extension
        let a = artifact("../evil.exe", "video/mp4", vec![1]);
        assert_eq!(policy.validate(Some(&a)), Err(UploadRejection::InvalidFilename));
        // extension beats type
        let a = artifact("evil.exe", "video/mp4", vec![1]);
        assert!(matches!(
            policy.validate(Some(&a)),
            Err(UploadRejection::UnsupportedExtension { .. })
        ));
    }

    #[tokio::test]
    async fn store_writes_renamed_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let stored = storage.store(Some(png("holiday.PNG"))).await.unwrap();

        assert!(stored.filename.ends_with(".png"));
        assert!(!stored.filename.contains("holiday"));
        assert_eq!(stored.path, dir.path().join(&stored.filename));
        assert_eq!(
            stored.url,
            format!("http://localhost:3001/uploads/{}", stored.filename)
        );
        let written = tokio::fs::read(&stored.path).await.unwrap();
        assert_eq!(written, vec![0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn store_rejects_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let err = storage
            .store(Some(png("../../etc/passwd.png")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::Invalid(UploadRejection::InvalidFilename)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn discard_removes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let stored = storage.store(Some(png("a.png"))).await.unwrap();
        storage.discard(&stored).await;

        assert!(!stored.path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        // second discard only logs
        storage.discard(&stored).await;
    }

    #[tokio::test]
    async fn parallel_identical_uploads_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(storage(dir.path()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.store(Some(png("same.png"))).await })
            })
            .collect();

        let mut names = HashSet::new();
        for h in handles {
            names.insert(h.await.unwrap().unwrap().filename);
        }
        assert_eq!(names.len(), 16);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 16);
    }
}
