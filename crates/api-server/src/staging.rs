//! Upload staging
//!
//! Each upload is written to its own directory under the upload root and
//! removed exactly once: explicitly via [`StagedVideo::remove`] on the normal
//! path, or on drop if the request bails out early.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Accepted container extensions (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

/// Lowercased extension of `filename`, if it has one
fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// True if `filename` ends in one of [`ALLOWED_EXTENSIONS`]
#[must_use]
pub fn has_allowed_extension(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9_.-]` is removed and leading/trailing `.`/`_` are trimmed. When
/// nothing usable is left the name becomes `upload.<ext>`.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if has_allowed_extension(cleaned) && cleaned.rsplit_once('.').is_some_and(|(stem, _)| !stem.is_empty()) {
        cleaned.to_string()
    } else {
        let ext = extension(filename).unwrap_or_else(|| "bin".to_string());
        format!("upload.{ext}")
    }
}

/// An upload persisted to a request-scoped directory
#[derive(Debug)]
pub struct StagedVideo {
    dir: PathBuf,
    path: PathBuf,
    removed: bool,
}

impl StagedVideo {
    /// Reserve `<root>/<uuid>/<sanitized name>` and open it for writing
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created
    pub async fn create(root: &Path, filename: &str) -> io::Result<(Self, tokio::fs::File)> {
        let dir = root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let staged = Self {
            path: dir.join(sanitize_filename(filename)),
            dir,
            removed: false,
        };
        let file = tokio::fs::File::create(&staged.path).await?;

        debug!("Staging upload at {}", staged.path.display());
        Ok((staged, file))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staged file and its directory
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed
    pub fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        remove_dir(&self.dir)
    }
}

impl Drop for StagedVideo {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = remove_dir(&self.dir) {
                warn!("Failed to clean up {}: {}", self.dir.display(), e);
            }
        }
    }
}

fn remove_dir(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
