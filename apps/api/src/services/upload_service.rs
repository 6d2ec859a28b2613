//! Files written under the upload directory and served from `/uploads`.
//!
//! ```text
//!   <upload_dir>/avatars/<user_id>-<uuid>.<ext>   →  /uploads/avatars/...
//!   <upload_dir>/reports/report-<TYPE>-...pdf     →  /uploads/reports/...
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use stockline_core::MAX_AVATAR_BYTES;

/// Public URL prefix of the upload directory.
pub const PUBLIC_PREFIX: &str = "/uploads";

const AVATAR_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// File extension for an accepted avatar content type.
pub fn avatar_extension(content_type: &str) -> Option<&'static str> {
    AVATAR_TYPES
        .iter()
        .find(|(mime, _)| content_type.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
}

/// Stores an avatar image and returns its public URL.
pub async fn save_avatar(
    upload_dir: &Path,
    user_id: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<String, ApiError> {
    let ext = avatar_extension(content_type).ok_or_else(|| {
        ApiError::Validation("Only JPEG, PNG, GIF and WEBP images are allowed".to_string())
    })?;

    if bytes.is_empty() {
        return Err(ApiError::Validation("avatar file is required".to_string()));
    }
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::Validation("avatar must be at most 5MB".to_string()));
    }

    let file_name = format!("{user_id}-{}.{ext}", Uuid::new_v4());
    write_file(upload_dir, "avatars", &file_name, bytes).await
}

/// Writes `bytes` to `<upload_dir>/<folder>/<file_name>` and returns the
/// public URL.
pub async fn write_file(
    upload_dir: &Path,
    folder: &str,
    file_name: &str,
    bytes: &[u8],
) -> Result<String, ApiError> {
    let dir = upload_dir.join(folder);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create {}: {e}", dir.display())))?;

    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to write {}: {e}", path.display())))?;

    debug!(path = %path.display(), size = bytes.len(), "Upload written");
    Ok(format!("{PUBLIC_PREFIX}/{folder}/{file_name}"))
}

/// Maps a public URL back to a path under `upload_dir`.
///
/// Returns `None` for URLs outside `/uploads` or containing `..`.
pub fn local_path(upload_dir: &Path, url: &str) -> Option<PathBuf> {
    let relative = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    if relative.is_empty() || relative.split('/').any(|part| part == ".." || part.is_empty()) {
        return None;
    }
    Some(upload_dir.join(relative))
}

/// Deletes a previously uploaded file. Missing files are ignored.
pub async fn remove_upload(upload_dir: &Path, url: &str) {
    let Some(path) = local_path(upload_dir, url) else {
        return;
    };

    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(path = %path.display(), "Upload removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove upload"),
    }
}
