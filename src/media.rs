use std::path::{Component, Path, PathBuf};

use crate::forms::UploadedImage;

/// Subdirectory of the media root that post images are written to.
pub const POST_IMAGE_DIR: &str = "posts";

/// Write an uploaded image under `<root>/posts/` and return its path relative
/// to `root`, which is what the posts table stores.
pub async fn save_post_image(root: &Path, image: &UploadedImage) -> std::io::Result<String> {
    let ext = image.extension().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "not an image file")
    })?;

    let dir = root.join(POST_IMAGE_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let relative = format!("{}/{}.{}", POST_IMAGE_DIR, uuid::Uuid::now_v7(), ext);
    tokio::fs::write(root.join(&relative), &image.data).await?;

    tracing::debug!("Stored upload {} as {}", image.file_name, relative);
    Ok(relative)
}

/// Remove a stored image; a file that is already gone is not an error.
pub async fn remove(root: &Path, relative: &str) {
    let Some(path) = resolve(root, relative) else {
        return;
    };
    if let Err(e) = tokio::fs::remove_file(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Could not remove media file {}: {}", path.display(), e);
        }
    }
}

/// Map a request path onto the media root, refusing anything that could
/// escape it.
pub fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty() {
        return None;
    }
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}
