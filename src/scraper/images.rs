use crate::http::HttpClient;
use crate::parser::Photo;
use std::path::Path;

/// File name for a photo, restricted to characters safe in a path segment
pub fn image_file_name(photo: &Photo, index: usize) -> String {
    let stem: String = photo
        .filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();

    if stem.is_empty() {
        format!("{}.jpg", index)
    } else {
        format!("{}.jpg", stem)
    }
}

/// Downloads an item's photos into `<image_dir>/<item_id>/`
///
/// Failures are logged and skipped; the number of saved files is returned.
pub async fn save_item_images(
    client: &HttpClient,
    image_dir: &Path,
    item_id: u64,
    photos: &[Photo],
) -> usize {
    tracing::info!("Saving item images (id = {})", item_id);

    let dir = image_dir.join(item_id.to_string());
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        tracing::error!("Can't create images folder for item {}: {}", item_id, e);
        return 0;
    }

    let mut saved = 0;
    for (index, photo) in photos.iter().enumerate() {
        let path = dir.join(image_file_name(photo, index));
        match client.save_image(&photo.url, &path).await {
            Ok(_) => saved += 1,
            Err(e) => tracing::warn!("Can't save image {}: {}", photo.url, e),
        }
    }

    saved
}
