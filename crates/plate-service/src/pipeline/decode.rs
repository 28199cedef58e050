use image::DynamicImage;
use tracing::warn;

/// Decode an uploaded buffer into pixels.
///
/// Returns `None` for anything `image` cannot decode, including empty
/// buffers and zero-sized images.
pub fn decode_image(bytes: &[u8]) -> Option<DynamicImage> {
    match image::load_from_memory(bytes) {
        Ok(img) if img.width() > 0 && img.height() > 0 => Some(img),
        Ok(_) => {
            warn!("Uploaded image has zero size");
            None
        }
        Err(e) => {
            warn!(len = bytes.len(), "Failed to decode uploaded image: {}", e);
            None
        }
    }
}
