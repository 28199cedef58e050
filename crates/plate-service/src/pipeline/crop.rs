use super::Region;
use image::DynamicImage;

/// Cut a region out of the image after clamping it to the image bounds.
///
/// Returns `None` when the clamped region has zero area.
pub fn crop_region(image: &DynamicImage, region: &Region) -> Option<DynamicImage> {
    let width = image.width() as i64;
    let height = image.height() as i64;

    let x1 = (region.x1 as i64).clamp(0, width);
    let y1 = (region.y1 as i64).clamp(0, height);
    let x2 = (region.x2 as i64).clamp(0, width);
    let y2 = (region.y2 as i64).clamp(0, height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(image.crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
}
