use super::Region;
use std::cmp::Ordering;

/// Intersection over Union of two regions
pub fn iou(a: &Region, b: &Region) -> f32 {
    let inter = Region::new(a.x1.max(b.x1), a.y1.max(b.y1), a.x2.min(b.x2), a.y2.min(b.y2), 0.0);
    let intersection = inter.area() as f64;
    let union = (a.area() + b.area()) as f64 - intersection;

    if union > 0.0 {
        (intersection / union) as f32
    } else {
        0.0
    }
}

/// Greedy Non-Maximum Suppression.
///
/// Regions are visited by descending confidence; each kept region discards
/// every remaining one whose IoU with it exceeds `iou_threshold`. Ties keep
/// their input order.
pub fn non_max_suppression(mut regions: Vec<Region>, iou_threshold: f32) -> Vec<Region> {
    regions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Region> = Vec::with_capacity(regions.len());
    for candidate in regions {
        if keep.iter().all(|kept| iou(kept, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }

    keep
}
