//! Process-wide plate reading statistics.

use common::plates::{AnalyticsResponse, DetectionRecord, NO_PLATE_YET, PLATE_SEPARATOR};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Counters {
    total_images: u64,
    successful_plates: u64,
    last_plate: String,
}

/// Running totals over every processed upload.
///
/// All three counters change together inside one lock acquisition, so a
/// snapshot never sees a half-applied update.
#[derive(Debug)]
pub struct AnalyticsAggregate {
    counters: Mutex<Counters>,
}

impl AnalyticsAggregate {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters {
                total_images: 0,
                successful_plates: 0,
                last_plate: NO_PLATE_YET.to_string(),
            }),
        }
    }

    /// Fold one request's results into the totals.
    ///
    /// Every call counts as one image. `last_plate` is replaced by this
    /// request's readable plates and left alone when there are none.
    pub async fn record(&self, results: &[DetectionRecord]) {
        let successes: Vec<&str> = results
            .iter()
            .filter(|r| r.is_read())
            .map(|r| r.plate.as_str())
            .collect();
        let last_plate = (!successes.is_empty()).then(|| successes.join(PLATE_SEPARATOR));

        let mut counters = self.counters.lock().await;
        counters.total_images += 1;
        if let Some(last_plate) = last_plate {
            counters.successful_plates += successes.len() as u64;
            counters.last_plate = last_plate;
        }
    }

    pub async fn snapshot(&self) -> AnalyticsResponse {
        let counters = self.counters.lock().await.clone();

        AnalyticsResponse {
            total_images: counters.total_images,
            successful_plates: counters.successful_plates,
            accuracy: accuracy(counters.successful_plates, counters.total_images),
            last_plate: counters.last_plate,
        }
    }
}

impl Default for AnalyticsAggregate {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentage of plates read per image, rounded to two decimals.
///
/// Rounds the exact binary value half to even, so 3.125 becomes 3.12.
fn accuracy(successful_plates: u64, total_images: u64) -> f64 {
    if total_images == 0 {
        return 0.0;
    }
    let percent = successful_plates as f64 / total_images as f64 * 100.0;
    format!("{:.2}", percent).parse().unwrap_or(0.0)
}
