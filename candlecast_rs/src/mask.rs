use anyhow::{Result, bail};
use chrono::Duration;

/// Allowed deviation, in buckets, between consecutive elapsed values and 1.
pub const ALIGNMENT_TOLERANCE: f64 = 1e-6;

/// Elapsed bucket count of every row relative to the first one.
///
/// Perfectly regular input yields exactly `0, 1, 2, ...`. Times are epoch
/// seconds; the bucket must be strictly positive.
pub fn elapsed_buckets(time: &[i64], bucket: Duration) -> Result<Vec<f64>> {
    let bucket_seconds = bucket.num_milliseconds() as f64 / 1_000.0;
    if bucket_seconds <= 0.0 {
        bail!("Bucket duration must be positive (got {bucket_seconds}s)");
    }
    let Some(&origin) = time.first() else {
        return Ok(Vec::new());
    };
    Ok(time
        .iter()
        .map(|&t| (t - origin) as f64 / bucket_seconds)
        .collect())
}

/// True where row `j + 1` sits exactly one bucket after row `j`.
pub fn consecutive_pairs(elapsed: &[f64]) -> Vec<bool> {
    elapsed
        .windows(2)
        .map(|pair| (pair[1] - pair[0] - 1.0).abs() < ALIGNMENT_TOLERANCE)
        .collect()
}

/// Validity of every window of `bars` consecutive rows, indexed by window
/// start. A window is valid only when all of its `bars - 1` adjacent pairs
/// are exactly one bucket apart. Empty when there are fewer rows than
/// `bars`.
pub fn alignment_mask(elapsed: &[f64], bars: usize) -> Vec<bool> {
    if bars == 0 || elapsed.len() < bars {
        return Vec::new();
    }
    let pairs = consecutive_pairs(elapsed);
    let windows = elapsed.len() - bars + 1;
    (0..windows)
        .map(|start| pairs[start..start + bars - 1].iter().all(|ok| *ok))
        .collect()
}
