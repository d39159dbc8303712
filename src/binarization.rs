//! Binarization (Automatic Thresholding)
//!
//! Six ways of turning an RGB image into black and white. Each automatic
//! method only picks a level from the luminance histogram; the pixels are
//! always produced by `threshold_manual`:
//!
//! - luminance `>= t` → (255, 255, 255)
//! - luminance `<  t` → (0, 0, 0)
//!
//! Candidate searches (entropy, minimum error, fuzzy minimum error) walk
//! `t = 1..=254` in increasing order and only replace the incumbent on a
//! strict improvement, so ties resolve to the lowest threshold.

use serde::{Deserialize, Serialize};
use log::{debug, trace};
use crate::buffer::{luminance, PixelBuffer};
use crate::error::{PixelsError, Result};
use crate::histogram::{compute_histogram_grayscale, Histogram};

/// Level used when the histogram is empty
const FALLBACK_THRESHOLD: u8 = 128;

/// First and last candidate of the exhaustive searches
const SEARCH_RANGE: std::ops::RangeInclusive<usize> = 1..=254;

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Fixed level in [0, 255]
    Manual { threshold: i32 },
    /// Make roughly `percent` of the pixels black
    PercentBlack { percent: f64 },
    /// Midpoint of the class means, iterated to a fixed point
    MeanIterative {
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
    },
    /// Maximize the summed Shannon entropy of both classes
    Entropy,
    /// Kittler-Illingworth minimum error
    MinimumError,
    /// Minimum error with linear fuzzy memberships
    FuzzyMinimumError,
}

fn default_max_iterations() -> usize {
    100
}

impl Default for ThresholdMethod {
    fn default() -> Self {
        ThresholdMethod::MeanIterative {
            max_iterations: default_max_iterations(),
        }
    }
}

impl ThresholdMethod {
    /// Every automatic method with default parameters
    pub fn automatic() -> Vec<ThresholdMethod> {
        vec![
            ThresholdMethod::PercentBlack { percent: 50.0 },
            ThresholdMethod::default(),
            ThresholdMethod::Entropy,
            ThresholdMethod::MinimumError,
            ThresholdMethod::FuzzyMinimumError,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThresholdMethod::Manual { .. } => "manual",
            ThresholdMethod::PercentBlack { .. } => "percent_black",
            ThresholdMethod::MeanIterative { .. } => "mean_iterative",
            ThresholdMethod::Entropy => "entropy",
            ThresholdMethod::MinimumError => "minimum_error",
            ThresholdMethod::FuzzyMinimumError => "fuzzy_minimum_error",
        }
    }
}

// ============================================================================
// MANUAL THRESHOLD
// ============================================================================

/// Binarize at a fixed luminance level
pub fn threshold_manual(img: &PixelBuffer, threshold: i32) -> Result<PixelBuffer> {
    if !(0..=255).contains(&threshold) {
        return Err(PixelsError::ValueRange(format!(
            "threshold must be in [0, 255] (got {})",
            threshold
        )));
    }
    let t = threshold as u8;
    let data: Vec<u8> = img
        .iter_pixels()
        .flat_map(|(r, g, b)| {
            let v = if luminance(r, g, b) >= t { 255 } else { 0 };
            [v, v, v]
        })
        .collect();
    Ok(img.with_data(data))
}

/// Pick a level with `method` and binarize at it
pub fn binarize(img: &PixelBuffer, method: &ThresholdMethod) -> Result<PixelBuffer> {
    let hist = compute_histogram_grayscale(img);
    let t = select_threshold(&hist, method)?;
    debug!("{} threshold = {}", method.name(), t);
    threshold_manual(img, t as i32)
}

/// Level chosen by `method` for a luminance histogram
pub fn select_threshold(hist: &Histogram, method: &ThresholdMethod) -> Result<u8> {
    match method {
        ThresholdMethod::Manual { threshold } => {
            if !(0..=255).contains(threshold) {
                return Err(PixelsError::ValueRange(format!(
                    "threshold must be in [0, 255] (got {})",
                    threshold
                )));
            }
            Ok(*threshold as u8)
        }
        ThresholdMethod::PercentBlack { percent } => percent_black_threshold(hist, *percent),
        ThresholdMethod::MeanIterative { max_iterations } => {
            Ok(mean_iterative_threshold(hist, *max_iterations))
        }
        ThresholdMethod::Entropy => Ok(entropy_threshold(hist)),
        ThresholdMethod::MinimumError => Ok(minimum_error_threshold(hist)),
        ThresholdMethod::FuzzyMinimumError => Ok(fuzzy_minimum_error_threshold(hist)),
    }
}

pub fn threshold_percent_black(img: &PixelBuffer, percent: f64) -> Result<PixelBuffer> {
    binarize(img, &ThresholdMethod::PercentBlack { percent })
}

pub fn threshold_mean_iterative(img: &PixelBuffer, max_iterations: usize) -> Result<PixelBuffer> {
    binarize(img, &ThresholdMethod::MeanIterative { max_iterations })
}

pub fn threshold_entropy(img: &PixelBuffer) -> Result<PixelBuffer> {
    binarize(img, &ThresholdMethod::Entropy)
}

pub fn threshold_minimum_error(img: &PixelBuffer) -> Result<PixelBuffer> {
    binarize(img, &ThresholdMethod::MinimumError)
}

pub fn threshold_fuzzy_minimum_error(img: &PixelBuffer) -> Result<PixelBuffer> {
    binarize(img, &ThresholdMethod::FuzzyMinimumError)
}

// ============================================================================
// PERCENT BLACK
// ============================================================================

/// Smallest level that puts at least `percent`% of pixels below it
///
/// The level completing the black fraction is itself included in the black
/// class, so the returned threshold sits one above it (capped at 255).
pub fn percent_black_threshold(hist: &Histogram, percent: f64) -> Result<u8> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(PixelsError::ValueRange(format!(
            "percent must be in [0, 100] (got {})",
            percent
        )));
    }
    let total = hist.total();
    if total == 0 {
        return Ok(FALLBACK_THRESHOLD);
    }
    let target = (total as f64 * percent / 100.0).round() as u64;
    if target == 0 {
        return Ok(0);
    }
    let mut cumulative = 0u64;
    for (level, &count) in hist.counts().iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return Ok((level + 1).min(255) as u8);
        }
    }
    Ok(0)
}

// ============================================================================
// MEAN ITERATIVE
// ============================================================================

/// Mean level of `counts[range]`, `None` when the range is empty
fn class_mean(counts: &[u64; 256], range: std::ops::Range<usize>) -> Option<f64> {
    let (n, sum) = counts[range.clone()]
        .iter()
        .zip(range)
        .fold((0u64, 0u64), |(n, s), (&c, i)| (n + c, s + c * i as u64));
    if n == 0 {
        None
    } else {
        Some(sum as f64 / n as f64)
    }
}

pub fn mean_iterative_threshold(hist: &Histogram, max_iterations: usize) -> u8 {
    let total = hist.total();
    if total == 0 {
        return FALLBACK_THRESHOLD;
    }
    let counts = hist.counts();
    let mut t = (hist.weighted_sum() as f64 / total as f64).round() as usize;

    for iteration in 0..max_iterations {
        let (below, above) = match (class_mean(counts, 0..t), class_mean(counts, t..256)) {
            (Some(b), Some(a)) => (b, a),
            _ => break,
        };
        let next = ((below + above) / 2.0).round() as usize;
        trace!("mean iterative #{}: t={} below={:.3} above={:.3}", iteration, t, below, above);
        if next == t {
            break;
        }
        t = next;
    }
    t.min(255) as u8
}

// ============================================================================
// ENTROPY
// ============================================================================

/// Shannon entropy (bits) of `prob[range]` renormalized by `mass`
fn class_entropy(prob: &[f64], mass: f64) -> f64 {
    prob.iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| {
            let q = p / mass;
            -q * q.log2()
        })
        .fold(0.0, |acc, e| acc + e)
}

pub fn entropy_threshold(hist: &Histogram) -> u8 {
    let total = hist.total();
    if total == 0 {
        return FALLBACK_THRESHOLD;
    }
    let prob: Vec<f64> = hist.counts().iter().map(|&c| c as f64 / total as f64).collect();

    let mut best = FALLBACK_THRESHOLD;
    let mut max_entropy = f64::NEG_INFINITY;
    for t in SEARCH_RANGE {
        let p_bg: f64 = prob[..t].iter().sum();
        let p_fg: f64 = prob[t..].iter().sum();
        if p_bg == 0.0 || p_fg == 0.0 {
            continue;
        }
        let total_entropy = class_entropy(&prob[..t], p_bg) + class_entropy(&prob[t..], p_fg);
        if total_entropy > max_entropy {
            max_entropy = total_entropy;
            best = t as u8;
        }
    }
    best
}

// ============================================================================
// MINIMUM ERROR
// ============================================================================

/// (count, mean, population variance) of one class
fn class_stats(counts: &[u64], first_level: usize) -> (u64, f64, f64) {
    let n: u64 = counts.iter().sum();
    if n == 0 {
        return (0, 0.0, 0.0);
    }
    let levels = || counts.iter().enumerate().map(move |(k, &c)| ((first_level + k) as f64, c as f64));
    let mean = levels().map(|(i, c)| i * c).sum::<f64>() / n as f64;
    let var = levels().map(|(i, c)| (i - mean).powi(2) * c).sum::<f64>() / n as f64;
    (n, mean, var)
}

pub fn minimum_error_threshold(hist: &Histogram) -> u8 {
    let total = hist.total();
    if total == 0 {
        return FALLBACK_THRESHOLD;
    }
    let counts = hist.counts();

    let mut best = FALLBACK_THRESHOLD;
    let mut min_error = f64::INFINITY;
    for t in SEARCH_RANGE {
        let (n_bg, _, var_bg) = class_stats(&counts[..t], 0);
        let (n_fg, _, var_fg) = class_stats(&counts[t..], t);
        if n_bg == 0 || n_fg == 0 || var_bg <= 0.0 || var_fg <= 0.0 {
            continue;
        }
        let p_bg = n_bg as f64 / total as f64;
        let p_fg = n_fg as f64 / total as f64;
        let error = p_bg * var_bg.ln() + p_fg * var_fg.ln()
            - 2.0 * (p_bg * p_bg.ln() + p_fg * p_fg.ln());
        if error < min_error {
            min_error = error;
            best = t as u8;
        }
    }
    best
}

// ============================================================================
// FUZZY MINIMUM ERROR
// ============================================================================

/// Background/foreground membership of level `i` for threshold `t`
#[inline]
fn memberships(i: usize, t: usize) -> (f64, f64) {
    if i < t {
        (1.0 - i as f64 / t as f64, 0.0)
    } else {
        (0.0, (i - t) as f64 / (255 - t) as f64)
    }
}

pub fn fuzzy_minimum_error_threshold(hist: &Histogram) -> u8 {
    let total = hist.total();
    if total == 0 {
        return FALLBACK_THRESHOLD;
    }
    let counts = hist.counts();

    let mut best = FALLBACK_THRESHOLD;
    let mut min_error = f64::INFINITY;
    for t in SEARCH_RANGE {
        let mut sum_bg = 0.0;
        let mut sum_fg = 0.0;
        let mut weighted_bg = 0.0;
        let mut weighted_fg = 0.0;
        for (i, &c) in counts.iter().enumerate() {
            let (mu_bg, mu_fg) = memberships(i, t);
            let c = c as f64;
            sum_bg += mu_bg * c;
            sum_fg += mu_fg * c;
            weighted_bg += mu_bg * i as f64 * c;
            weighted_fg += mu_fg * i as f64 * c;
        }
        if sum_bg == 0.0 || sum_fg == 0.0 {
            continue;
        }
        let mean_bg = weighted_bg / sum_bg;
        let mean_fg = weighted_fg / sum_fg;

        let mut error = 0.0;
        for (i, &c) in counts.iter().enumerate() {
            let (mu_bg, mu_fg) = memberships(i, t);
            let level = i as f64;
            error += if i < t {
                mu_bg * (level - mean_bg).powi(2) * c as f64
            } else {
                mu_fg * (level - mean_fg).powi(2) * c as f64
            };
        }
        error /= total as f64;

        if error < min_error {
            min_error = error;
            best = t as u8;
        }
    }
    best
}

// ============================================================================
// TESTS
// ============================================================================
