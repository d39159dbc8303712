//! Histogram Engine
//!
//! 256-bin intensity histograms (per channel or luminance) plus the two
//! histogram-driven transforms: linear stretch and CDF equalization.
//! Histograms are cheap and always recomputed; nothing is cached.

use serde::{Deserialize, Serialize};
use log::debug;
use crate::buffer::{luminance, PixelBuffer};

// ============================================================================
// CHANNEL SELECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Offset of this channel inside an interleaved RGB pixel
    pub fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// Which channels a histogram transform touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSelection {
    Red,
    Green,
    Blue,
    /// R, then G, then B, each on the previous result
    #[default]
    All,
}

impl ChannelSelection {
    fn channels(self) -> &'static [Channel] {
        match self {
            ChannelSelection::Red => &[Channel::Red],
            ChannelSelection::Green => &[Channel::Green],
            ChannelSelection::Blue => &[Channel::Blue],
            ChannelSelection::All => &Channel::ALL,
        }
    }
}

impl From<Channel> for ChannelSelection {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Red => ChannelSelection::Red,
            Channel::Green => ChannelSelection::Green,
            Channel::Blue => ChannelSelection::Blue,
        }
    }
}

// ============================================================================
// HISTOGRAM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram([u64; 256]);

impl Histogram {
    pub fn from_counts(counts: [u64; 256]) -> Self {
        Self(counts)
    }

    pub fn counts(&self) -> &[u64; 256] {
        &self.0
    }

    pub fn count(&self, level: u8) -> u64 {
        self.0[level as usize]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Lowest level with a nonzero count
    pub fn min_level(&self) -> Option<u8> {
        self.0.iter().position(|&c| c > 0).map(|i| i as u8)
    }

    /// Highest level with a nonzero count
    pub fn max_level(&self) -> Option<u8> {
        self.0.iter().rposition(|&c| c > 0).map(|i| i as u8)
    }

    /// Running sum of counts, `cdf[i] = sum(hist[0..=i])`
    pub fn cumulative(&self) -> [u64; 256] {
        let mut cdf = [0u64; 256];
        let mut acc = 0u64;
        for (i, &c) in self.0.iter().enumerate() {
            acc += c;
            cdf[i] = acc;
        }
        cdf
    }

    /// `sum(level * count)`
    pub fn weighted_sum(&self) -> u64 {
        self.0.iter().enumerate().map(|(i, &c)| i as u64 * c).sum()
    }
}

/// Histogram of a single interleaved channel
pub fn compute_histogram(img: &PixelBuffer, channel: Channel) -> Histogram {
    let mut hist = [0u64; 256];
    for &v in img.as_bytes().iter().skip(channel.index()).step_by(3) {
        hist[v as usize] += 1;
    }
    Histogram(hist)
}

/// Histogram of truncated luminance
pub fn compute_histogram_grayscale(img: &PixelBuffer) -> Histogram {
    let mut hist = [0u64; 256];
    for (r, g, b) in img.iter_pixels() {
        hist[luminance(r, g, b) as usize] += 1;
    }
    Histogram(hist)
}

// ============================================================================
// TRANSFORMS
// ============================================================================

/// Remap one channel through a 256-entry table, other channels copied
fn remap_channel(img: &PixelBuffer, channel: Channel, lut: &[u8; 256]) -> PixelBuffer {
    let mut data = img.as_bytes().to_vec();
    for v in data.iter_mut().skip(channel.index()).step_by(3) {
        *v = lut[*v as usize];
    }
    img.with_data(data)
}

/// Linear stretch of the occupied range to [0, 255]
pub fn stretch(img: &PixelBuffer, selection: ChannelSelection) -> PixelBuffer {
    selection
        .channels()
        .iter()
        .fold(img.clone(), |acc, &ch| stretch_channel(&acc, ch))
}

fn stretch_channel(img: &PixelBuffer, channel: Channel) -> PixelBuffer {
    let hist = compute_histogram(img, channel);
    let (min, max) = match (hist.min_level(), hist.max_level()) {
        (Some(lo), Some(hi)) => (lo as f64, hi as f64),
        _ => return img.clone(),
    };
    if min >= max {
        return img.clone();
    }
    debug!("stretch {:?}: [{}, {}] -> [0, 255]", channel, min, max);

    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = img.clamp((i as f64 - min) * 255.0 / (max - min));
    }
    remap_channel(img, channel, &lut)
}

/// Histogram equalization through the normalized CDF
pub fn equalize(img: &PixelBuffer, selection: ChannelSelection) -> PixelBuffer {
    selection
        .channels()
        .iter()
        .fold(img.clone(), |acc, &ch| equalize_channel(&acc, ch))
}

fn equalize_channel(img: &PixelBuffer, channel: Channel) -> PixelBuffer {
    let hist = compute_histogram(img, channel);
    let total = img.pixel_count() as u64;
    let cdf = hist.cumulative();
    let cdf_min = match hist.min_level() {
        Some(level) => cdf[level as usize],
        None => return img.clone(),
    };
    if cdf_min >= total {
        return img.clone();
    }
    debug!("equalize {:?}: cdf_min={} total={}", channel, cdf_min, total);

    let span = (total - cdf_min) as f64;
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = img.clamp((cdf[i] as f64 - cdf_min as f64) * 255.0 / span);
    }
    remap_channel(img, channel, &lut)
}

// ============================================================================
// TESTS
// ============================================================================
