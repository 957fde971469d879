//! Ink filter and contrast correction
//!
//! Colored pen marks (checkmarks, ticks, circled entries) are lifted toward
//! the paper brightness using the pixel's brightest channel, so saturated
//! red/blue/green strokes fade while neutral black and gray print keeps its
//! luminance. Where ink crosses printed characters the combined pixel stays
//! dark in every channel and the stroke survives.

use image::{GrayImage, Luma};

use crate::config::ScanConfig;
use crate::frame::{luminance, ScanFrame};

/// Ink removal plus gamma correction, precomputed from the scan config
#[derive(Debug, Clone)]
pub struct InkFilter {
    chroma_threshold: u8,
    ink_lift: f32,
    print_floor: u8,
    gamma_lut: [u8; 256],
}

impl InkFilter {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            chroma_threshold: config.chroma_threshold,
            ink_lift: config.ink_lift.clamp(0.0, 1.0),
            print_floor: config.print_floor,
            gamma_lut: gamma_table(config.gamma),
        }
    }

    /// Ink removal followed by contrast normalization
    pub fn apply(&self, frame: &ScanFrame) -> GrayImage {
        GrayImage::from_fn(frame.width, frame.height, |x, y| {
            let [r, g, b] = frame.get_pixel(x, y).unwrap_or([255, 255, 255]);
            let value = self.neutralize(r, g, b);
            Luma([self.gamma_lut[value as usize]])
        })
    }

    /// Gray value of a single pixel with colored ink suppressed
    pub fn neutralize(&self, r: u8, g: u8, b: u8) -> u8 {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let chroma = max - min;

        if chroma < self.chroma_threshold || max < self.print_floor {
            return luminance(r, g, b);
        }

        let lifted = max as f32 + (255.0 - max as f32) * self.ink_lift;
        lifted.round().min(255.0) as u8
    }
}

/// Lookup table for `255 * (v / 255) ^ gamma`
fn gamma_table(gamma: f32) -> [u8; 256] {
    let gamma = if gamma.is_finite() && gamma > 0.0 {
        gamma
    } else {
        1.0
    };

    let mut table = [0u8; 256];
    for (value, slot) in table.iter_mut().enumerate() {
        let normalized = value as f32 / 255.0;
        *slot = (normalized.powf(gamma) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> InkFilter {
        InkFilter::new(&ScanConfig::default())
    }

    #[test]
    fn test_neutral_print_keeps_luminance() {
        let f = filter();
        assert_eq!(f.neutralize(20, 20, 20), 20);
        assert_eq!(f.neutralize(150, 150, 150), 150);
        assert_eq!(f.neutralize(255, 255, 255), 255);
    }

    #[test]
    fn test_colored_ink_lifted() {
        let f = filter();
        // red felt-tip, blue ballpoint, green highlighter
        for (r, g, b) in [(200, 40, 40), (20, 30, 110), (60, 190, 70)] {
            let out = f.neutralize(r, g, b);
            assert!(out > 220, "({r},{g},{b}) -> {out}");
            assert!(out > luminance(r, g, b));
        }
    }

    #[test]
    fn test_ink_over_print_stays_dark() {
        let f = filter();
        // red ink crossing a black stroke
        assert!(f.neutralize(55, 10, 10) < 40);
    }

    #[test]
    fn test_gamma_darkens_midtones() {
        let table = gamma_table(1.6);
        assert_eq!(table[0], 0);
        assert_eq!(table[255], 255);
        assert!(table[180] < 180);

        let identity = gamma_table(f32::NAN);
        assert_eq!(identity[128], 128);
    }

    #[test]
    fn test_apply_removes_ink_and_keeps_text() {
        // white paper, black text pixel, red tick pixel
        let frame = ScanFrame::new(
            vec![255, 255, 255, 10, 10, 10, 210, 30, 30],
            3,
            1,
        )
        .unwrap();
        let out = filter().apply(&frame);
        assert_eq!(out.get_pixel(0, 0).0, [255]);
        assert!(out.get_pixel(1, 0).0[0] < 10);
        assert!(out.get_pixel(2, 0).0[0] > 200);
    }
}
