//! Decoded manifest photographs

use std::path::Path;

use image::DynamicImage;

use crate::ScanError;

/// Decoded RGB photograph of a paper manifest
#[derive(Debug, Clone)]
pub struct ScanFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
}

impl ScanFrame {
    /// Create a frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, ScanError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(ScanError::InvalidFrame(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Wrap an already decoded image
    pub fn from_image(img: DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            data: rgb.into_raw(),
            width,
            height,
        }
    }

    /// Decode JPEG/PNG/... bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, ScanError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| ScanError::Decode(e.to_string()))?;
        Ok(Self::from_image(img))
    }

    /// Open and decode an image file
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let img = image::open(path)
            .map_err(|e| ScanError::Decode(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_image(img))
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize * self.width as usize) + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Whether the frame has no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Luminance formula: 0.299*R + 0.587*G + 0.114*B
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114).round() as u8
}
