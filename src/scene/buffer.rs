use std::path::Path;

use image::RgbImage;
use log::debug;

use crate::error::{Error, Result};

/// Value the depth buffer is cleared to. Anything in front of the far plane passes the
/// depth test against it.
pub const DEPTH_CLEAR: f32 = f32::INFINITY;

/// Color and depth buffers of one viewport.
/// Pixel (0, 0) is the bottom left corner; the color data is stored top row first so it
/// can be handed to an image viewer as is.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    color: Vec<u8>,  // rgb8, row-major.
    depth: Vec<f32>, // One value per pixel, same layout as color.
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let n_pixels = (width as usize) * (height as usize);
        return Self {
            width,
            height,
            color: vec![0; 3 * n_pixels],
            depth: vec![DEPTH_CLEAR; n_pixels],
        };
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    /// Reallocates both buffers for the new size. Previous contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) {
        debug!("frame buffer resize {}x{} -> {}x{}", self.width, self.height, width, height);
        *self = FrameBuffer::new(width, height);
    }

    /// Sets all color data to (0, 0, 0).
    pub fn clear_color(&mut self) {
        self.color.fill(0);
    }

    pub fn clear_depth(&mut self) {
        self.depth.fill(DEPTH_CLEAR);
    }

    pub fn clear(&mut self) {
        self.clear_color();
        self.clear_depth();
    }

    /// Rendered image as a slice of 3 * (number of pixels) rgb8 values.
    pub fn as_render_data(&self) -> &[u8] {
        return &self.color[..];
    }

    pub fn depth(&self) -> &[f32] {
        return &self.depth[..];
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        return x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height;
    }

    /// Index of a pixel in the depth buffer; color index is three times this.
    fn index(&self, x: i32, y: i32) -> usize {
        // Forcing (0, 0) to be in the bottom left by inverting y.
        return x as usize + (self.height as usize - 1 - y as usize) * self.width as usize;
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 3]> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let i = 3 * self.index(x, y);
        return Some([self.color[i], self.color[i + 1], self.color[i + 2]]);
    }

    pub fn depth_at(&self, x: i32, y: i32) -> Option<f32> {
        if !self.in_bounds(x, y) {
            return None;
        }
        return Some(self.depth[self.index(x, y)]);
    }

    /// Writes a color without touching the depth buffer. Out of bounds writes are dropped.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: [u8; 3]) {
        if !self.in_bounds(x, y) {
            return;
        }
        let i = 3 * self.index(x, y);
        self.color[i..i + 3].copy_from_slice(&color);
    }

    /// Depth test with "closer wins". On success the new depth is stored and true is
    /// returned; the caller is then expected to write the color.
    pub fn test_and_set_depth(&mut self, x: i32, y: i32, z: f32) -> bool {
        if !self.in_bounds(x, y) || z.is_nan() {
            return false;
        }
        let i = self.index(x, y);
        if z < self.depth[i] {
            self.depth[i] = z;
            return true;
        }
        return false;
    }

    /// Greyscale image of the depth buffer, near is bright. Cleared pixels are black.
    pub fn depth_image_data(&self) -> Vec<u8> {
        let finite = self.depth.iter().filter(|z| z.is_finite());
        let z_min = finite.clone().fold(f32::MAX, |acc, &z| acc.min(z));
        let z_max = finite.fold(f32::MIN, |acc, &z| acc.max(z));
        let scale = if z_max > z_min { z_max - z_min } else { 1.0 };

        let mut data = Vec::with_capacity(3 * self.depth.len());
        for &z in &self.depth {
            let value = if z.is_finite() {
                (255.0 * (1.0 - (z - z_min) / scale)).round() as u8
            } else {
                0
            };
            data.extend_from_slice(&[value, value, value]);
        }
        return data;
    }

    pub fn to_image(&self) -> Result<RgbImage> {
        if self.color.is_empty() {
            return Err(Error::EmptyFrame);
        }
        return RgbImage::from_raw(self.width, self.height, self.color.clone()).ok_or(Error::EmptyFrame);
    }

    /// Saves the color buffer, format is picked from the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_image()?.save(path)?;
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffers_are_cleared() {
        let frame = FrameBuffer::new(4, 3);
        assert_eq!(frame.as_render_data().len(), 36);
        assert_eq!(frame.depth().len(), 12);
        assert!(frame.as_render_data().iter().all(|&c| c == 0));
        assert!(frame.depth().iter().all(|&z| z == DEPTH_CLEAR));
    }

    #[test]
    fn bottom_left_origin_is_stored_last_row() {
        let mut frame = FrameBuffer::new(2, 2);
        frame.set_pixel(0, 0, [1, 2, 3]);
        assert_eq!(&frame.as_render_data()[6..9], &[1, 2, 3]);
        assert_eq!(frame.pixel(0, 0), Some([1, 2, 3]));
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn depth_test_closer_wins() {
        let mut frame = FrameBuffer::new(2, 2);
        assert!(frame.test_and_set_depth(1, 1, 0.5));
        assert!(!frame.test_and_set_depth(1, 1, 0.7));
        assert!(!frame.test_and_set_depth(1, 1, 0.5));
        assert!(frame.test_and_set_depth(1, 1, -0.2));
        assert_eq!(frame.depth_at(1, 1), Some(-0.2));
        assert!(!frame.test_and_set_depth(-1, 0, 0.0));
        assert!(!frame.test_and_set_depth(0, 0, f32::NAN));
    }

    #[test]
    fn resize_replaces_both_buffers() {
        let mut frame = FrameBuffer::new(2, 2);
        frame.set_pixel(1, 1, [9, 9, 9]);
        frame.test_and_set_depth(1, 1, 0.0);
        frame.resize(5, 7);
        assert_eq!((frame.width(), frame.height()), (5, 7));
        assert_eq!(frame.as_render_data().len(), 3 * frame.depth().len());
        assert_eq!(frame.depth().len(), 35);
        assert_eq!(frame.pixel(1, 1), Some([0, 0, 0]));
        assert_eq!(frame.depth_at(1, 1), Some(DEPTH_CLEAR));
    }

    #[test]
    fn clear_resets_contents() {
        let mut frame = FrameBuffer::new(3, 3);
        frame.set_pixel(1, 1, [255, 0, 0]);
        frame.test_and_set_depth(1, 1, 0.3);
        frame.clear();
        assert_eq!(frame.pixel(1, 1), Some([0, 0, 0]));
        assert_eq!(frame.depth_at(1, 1), Some(DEPTH_CLEAR));
    }

    #[test]
    fn depth_image_maps_near_to_bright() {
        let mut frame = FrameBuffer::new(3, 1);
        frame.test_and_set_depth(0, 0, -1.0);
        frame.test_and_set_depth(1, 0, 1.0);
        let data = frame.depth_image_data();
        assert_eq!(&data[0..3], &[255, 255, 255]);
        assert_eq!(&data[3..6], &[0, 0, 0]);
        assert_eq!(&data[6..9], &[0, 0, 0]);
    }

    #[test]
    fn export_matches_color_data() {
        let mut frame = FrameBuffer::new(2, 1);
        frame.set_pixel(1, 0, [10, 20, 30]);
        let image = frame.to_image().unwrap();
        assert_eq!(image.get_pixel(1, 0).0, [10, 20, 30]);
        assert!(FrameBuffer::new(0, 0).to_image().is_err());
    }
}
