use image::RgbaImage;

use crate::error::DrawError;
use crate::types::Color;

/// Preprocessed pixel grid with a per-pixel visibility flag. An invisible
/// pixel is background and is never drawn. Dimensions are fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
    visible: Vec<bool>,
}

impl Bitmap {
    /// Row-major pixels, all visible.
    pub fn new(width: u32, height: u32, pixels: Vec<Color>) -> Result<Self, DrawError> {
        let visible = vec![true; pixels.len()];
        Self::with_visibility(width, height, pixels, visible)
    }

    pub fn with_visibility(
        width: u32,
        height: u32,
        pixels: Vec<Color>,
        visible: Vec<bool>,
    ) -> Result<Self, DrawError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected || visible.len() != expected {
            return Err(DrawError::InvalidOption(format!(
                "bitmap {}x{} needs {} pixels, got {} colors and {} flags",
                width, height, expected, pixels.len(), visible.len()
            )));
        }
        Ok(Self { width, height, pixels, visible })
    }

    /// Alpha 0 becomes invisible; any other alpha is visible.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        let mut visible = Vec::with_capacity(pixels.capacity());
        for p in image.pixels() {
            pixels.push(Color::new(p[0], p[1], p[2]));
            visible.push(p[3] != 0);
        }
        Self { width, height, pixels, visible }
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    pub fn is_visible(&self, x: u32, y: u32) -> bool {
        self.visible[self.index(x, y)]
    }

    pub fn visible_count(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }

    /// Row-major `(x, y, color, visible)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, Color, bool)> + '_ {
        let w = self.width.max(1);
        self.pixels
            .iter()
            .zip(&self.visible)
            .enumerate()
            .map(move |(i, (c, v))| ((i as u32) % w, (i as u32) / w, *c, *v))
    }
}
