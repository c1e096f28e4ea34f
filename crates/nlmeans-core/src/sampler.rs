use crate::consts::MAX_SAMPLE;
use crate::image::Image;

/// Reads an image at arbitrary integer coordinates, repeating edge pixels
/// outside `[0, width) x [0, height)`.
#[derive(Clone, Copy, Debug)]
pub struct BoundarySampler<'a> {
    image: &'a Image,
    channel: usize,
}

impl<'a> BoundarySampler<'a> {
    pub fn new(image: &'a Image) -> Self {
        Self::with_channel(image, 0)
    }

    pub fn with_channel(image: &'a Image, channel: usize) -> Self {
        Self { image, channel }
    }

    /// Raw sample with each axis clamped independently to the nearest valid index.
    pub fn sample(&self, x: i64, y: i64) -> u8 {
        let cx = x.clamp(0, self.image.width() as i64 - 1) as usize;
        let cy = y.clamp(0, self.image.height() as i64 - 1) as usize;
        self.image.get(cx, cy, self.channel)
    }

    /// Clamped sample scaled to `[0, 1]`.
    pub fn sample_normalized(&self, x: i64, y: i64) -> f32 {
        self.sample(x, y) as f32 / MAX_SAMPLE
    }
}
