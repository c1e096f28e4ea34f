use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::consts::{GRAY_CHANNELS, MAX_SAMPLE, RGB_CHANNELS, SYNTHETIC_RAMP_STEP};
use crate::error::{NlmError, Result};

/// An 8-bit image with 1 (gray) or 3 (interleaved RGB) channels.
///
/// Samples are stored row-major with shape `(height, width, channels)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    data: Array3<u8>,
}

impl Image {
    pub fn new(data: Array3<u8>) -> Result<Self> {
        let (h, w, c) = data.dim();
        if h == 0 || w == 0 {
            return Err(NlmError::InvalidDimensions {
                width: w,
                height: h,
            });
        }
        if c != GRAY_CHANNELS && c != RGB_CHANNELS {
            return Err(NlmError::UnsupportedChannels(c));
        }
        Ok(Self { data })
    }

    /// Wrap a single-channel `(height, width)` array.
    pub fn from_gray(data: Array2<u8>) -> Result<Self> {
        Self::new(data.insert_axis(Axis(2)))
    }

    /// Build from interleaved row-major samples.
    pub fn from_raw(width: usize, height: usize, channels: usize, samples: Vec<u8>) -> Result<Self> {
        let data = Array3::from_shape_vec((height, width, channels), samples)
            .map_err(|_| NlmError::InvalidDimensions { width, height })?;
        Self::new(data)
    }

    /// Build a grayscale image from a per-pixel function of `(x, y)`.
    pub fn from_fn_gray<F>(width: usize, height: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> u8,
    {
        Self::from_gray(Array2::from_shape_fn((height, width), |(y, x)| f(x, y)))
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }

    /// Sample at an in-range coordinate. Panics when out of range.
    pub fn get(&self, x: usize, y: usize, channel: usize) -> u8 {
        self.data[[y, x, channel]]
    }

    /// Interleaved row-major samples.
    pub fn to_raw(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }
}

/// Rectangular region of output coordinates to realize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Domain {
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
}

impl Domain {
    pub fn new(x: i64, y: i64, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The full extent of `image`, anchored at the origin.
    pub fn of(image: &Image) -> Self {
        Self::new(0, 0, image.width(), image.height())
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Horizontal ramp (`10 * x`) plus the magnitude of approximately Gaussian
/// noise, clamped to the 8-bit range.
///
/// The noise is the sum of three uniforms recentred and scaled by `2 * sigma`.
pub fn synthetic_noisy_image(size: usize, sigma: f32, seed: u64) -> Result<Image> {
    let mut rng = StdRng::seed_from_u64(seed);
    Image::from_fn_gray(size, size, |x, _y| {
        let uniform_sum: f32 = rng.random::<f32>() + rng.random::<f32>() + rng.random::<f32>();
        let noise = ((uniform_sum - 1.5) * 2.0 * sigma).abs();
        (SYNTHETIC_RAMP_STEP * x as f32 + noise).clamp(0.0, MAX_SAMPLE) as u8
    })
}
