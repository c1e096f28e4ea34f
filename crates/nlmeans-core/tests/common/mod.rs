#![allow(dead_code)]

use std::sync::Arc;

use nlmeans_core::image::Image;

/// Single-channel image from a row-major list of rows.
pub fn gray_image(rows: &[&[u8]]) -> Image {
    let height = rows.len();
    let width = rows[0].len();
    let samples = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Image::from_raw(width, height, 1, samples).unwrap()
}

/// Single-channel image with every sample equal to `value`.
pub fn constant_image(width: usize, height: usize, value: u8) -> Image {
    Image::from_fn_gray(width, height, |_, _| value).unwrap()
}

/// Alternating `low`/`high` checkerboard; `(0, 0)` is `low`.
pub fn checkerboard(width: usize, height: usize, low: u8, high: u8) -> Image {
    Image::from_fn_gray(width, height, |x, y| if (x + y) % 2 == 0 { low } else { high }).unwrap()
}

/// Deterministic gray texture with structure in both axes.
pub fn textured_image(width: usize, height: usize) -> Image {
    Image::from_fn_gray(width, height, |x, y| ((x * 37 + y * 91 + x * y * 13) % 256) as u8).unwrap()
}

/// Three-channel image with every pixel set to `rgb`.
pub fn solid_rgb(width: usize, height: usize, rgb: [u8; 3]) -> Image {
    let samples = (0..width * height).flat_map(|_| rgb).collect();
    Image::from_raw(width, height, 3, samples).unwrap()
}

/// Three-channel image with a distinct color per pixel.
pub fn rgb_gradient(width: usize, height: usize) -> Image {
    let samples = (0..height)
        .flat_map(|y| {
            (0..width).flat_map(move |x| {
                [
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    ((x * 7 + y * 11) % 256) as u8,
                ]
            })
        })
        .collect();
    Image::from_raw(width, height, 3, samples).unwrap()
}

pub fn shared(image: Image) -> Arc<Image> {
    Arc::new(image)
}
