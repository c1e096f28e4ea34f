use std::path::Path;

use image::{DynamicImage, ExtendedColorType, ImageFormat};
use tracing::debug;

use crate::error::{NlmError, Result};
use crate::image::Image;

/// Load an 8-bit image. Single-channel files stay gray; everything else is
/// converted to RGB.
pub fn load_image(path: &Path) -> Result<Image> {
    let img = image::open(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);

    let image = match &img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_) => {
            Image::from_raw(w, h, 1, img.to_luma8().into_raw())?
        }
        _ => Image::from_raw(w, h, 3, img.to_rgb8().into_raw())?,
    };
    debug!(
        path = %path.display(),
        width = w,
        height = h,
        channels = image.channels(),
        "Loaded image"
    );
    Ok(image)
}

/// Save an image as 8-bit PNG (gray or RGB by channel count).
pub fn save_png(image: &Image, path: &Path) -> Result<()> {
    save_with_format(image, path, ImageFormat::Png)
}

/// Save an image, choosing the format from the file extension. Unknown
/// extensions are written as PNG.
pub fn save_image(image: &Image, path: &Path) -> Result<()> {
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .unwrap_or(ImageFormat::Png);
    save_with_format(image, path, format)
}

fn save_with_format(image: &Image, path: &Path, format: ImageFormat) -> Result<()> {
    let color = match image.channels() {
        1 => ExtendedColorType::L8,
        3 => ExtendedColorType::Rgb8,
        c => return Err(NlmError::UnsupportedChannels(c)),
    };
    image::save_buffer_with_format(
        path,
        &image.to_raw(),
        image.width() as u32,
        image.height() as u32,
        color,
        format,
    )?;
    Ok(())
}
