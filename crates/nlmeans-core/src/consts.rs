/// Largest 8-bit sample value; stages work on samples divided by this.
pub const MAX_SAMPLE: f32 = 255.0;

/// Slack added before truncating, so a quantity that is an integer up to f32
/// rounding error does not drop to the integer below.
pub const TRUNCATE_SLACK: f32 = 1e-3;

/// Default patch edge length for non-local means (must be odd).
pub const DEFAULT_PATCH_SIZE: usize = 5;

/// Default search window edge length for non-local means (must be odd).
pub const DEFAULT_SEARCH_WINDOW_SIZE: usize = 13;

/// Default filter strength `h`. Smaller values discount dissimilar patches harder.
pub const DEFAULT_STRENGTH: f32 = 0.1;

/// Default sigma of the Gaussian that weighs offsets inside a patch.
pub const DEFAULT_WEIGHING_SIGMA: f32 = 1.5;

/// Edge length of the square output tiles mapped to one accelerator workgroup.
pub const ACCELERATOR_TILE: u32 = 16;

/// Number of adjacent columns the host engine evaluates as one lane group.
pub const HOST_VECTOR_WIDTH: u32 = 4;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;

/// Channel count of a grayscale image.
pub const GRAY_CHANNELS: usize = 1;

/// Channel count of an interleaved RGB image.
pub const RGB_CHANNELS: usize = 3;

/// Per-column intensity step of the synthetic ramp test image.
pub const SYNTHETIC_RAMP_STEP: f32 = 10.0;
