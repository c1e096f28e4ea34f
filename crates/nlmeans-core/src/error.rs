use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Unsupported channel count: {0} (expected 1 or 3)")]
    UnsupportedChannels(usize),

    #[error("Patch size must be a positive odd number, got {0}")]
    EvenPatchSize(usize),

    #[error("Search window size must be a positive odd number, got {0}")]
    EvenSearchWindow(usize),

    #[error("Filter strength h must be positive, got {0}")]
    NonPositiveStrength(f32),

    #[error("Weighing Gaussian sigma must be positive, got {0}")]
    NonPositiveSigma(f32),

    #[error("Pipeline '{pipeline}' requires {expected}-channel input, got {actual}")]
    ChannelMismatch {
        pipeline: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown pipeline: {0} (expected 'nonlocalmeans' or 'colortogray')")]
    UnknownPipeline(String),

    #[error("Compile failure: {0}")]
    CompileFailure(String),

    #[error("Runtime failure: {0}")]
    RuntimeFailure(String),

    #[error("Host copy is stale; copy device to host before reading")]
    StaleHostData,

    #[error("Device copy is missing or stale; copy host to device first")]
    DeviceNotSynced,
}

impl NlmError {
    /// True for errors raised while validating pipeline parameters or input.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimensions { .. }
                | Self::UnsupportedChannels(_)
                | Self::EvenPatchSize(_)
                | Self::EvenSearchWindow(_)
                | Self::NonPositiveStrength(_)
                | Self::NonPositiveSigma(_)
                | Self::ChannelMismatch { .. }
                | Self::UnknownPipeline(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NlmError>;
