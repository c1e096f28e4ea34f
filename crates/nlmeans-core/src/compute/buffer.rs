//! Image buffers shared between host and device memory.
//!
//! Every transfer across the host/device boundary is an explicit call; reading
//! a side whose copy is stale is an error rather than silently returning old
//! data.

use tracing::debug;

use crate::error::{NlmError, Result};
use crate::image::Image;

use super::ExecutionEngine;

/// Which copy of a buffer is authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// The host copy was written; the device copy is missing or stale.
    HostOwned,
    /// The device copy was written; the host copy is stale.
    DeviceOwned,
    /// Both copies hold the same data.
    Synced,
}

/// Device-side storage, one `u32` word per sample.
pub enum DeviceAllocation {
    /// Device-layout words kept in host memory, used by engines without an
    /// accelerator.
    Mirror(Vec<u32>),
    #[cfg(feature = "gpu")]
    Wgpu(wgpu::Buffer),
}

impl std::fmt::Debug for DeviceAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mirror(words) => write!(f, "Mirror({} words)", words.len()),
            #[cfg(feature = "gpu")]
            Self::Wgpu(buffer) => write!(f, "Wgpu({} bytes)", buffer.size()),
        }
    }
}

/// An image with an optional device copy and an explicit sync state.
#[derive(Debug)]
pub struct ImageBuffer {
    host: Image,
    device: Option<DeviceAllocation>,
    state: SyncState,
}

impl ImageBuffer {
    /// Wrap a freshly written host image. The buffer starts host-dirty.
    pub fn new(host: Image) -> Self {
        Self {
            host,
            device: None,
            state: SyncState::HostOwned,
        }
    }

    /// Wrap device output. The host copy is a zeroed placeholder until
    /// [`copy_device_to_host`](Self::copy_device_to_host) runs.
    pub(crate) fn from_device(
        allocation: DeviceAllocation,
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<Self> {
        let host = Image::from_raw(width, height, channels, vec![0; width * height * channels])?;
        Ok(Self {
            host,
            device: Some(allocation),
            state: SyncState::DeviceOwned,
        })
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_host_dirty(&self) -> bool {
        self.state == SyncState::HostOwned
    }

    pub fn is_device_dirty(&self) -> bool {
        self.state == SyncState::DeviceOwned
    }

    pub fn width(&self) -> usize {
        self.host.width()
    }

    pub fn height(&self) -> usize {
        self.host.height()
    }

    pub fn channels(&self) -> usize {
        self.host.channels()
    }

    /// Record that the host copy changed.
    pub fn mark_host_dirty(&mut self) {
        self.state = SyncState::HostOwned;
    }

    /// Record that the device copy changed. Fails if the host copy holds
    /// unsynced writes, since both sides cannot be dirty at once.
    pub fn mark_device_dirty(&mut self) -> Result<()> {
        if self.device.is_none() || self.state == SyncState::HostOwned {
            return Err(NlmError::DeviceNotSynced);
        }
        self.state = SyncState::DeviceOwned;
        Ok(())
    }

    /// Host copy, unless the device holds newer data.
    pub fn host(&self) -> Result<&Image> {
        match self.state {
            SyncState::DeviceOwned => Err(NlmError::StaleHostData),
            _ => Ok(&self.host),
        }
    }

    /// Mutable host copy. Marks the buffer host-dirty.
    pub fn host_mut(&mut self) -> Result<&mut Image> {
        if self.state == SyncState::DeviceOwned {
            return Err(NlmError::StaleHostData);
        }
        self.mark_host_dirty();
        Ok(&mut self.host)
    }

    /// Device copy, unless the host holds newer data.
    pub fn device(&self) -> Result<&DeviceAllocation> {
        match (&self.device, self.state) {
            (Some(allocation), SyncState::DeviceOwned | SyncState::Synced) => Ok(allocation),
            _ => Err(NlmError::DeviceNotSynced),
        }
    }

    /// Upload the host copy if it is dirty.
    pub fn copy_host_to_device(&mut self, engine: &dyn ExecutionEngine) -> Result<()> {
        match self.state {
            SyncState::HostOwned => {
                debug!(
                    width = self.host.width(),
                    height = self.host.height(),
                    engine = engine.name(),
                    "Copying buffer host to device"
                );
                self.device = Some(engine.upload(&self.host)?);
                self.state = SyncState::Synced;
                Ok(())
            }
            SyncState::DeviceOwned => Err(NlmError::StaleHostData),
            SyncState::Synced => Ok(()),
        }
    }

    /// Download the device copy if it is dirty. Blocks until the device has
    /// finished writing it.
    pub fn copy_device_to_host(&mut self, engine: &dyn ExecutionEngine) -> Result<()> {
        if self.state != SyncState::DeviceOwned {
            return Ok(());
        }
        let allocation = self.device.as_ref().ok_or(NlmError::DeviceNotSynced)?;
        debug!(
            width = self.host.width(),
            height = self.host.height(),
            engine = engine.name(),
            "Copying buffer device to host"
        );
        self.host = engine.download(
            allocation,
            self.host.width(),
            self.host.height(),
            self.host.channels(),
        )?;
        self.state = SyncState::Synced;
        Ok(())
    }

    /// Consume the buffer, returning the host copy if it is current.
    pub fn into_host(self) -> Result<Image> {
        match self.state {
            SyncState::DeviceOwned => Err(NlmError::StaleHostData),
            _ => Ok(self.host),
        }
    }
}

/// Widen samples to the one-word-per-sample device layout.
pub(crate) fn to_words(image: &Image) -> Vec<u32> {
    image.data().iter().map(|&v| v as u32).collect()
}

/// Narrow device words back into an image, saturating at 255.
pub(crate) fn from_words(words: &[u32], width: usize, height: usize, channels: usize) -> Result<Image> {
    let expected = width * height * channels;
    if words.len() < expected {
        return Err(NlmError::RuntimeFailure(format!(
            "device buffer holds {} samples, expected {expected}",
            words.len()
        )));
    }
    let samples = words[..expected].iter().map(|&w| w.min(255) as u8).collect();
    Image::from_raw(width, height, channels, samples)
}
