use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
    #[error("frame source has not been acquired")]
    NotAcquired,
    #[error("frame source has no more frames")]
    EndOfStream,
    #[error("failed to read frame {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A live feed of frames, such as a camera.
///
/// The handle is exclusively owned by one scan session: it is acquired when
/// scanning starts and released when scanning stops, so the next session can
/// acquire the device again.
pub trait FrameSource: Send {
    /// Opens the underlying device and waits until it can deliver frames.
    fn acquire(&mut self) -> Result<(), CaptureError>;

    /// Returns the current frame.
    fn grab(&mut self) -> Result<Frame, CaptureError>;

    /// Releases the underlying device. Safe to call more than once.
    fn release(&mut self);
}
