use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DecodeError {
    /// No code located in the frame. Expected on most frames; not a failure.
    #[error("no code found in frame")]
    NotFound,
    #[error("code located but could not be read: {0}")]
    Malformed(String),
    #[error("decoder failure: {0}")]
    Backend(String),
}

impl DecodeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DecodeError::NotFound)
    }
}

/// Domain interface for reading a barcode out of one frame.
///
/// Implementations may keep state between frames, hence `&mut self`.
pub trait CodeDecoder: Send {
    fn decode(&mut self, frame: &Frame) -> Result<String, DecodeError>;
}
