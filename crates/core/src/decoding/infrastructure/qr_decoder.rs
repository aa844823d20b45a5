use crate::decoding::domain::code_decoder::{CodeDecoder, DecodeError};
use crate::shared::frame::Frame;

/// QR code reader backed by `rqrr`.
///
/// The frame is reduced to luminance, every candidate grid is tried in
/// detection order and the first one that decodes wins.
#[derive(Debug, Default)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl CodeDecoder for QrDecoder {
    fn decode(&mut self, frame: &Frame) -> Result<String, DecodeError> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        if width == 0 || height == 0 {
            return Err(DecodeError::NotFound);
        }

        let luma = frame.to_luma();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Err(DecodeError::NotFound);
        }

        let mut last_error = None;
        for grid in &grids {
            match grid.decode() {
                Ok((_meta, content)) => return Ok(content),
                Err(e) => last_error = Some(format!("{e:?}")),
            }
        }
        log::debug!("{} QR grid(s) located but none decoded", grids.len());
        Err(DecodeError::Malformed(
            last_error.unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}
