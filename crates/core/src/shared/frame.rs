use ndarray::{ArrayView3, Axis};

/// A single camera frame: contiguous pixel bytes in row-major order.
///
/// Pixel layout is fixed at the capture boundary (1 channel = grey,
/// 2 = grey + alpha, 3 = RGB, 4 = RGBA); decoders only ever ask for
/// [`Frame::to_luma`].
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Sequence number assigned by the frame source.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Returns one luminance byte per pixel, row-major.
    ///
    /// Colour frames use the integer BT.601 weights. Grey frames, with or
    /// without alpha, pass their grey channel through. Alpha is ignored.
    pub fn to_luma(&self) -> Vec<u8> {
        if self.channels == 1 {
            return self.data.clone();
        }
        self.as_ndarray()
            .lanes(Axis(2))
            .into_iter()
            .map(|px| match px.len() {
                0 => 0,
                1 | 2 => px[0],
                _ => {
                    let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                    ((77 * r + 150 * g + 29 * b) >> 8) as u8
                }
            })
            .collect()
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
