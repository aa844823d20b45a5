use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Replays a directory of still images as if it were a live camera.
///
/// Files are served in file-name order, one per [`FrameSource::grab`]. With
/// `looping` enabled the sequence restarts after the last image; otherwise
/// the source reports [`CaptureError::EndOfStream`].
pub struct ImageSequenceSource {
    dir: PathBuf,
    looping: bool,
    files: Option<Vec<PathBuf>>,
    cursor: usize,
    grabbed: usize,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            looping: false,
            files: None,
            cursor: 0,
            grabbed: 0,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| CaptureError::Unavailable(format!("{}: {e}", dir.display())))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_frame(path: &Path, index: usize) -> Result<Frame, CaptureError> {
    let img = image::open(path)
        .map_err(|source| CaptureError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, index))
}

impl FrameSource for ImageSequenceSource {
    fn acquire(&mut self) -> Result<(), CaptureError> {
        let files = list_images(&self.dir)?;
        if files.is_empty() {
            return Err(CaptureError::Unavailable(format!(
                "no images found in {}",
                self.dir.display()
            )));
        }
        log::debug!(
            "Acquired {} frames from {}",
            files.len(),
            self.dir.display()
        );
        self.files = Some(files);
        self.cursor = 0;
        self.grabbed = 0;
        Ok(())
    }

    fn grab(&mut self) -> Result<Frame, CaptureError> {
        let files = self.files.as_ref().ok_or(CaptureError::NotAcquired)?;
        if self.cursor >= files.len() {
            if !self.looping {
                return Err(CaptureError::EndOfStream);
            }
            self.cursor = 0;
        }
        // Advance first so an unreadable file is skipped on the next grab.
        let path = &files[self.cursor];
        let index = self.grabbed;
        self.cursor += 1;
        self.grabbed += 1;
        load_frame(path, index)
    }

    fn release(&mut self) {
        self.files = None;
        self.cursor = 0;
    }
}
