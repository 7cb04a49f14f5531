use rgb::RGB8;

use super::Display;
use super::DisplayError;
use crate::buffer::PixelBuffer;

/// Keeps the last frame in memory instead of showing it anywhere.
#[derive(Debug)]
pub struct HeadlessDisplay {
    frame: PixelBuffer,
    frames: u64,
}

impl HeadlessDisplay {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            frame: PixelBuffer::new(width, height),
            frames: 0,
        }
    }

    #[cfg(test)]
    pub fn frame(&self) -> &PixelBuffer {
        &self.frame
    }

    /// Number of frames presented so far, fills included.
    #[cfg(test)]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Display for HeadlessDisplay {
    fn present(&mut self, frame: &PixelBuffer) -> Result<(), DisplayError> {
        self.frame.copy_from(frame);
        self.frames += 1;
        tracing::trace!(frames = self.frames, "Presented frame");
        Ok(())
    }

    fn fill(&mut self, color: RGB8) -> Result<(), DisplayError> {
        self.frame.fill(color);
        self.frames += 1;
        Ok(())
    }
}
