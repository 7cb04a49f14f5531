use std::time::Duration;

use rgb::RGB8;

/// Rendered text plus the presentation state that changes while it is shown.
#[derive(Debug)]
pub struct TextRaster {
    pixels: Box<[u8]>,
    width: usize,
    height: usize,
    want_flash: bool,
    is_idle: bool,
    duration_left_us: i64,
    priority: i32,
    end_of_line: bool,
    source: String,
    scroll: bool,
    transparent: bool,
}

/// Presentation flags decided while rasterizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFlags {
    pub want_flash: bool,
    pub is_idle: bool,
    pub duration_us: i64,
    pub priority: i32,
    pub scroll: bool,
    pub transparent: bool,
}

impl Default for RasterFlags {
    fn default() -> Self {
        Self {
            want_flash: false,
            is_idle: false,
            duration_us: DEFAULT_DURATION_US,
            priority: 0,
            scroll: true,
            transparent: false,
        }
    }
}

pub const DEFAULT_DURATION_US: i64 = 10_000_000;

impl TextRaster {
    pub fn new(
        pixels: Box<[u8]>,
        width: usize,
        height: usize,
        flags: RasterFlags,
        source: String,
    ) -> Self {
        debug_assert_eq!(pixels.len(), width * height * 3);

        tracing::debug!(
            width,
            height,
            flash = flags.want_flash,
            idle = flags.is_idle,
            duration_s = flags.duration_us as f64 / 1_000_000.0,
            priority = flags.priority,
            scroll = flags.scroll,
            text = %source,
            "New text raster"
        );

        Self {
            pixels,
            width,
            height,
            want_flash: flags.want_flash,
            is_idle: flags.is_idle,
            duration_left_us: flags.duration_us,
            priority: flags.priority,
            end_of_line: false,
            source,
            scroll: flags.scroll,
            transparent: flags.transparent,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<RGB8> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let o = (y * self.width + x) * 3;
        Some(RGB8::new(
            self.pixels[o],
            self.pixels[o + 1],
            self.pixels[o + 2],
        ))
    }

    /// Returns whether a flash was requested, and clears the request.
    pub fn take_flash(&mut self) -> bool {
        std::mem::take(&mut self.want_flash)
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    #[inline]
    pub fn duration_left_us(&self) -> i64 {
        self.duration_left_us
    }

    pub fn decrease_duration(&mut self, by: Duration) {
        let by = i64::try_from(by.as_micros()).unwrap_or(i64::MAX);
        self.duration_left_us = self.duration_left_us.saturating_sub(by);
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[inline]
    #[cfg(test)]
    pub fn end_of_line(&self) -> bool {
        self.end_of_line
    }

    pub fn set_end_of_line(&mut self) {
        self.end_of_line = true;
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn scroll_required(&self) -> bool {
        self.scroll
    }

    #[inline]
    pub fn transparent(&self) -> bool {
        self.transparent
    }

    /// An entry may leave the registry once its time is up and it was shown
    /// completely at least once.
    pub fn is_expired(&self) -> bool {
        self.duration_left_us <= 0 && self.end_of_line
    }
}
