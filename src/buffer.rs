use rgb::RGB8;

/// A fixed-size RGB raster.
///
/// Coordinates are signed so that network supplied values can be passed
/// through unchecked: reads outside the raster return `None`, writes outside
/// the raster are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 3],
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

    #[inline]
    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;

        (x < self.width && y < self.height).then(|| (y * self.width + x) * 3)
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<RGB8> {
        let o = self.offset(x, y)?;
        Some(RGB8::new(
            self.pixels[o],
            self.pixels[o + 1],
            self.pixels[o + 2],
        ))
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, rgb: RGB8) {
        if let Some(o) = self.offset(x, y) {
            self.pixels[o] = rgb.r;
            self.pixels[o + 1] = rgb.g;
            self.pixels[o + 2] = rgb.b;
        }
    }

    /// Copy the contents of `other` into this buffer.
    ///
    /// Both buffers are expected to have the same dimensions. If they do not,
    /// only the overlapping top-left region is copied.
    pub fn copy_from(&mut self, other: &PixelBuffer) {
        if self.width == other.width && self.height == other.height {
            self.pixels.copy_from_slice(&other.pixels);
            return;
        }

        tracing::debug!(
            dst = ?(self.width, self.height),
            src = ?(other.width, other.height),
            "Copying between buffers of different size"
        );

        let row_bytes = self.width.min(other.width) * 3;
        for y in 0..self.height.min(other.height) {
            let dst = y * self.width * 3;
            let src = y * other.width * 3;
            self.pixels[dst..dst + row_bytes].copy_from_slice(&other.pixels[src..src + row_bytes]);
        }
    }

    /// Draw every non-black pixel of `other` over this buffer.
    pub fn overlay(&mut self, other: &PixelBuffer) {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                match other.get(x, y) {
                    Some(rgb) if !is_black(rgb) => self.set(x, y, rgb),
                    _ => {}
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn fill(&mut self, rgb: RGB8) {
        for chunk in self.pixels.chunks_exact_mut(3) {
            chunk.copy_from_slice(&[rgb.r, rgb.g, rgb.b]);
        }
    }

    /// One step of exponential decay towards black.
    pub fn fade(&mut self) {
        for v in self.pixels.iter_mut() {
            *v = fade_value(*v);
        }
    }

    /// Iterate all pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = RGB8> + '_ {
        self.pixels
            .chunks_exact(3)
            .map(|c| RGB8::new(c[0], c[1], c[2]))
    }
}

#[inline]
pub fn is_black(rgb: RGB8) -> bool {
    rgb.r == 0 && rgb.g == 0 && rgb.b == 0
}

#[inline]
fn fade_value(v: u8) -> u8 {
    // 255 * 123 / 124 fits into u8 again
    (u16::from(v) * 123 / 124) as u8
}
