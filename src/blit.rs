use crate::buffer::is_black;
use crate::buffer::PixelBuffer;
use crate::raster::TextRaster;

/// Area of a raster to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl SourceRect {
    pub fn whole(raster: &TextRaster) -> Self {
        Self {
            x: 0,
            y: 0,
            width: raster.width() as i32,
            height: raster.height() as i32,
        }
    }

    /// Intersect with the raster bounds, returning `(x0, y0, x1, y1)`.
    fn clamp_to(self, raster: &TextRaster) -> (i32, i32, i32, i32) {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self.x.saturating_add(self.width).min(raster.width() as i32);
        let y1 = self.y.saturating_add(self.height).min(raster.height() as i32);
        (x0, y0, x1, y1)
    }
}

/// Copy `source` of `raster` into `dest` with its top-left corner at
/// `(target_x, target_y)`.
///
/// Pixels landing outside `dest` are dropped one by one. With `transparent`
/// set, black raster pixels leave the destination untouched.
pub fn blit(
    dest: &mut PixelBuffer,
    raster: &TextRaster,
    target_x: i32,
    target_y: i32,
    source: SourceRect,
    transparent: bool,
) {
    let (x0, y0, x1, y1) = source.clamp_to(raster);

    for sy in y0..y1 {
        let ty = target_y.saturating_add(sy - source.y);

        for sx in x0..x1 {
            let tx = target_x.saturating_add(sx - source.x);

            let Some(rgb) = raster.pixel(sx as usize, sy as usize) else {
                continue;
            };

            if transparent && is_black(rgb) {
                continue;
            }

            dest.set(tx, ty, rgb);
        }
    }
}
