use embedded_graphics::mono_font::MonoFont;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::DrawTarget;
use embedded_graphics::prelude::OriginDimensions;
use embedded_graphics::prelude::Point;
use embedded_graphics::prelude::Size;
use embedded_graphics::text::Baseline;
use embedded_graphics::text::Text;
use embedded_graphics::Drawable;
use embedded_graphics::Pixel;

use super::Glyph;
use super::GlyphSource;

/// Builtin bitmap fonts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum Font {
    Font4x6,
    Font5x8,
    #[default]
    Font6x10,
    Font6x13,
    Font7x13,
    Font8x13,
    Font9x15,
    Font10x20,
}

impl From<Font> for MonoFont<'static> {
    fn from(value: Font) -> Self {
        use embedded_graphics::mono_font::iso_8859_1;

        match value {
            Font::Font4x6 => iso_8859_1::FONT_4X6,
            Font::Font5x8 => iso_8859_1::FONT_5X8,
            Font::Font6x10 => iso_8859_1::FONT_6X10,
            Font::Font6x13 => iso_8859_1::FONT_6X13,
            Font::Font7x13 => iso_8859_1::FONT_7X13,
            Font::Font8x13 => iso_8859_1::FONT_8X13,
            Font::Font9x15 => iso_8859_1::FONT_9X15,
            Font::Font10x20 => iso_8859_1::FONT_10X20,
        }
    }
}

/// A bitmap font blown up by an integer factor towards the target height.
pub struct MonoFace {
    font: MonoFont<'static>,
    scale: usize,
}

impl MonoFace {
    pub fn new(font: Font, target_height: usize) -> Self {
        let font = MonoFont::from(font);
        let glyph_height = (font.character_size.height as usize).max(1);

        Self {
            font,
            scale: (target_height / glyph_height).max(1),
        }
    }
}

/// Collects the lit pixels of a single character cell.
struct GlyphCanvas {
    width: usize,
    height: usize,
    coverage: Vec<u8>,
}

impl OriginDimensions for GlyphCanvas {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl DrawTarget for GlyphCanvas {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (usize::try_from(point.x), usize::try_from(point.y)) else {
                continue;
            };

            if x < self.width && y < self.height && color.is_on() {
                self.coverage[y * self.width + x] = 255;
            }
        }
        Ok(())
    }
}

impl GlyphSource for MonoFace {
    fn glyph(&self, c: char, _antialias: bool) -> Option<Glyph> {
        let cell_w = self.font.character_size.width as usize;
        let cell_h = self.font.character_size.height as usize;

        let mut canvas = GlyphCanvas {
            width: cell_w,
            height: cell_h,
            coverage: vec![0; cell_w * cell_h],
        };

        let mut utf8 = [0; 4];
        let style = MonoTextStyle::new(&self.font, BinaryColor::On);
        Text::with_baseline(c.encode_utf8(&mut utf8), Point::zero(), style, Baseline::Top)
            .draw(&mut canvas)
            .unwrap_or_else(|never| match never {});

        let s = self.scale;
        let width = cell_w * s;
        let rows = cell_h * s;
        let mut coverage = vec![0; width * rows];
        for y in 0..rows {
            for x in 0..width {
                coverage[y * width + x] = canvas.coverage[(y / s) * cell_w + x / s];
            }
        }

        Some(Glyph {
            width,
            rows,
            left: 0,
            top: ((self.font.baseline as usize + 1) * s) as i32,
            advance: ((cell_w + self.font.character_spacing as usize) * s) as f32,
            coverage,
        })
    }

    fn kerning(&self, _prev: char, _next: char) -> f32 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::Font;
    use super::MonoFace;
    use crate::font::GlyphSource;

    #[test]
    fn glyph_has_ink() {
        let face = MonoFace::new(Font::Font6x10, 10);
        let glyph = face.glyph('A', true).unwrap();
        assert_eq!((glyph.width, glyph.rows), (6, 10));
        assert!(glyph.coverage.iter().any(|&v| v == 255));
    }

    #[test]
    fn space_is_blank() {
        let face = MonoFace::new(Font::Font6x10, 10);
        let glyph = face.glyph(' ', true).unwrap();
        assert!(glyph.coverage.iter().all(|&v| v == 0));
        assert_eq!(glyph.advance, 6.0);
    }

    #[test]
    fn scales_towards_target_height() {
        let face = MonoFace::new(Font::Font5x8, 17);
        let glyph = face.glyph('x', true).unwrap();
        assert_eq!((glyph.width, glyph.rows), (10, 16));
        assert_eq!(glyph.advance, 10.0);
    }
}
