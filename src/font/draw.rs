use rgb::RGB8;

use super::markup::Directive;
use super::markup::Span;
use super::Glyph;
use super::GlyphSource;
use crate::color;
use crate::raster::RasterFlags;
use crate::raster::TextRaster;

#[derive(Debug, Clone)]
struct Style {
    foreground: RGB8,
    background: RGB8,
    invert: bool,
    underline: bool,
    rainbow: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            foreground: color::WHITE,
            background: color::BLACK,
            invert: false,
            underline: false,
            rainbow: false,
        }
    }
}

impl Style {
    fn apply(&mut self, directive: &Directive) {
        match directive {
            Directive::Invert => self.invert = !self.invert,
            Directive::Underline => self.underline = !self.underline,
            Directive::Rainbow => self.rainbow = !self.rainbow,
            Directive::Foreground(Some(c)) => self.foreground = *c,
            Directive::Background(Some(c)) => self.background = *c,
            _ => {}
        }
    }
}

struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 3],
        }
    }

    fn put(&mut self, x: i32, y: i32, rgb: RGB8) {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return;
        };

        if x >= self.width || y >= self.height {
            return;
        }

        let o = (y * self.width + x) * 3;
        self.pixels[o] = rgb.r;
        self.pixels[o + 1] = rgb.g;
        self.pixels[o + 2] = rgb.b;
    }

    fn draw_glyph(&mut self, glyph: &Glyph, x: i32, y: i32, style: &Style) {
        let h = self.height;

        if style.invert {
            for yo in 0..h {
                let fill = if style.rainbow {
                    color::rainbow_row(yo, h)
                } else {
                    style.foreground
                };

                for xo in 0..glyph.width {
                    self.put(x + xo as i32, yo as i32, fill);
                }
            }
        }

        let mut ink = style.foreground;

        for yo in 0..glyph.rows {
            let yu = y + yo as i32;
            if yu < 0 {
                continue;
            }
            if yu >= h as i32 {
                break;
            }

            if style.rainbow {
                ink = color::rainbow_row(yo, glyph.rows);
            }

            for xo in 0..glyph.width {
                let xu = x + xo as i32;
                if xu < 0 {
                    continue;
                }
                if xu >= self.width as i32 {
                    break;
                }

                let mut coverage = glyph.coverage[yo * glyph.width + xo];
                if style.invert {
                    coverage = 255 - coverage;
                }

                if coverage > 0 {
                    self.put(xu, yu, color::scale(ink, coverage));
                } else {
                    self.put(xu, yu, style.background);
                }
            }
        }

        if style.underline {
            let coverage = if style.invert { 0 } else { 255 };
            let thickness = (h / 20).max(1);

            for t in 0..thickness {
                let row = h as i32 - 1 - t as i32;
                for xo in 0..glyph.width {
                    self.put(x + xo as i32, row, color::scale(ink, coverage));
                }
            }
        }
    }
}

/// Turn `text` into a raster of exactly `height` rows.
///
/// The first pass measures the glyph run to size the raster, the second pass
/// applies directives and draws glyphs below the tallest ascender.
pub(super) fn render<S>(source: &S, text: &str, height: usize, antialias: bool) -> TextRaster
where
    S: GlyphSource + ?Sized,
{
    let spans = super::markup::parse(text);

    let mut pen = 0.0f32;
    let mut max_ascender = 0i32;
    let mut prev: Option<char> = None;

    for span in &spans {
        let c = match span {
            Span::Glyph(c) => *c,
            Span::Directive(_) => continue,
            Span::Unknown(_) => break,
        };

        if let Some(prev) = prev {
            pen += source.kerning(prev, c);
        }

        let Some(glyph) = source.glyph(c, antialias) else {
            continue;
        };

        pen += glyph.advance;
        max_ascender = max_ascender.max(glyph.top);
        prev = Some(c);
    }

    let width = pen.ceil().max(0.0) as usize;
    let mut canvas = Canvas::new(width, height);
    let mut style = Style::default();
    let mut flags = RasterFlags::default();

    let mut pen = 0.0f32;
    let mut prev: Option<char> = None;

    for span in &spans {
        let c = match span {
            Span::Glyph(c) => *c,
            Span::Directive(directive) => {
                style.apply(directive);
                flags.apply(directive);
                continue;
            }
            Span::Unknown(code) => {
                tracing::warn!(%code, %text, "Directive not understood, ignoring rest of text");
                break;
            }
        };

        if let Some(prev) = prev {
            pen += source.kerning(prev, c);
        }

        let Some(glyph) = source.glyph(c, antialias) else {
            continue;
        };

        let x = pen.round() as i32 + glyph.left;
        let y = max_ascender - glyph.top;
        canvas.draw_glyph(&glyph, x, y, &style);

        pen += glyph.advance;
        prev = Some(c);
    }

    TextRaster::new(
        canvas.pixels.into_boxed_slice(),
        width,
        height,
        flags,
        text.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use rgb::RGB8;

    use super::render;
    use crate::font::Glyph;
    use crate::font::GlyphSource;

    /// Every glyph is a solid 2x4 block with an advance of 3.
    struct Blocks;

    impl GlyphSource for Blocks {
        fn glyph(&self, _c: char, _antialias: bool) -> Option<Glyph> {
            Some(Glyph {
                width: 2,
                rows: 4,
                left: 0,
                top: 4,
                advance: 3.0,
                coverage: vec![255; 8],
            })
        }

        fn kerning(&self, _prev: char, _next: char) -> f32 {
            0.0
        }
    }

    #[test]
    fn measures_width_from_advances() {
        let r = render(&Blocks, "abc", 6, true);
        assert_eq!(r.width(), 9);
        assert_eq!(r.height(), 6);
        assert_eq!(r.pixel(0, 0), Some(RGB8::new(254, 254, 254)));
        assert_eq!(r.pixel(2, 0), Some(RGB8::default()));
        assert_eq!(r.pixel(0, 4), Some(RGB8::default()));
    }

    #[test]
    fn directives_are_not_drawn() {
        let plain = render(&Blocks, "ab", 4, true);
        let marked = render(&Blocks, "$u$a$C0000ff$b", 4, true);
        assert_eq!(plain.width(), marked.width());
        assert_eq!(marked.pixel(3, 0), Some(RGB8::new(0, 0, 254)));
    }

    #[test]
    fn invert_paints_background_with_foreground() {
        let r = render(&Blocks, "$i$a", 6, true);
        // Glyph area is fully covered, inverted coverage is zero: background
        assert_eq!(r.pixel(0, 0), Some(RGB8::default()));
        // Below the glyph the inverted fill shows
        assert_eq!(r.pixel(0, 5), Some(RGB8::new(255, 255, 255)));
    }

    #[test]
    fn background_colour_behind_empty_coverage() {
        struct Hollow;
        impl GlyphSource for Hollow {
            fn glyph(&self, _c: char, _antialias: bool) -> Option<Glyph> {
                Some(Glyph {
                    width: 1,
                    rows: 1,
                    left: 0,
                    top: 1,
                    advance: 1.0,
                    coverage: vec![0],
                })
            }

            fn kerning(&self, _prev: char, _next: char) -> f32 {
                0.0
            }
        }

        let r = render(&Hollow, "$B102030$x", 1, true);
        assert_eq!(r.pixel(0, 0), Some(RGB8::new(0x10, 0x20, 0x30)));
    }

    #[test]
    fn flags_are_collected() {
        let r = render(&Blocks, "$p3$$d1$$T$x", 4, true);
        assert_eq!(r.priority(), 3);
        assert_eq!(r.duration_left_us(), 1_000_000);
        assert!(r.transparent());
        assert!(r.scroll_required());
    }

    #[test]
    fn empty_text_yields_empty_raster() {
        let r = render(&Blocks, "", 4, true);
        assert_eq!(r.width(), 0);
        assert_eq!(r.height(), 4);
    }
}
