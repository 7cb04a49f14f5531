use super::Glyph;
use super::GlyphSource;

/// A loaded TrueType/OpenType face sized for one rasterization.
pub struct TrueTypeFace<'f> {
    font: &'f fontdue::Font,
    px: f32,
}

impl<'f> TrueTypeFace<'f> {
    /// Pick the pixel size at which ascent plus descent fill `target_height`.
    pub fn new(font: &'f fontdue::Font, target_height: usize) -> Self {
        let target = target_height as f32;

        let px = match font.horizontal_line_metrics(target) {
            Some(metrics) if metrics.ascent - metrics.descent > 0.0 => {
                target * target / (metrics.ascent - metrics.descent)
            }
            _ => target,
        };

        Self { font, px }
    }
}

impl GlyphSource for TrueTypeFace<'_> {
    fn glyph(&self, c: char, antialias: bool) -> Option<Glyph> {
        let (metrics, mut coverage) = self.font.rasterize(c, self.px);

        if !antialias {
            for v in coverage.iter_mut() {
                *v = if *v >= 128 { 255 } else { 0 };
            }
        }

        Some(Glyph {
            width: metrics.width,
            rows: metrics.height,
            left: metrics.xmin,
            top: metrics.ymin + metrics.height as i32,
            advance: metrics.advance_width,
            coverage,
        })
    }

    fn kerning(&self, prev: char, next: char) -> f32 {
        self.font.horizontal_kern(prev, next, self.px).unwrap_or(0.0)
    }
}
