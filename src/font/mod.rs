//! Text rasterization.
//!
//! [`FontEngine`] is the only way to reach the glyph backends. It serializes
//! every rasterization behind one mutex and caches loaded font files until
//! [`FontEngine::uninit`] is called.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use camino::Utf8Path;
use camino::Utf8PathBuf;

mod draw;
mod lookup;
pub mod markup;
mod mono;
mod truetype;

pub use self::mono::Font;

use crate::raster::TextRaster;

/// Where glyphs come from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSource {
    Builtin(Font),
    File(Utf8PathBuf),
    /// Resolved against the configured search directories.
    Name(String),
}

impl Default for FontSource {
    fn default() -> Self {
        FontSource::Builtin(Font::default())
    }
}

/// A rendered glyph bitmap.
///
/// `top` is the distance from the baseline up to the first bitmap row,
/// `left` the horizontal bearing from the pen position.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub width: usize,
    pub rows: usize,
    pub left: i32,
    pub top: i32,
    pub advance: f32,
    pub coverage: Vec<u8>,
}

pub trait GlyphSource {
    fn glyph(&self, c: char, antialias: bool) -> Option<Glyph>;
    fn kerning(&self, prev: char, next: char) -> f32;
}

#[derive(Debug, thiserror::Error)]
pub enum RasterizeError {
    #[error("Cannot read font file '{path}'")]
    ReadingFont {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse font file '{path}': {reason}")]
    ParsingFont { path: Utf8PathBuf, reason: &'static str },

    #[error("Text is not valid UTF-8")]
    InvalidText(#[from] std::str::Utf8Error),
}

#[derive(Default)]
struct FaceCache {
    faces: HashMap<Utf8PathBuf, fontdue::Font>,
}

impl FaceCache {
    fn load(&mut self, path: &Utf8Path) -> Result<&fontdue::Font, RasterizeError> {
        if !self.faces.contains_key(path) {
            let bytes = std::fs::read(path).map_err(|source| RasterizeError::ReadingFont {
                path: path.to_path_buf(),
                source,
            })?;

            let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
                .map_err(|reason| RasterizeError::ParsingFont {
                    path: path.to_path_buf(),
                    reason,
                })?;

            tracing::info!(%path, "Loaded font");
            self.faces.insert(path.to_path_buf(), font);
        }

        Ok(&self.faces[path])
    }
}

pub struct FontEngine {
    cache: Mutex<FaceCache>,
    lookup: Mutex<()>,
    search_dirs: Vec<Utf8PathBuf>,
}

impl FontEngine {
    pub fn init(search_dirs: Vec<Utf8PathBuf>) -> Self {
        tracing::debug!(?search_dirs, "Initializing font engine");

        Self {
            cache: Mutex::new(FaceCache::default()),
            lookup: Mutex::new(()),
            search_dirs,
        }
    }

    /// Drop every cached face.
    pub fn uninit(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(faces = cache.faces.len(), "Flushing font cache");
        cache.faces.clear();
    }

    /// Resolve a font family name to a file, or `None` if nothing matches.
    pub fn find_font_by_name(&self, name: &str) -> Option<Utf8PathBuf> {
        let _guard = self.lookup.lock().unwrap_or_else(PoisonError::into_inner);
        lookup::find_in_dirs(&self.search_dirs, name)
    }

    pub fn rasterize(
        &self,
        source: &FontSource,
        text: &str,
        height: usize,
        antialias: bool,
    ) -> Result<TextRaster, RasterizeError> {
        let resolved;
        let path = match source {
            FontSource::Builtin(font) => {
                return Ok(self.rasterize_builtin(*font, text, height, antialias));
            }
            FontSource::File(path) => path,
            FontSource::Name(name) => match self.find_font_by_name(name) {
                Some(path) => {
                    resolved = path;
                    &resolved
                }
                None => {
                    tracing::warn!(%name, "No font found by name, using builtin font");
                    return Ok(self.rasterize_builtin(Font::default(), text, height, antialias));
                }
            },
        };

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let font = cache.load(path)?;
        let face = truetype::TrueTypeFace::new(font, height);
        Ok(draw::render(&face, text, height, antialias))
    }

    fn rasterize_builtin(&self, font: Font, text: &str, height: usize, antialias: bool) -> TextRaster {
        let _cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let face = mono::MonoFace::new(font, height);
        draw::render(&face, text, height, antialias)
    }
}
