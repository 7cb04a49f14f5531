use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::TryLockError;
use std::time::Instant;

use crate::buffer::PixelBuffer;
use crate::config::Config;
use crate::font::FontEngine;
use crate::overlay::OverlayRegistry;

/// Horizontal position of whichever overlay is on screen.
#[derive(Debug, Clone)]
pub struct ScrollState {
    pub x: i32,
    pub x_orig: i32,
    pub y_orig: i32,
    pub(crate) last_idle_step: Option<Instant>,
}

impl ScrollState {
    pub fn new(x_orig: i32, y_orig: i32) -> Self {
        Self {
            x: x_orig,
            x_orig,
            y_orig,
            last_idle_step: None,
        }
    }

    /// Restart from the right edge.
    pub fn reset(&mut self, x: i32) {
        self.x = x;
        self.last_idle_step = None;
    }
}

/// Everything the decoders and the render loop share.
#[derive(Debug)]
pub struct Board {
    pub stream: PixelBuffer,
    pub lcd: PixelBuffer,
    pub overlays: OverlayRegistry,
    pub scroll: ScrollState,
    pub last_stream_input: Option<Instant>,
}

impl Board {
    pub fn new(width: usize, height: usize, scroll: ScrollState) -> Self {
        Self {
            stream: PixelBuffer::new(width, height),
            lcd: PixelBuffer::new(width, height),
            overlays: OverlayRegistry::new(),
            scroll,
            last_stream_input: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.display.width,
            config.display.height,
            ScrollState::new(config.display.x_origin(), config.display.y_origin),
        )
    }

    pub fn touch_stream(&mut self) {
        self.last_stream_input = Some(Instant::now());
    }
}

/// Handle to the [`Board`] behind the one global lock.
#[derive(Debug, Clone)]
pub struct SharedBoard(Arc<Mutex<Board>>);

impl SharedBoard {
    pub fn new(board: Board) -> Self {
        Self(Arc::new(Mutex::new(board)))
    }

    /// Block until the board is available.
    ///
    /// A panic while holding the lock leaves the board usable, so poisoning
    /// is ignored.
    pub fn lock(&self) -> MutexGuard<'_, Board> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` if somebody else holds the lock right now.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Board>> {
        match self.0.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// Handed to every task.
#[derive(Clone)]
pub struct Context {
    pub board: SharedBoard,
    pub fonts: Arc<FontEngine>,
    pub config: Arc<Config>,

    /// Held by a text message from reading the entry it merges with until
    /// its raster is stored.
    pub text_merge: Arc<tokio::sync::Mutex<()>>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let fonts = FontEngine::init(config.fonts.search_dirs.clone());
        Self {
            board: SharedBoard::new(Board::from_config(&config)),
            fonts: Arc::new(fonts),
            config: Arc::new(config),
            text_merge: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}
