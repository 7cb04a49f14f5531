//! The fixed-rate loop that composes every source into one frame.

use std::time::Duration;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::blit::blit;
use crate::blit::SourceRect;
use crate::buffer::PixelBuffer;
use crate::color;
use crate::config::Config;
use crate::display::Display;
use crate::display::DisplayError;
use crate::raster::TextRaster;
use crate::state::Board;
use crate::state::ScrollState;
use crate::state::SharedBoard;

const IDLE_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub tick: Duration,
    pub flash_cycles: u32,
    pub flash_interval: Duration,
    pub promote_offset: i32,
    pub fade_after: Duration,
}

impl From<&Config> for RenderSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick: config.render.tick,
            flash_cycles: config.render.flash_cycles,
            flash_interval: config.render.flash_interval,
            promote_offset: config.render.promote_offset,
            fade_after: config.render.fade_after,
        }
    }
}

pub struct RenderLoop<D> {
    board: SharedBoard,
    display: D,
    frame: PixelBuffer,
    settings: RenderSettings,
}

impl<D: Display> RenderLoop<D> {
    pub fn new(board: SharedBoard, display: D, settings: RenderSettings) -> Self {
        let frame = {
            let board = board.lock();
            PixelBuffer::new(board.stream.width(), board.stream.height())
        };

        Self {
            board,
            display,
            frame,
            settings,
        }
    }

    #[cfg(test)]
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Render until `token` is cancelled, then blank the display.
    ///
    /// Blocks the calling thread.
    pub fn run(mut self, token: CancellationToken) -> D {
        tracing::info!(tick = ?self.settings.tick, "Render loop started");

        while !token.is_cancelled() {
            let started = Instant::now();

            if let Err(error) = self.compose() {
                tracing::warn!(?error, "Failed to present frame");
            }

            match self.settings.tick.checked_sub(started.elapsed()) {
                Some(rest) => std::thread::sleep(rest),
                None => tracing::trace!(elapsed = ?started.elapsed(), "Render tick overran"),
            }

            self.housekeeping();
        }

        tracing::info!("Render loop stopped, clearing display");
        if let Err(error) = self.display.clear() {
            tracing::warn!(?error, "Failed to clear display");
        }

        self.display
    }

    /// Compose one frame and present it.
    ///
    /// If the board is locked by somebody else the previous frame is shown
    /// again.
    pub fn compose(&mut self) -> Result<(), DisplayError> {
        let Some(mut board) = self.board.try_lock() else {
            tracing::trace!("Board busy, repeating last frame");
            return self.display.present(&self.frame);
        };

        self.frame.copy_from(&board.stream);
        self.frame.overlay(&board.lcd);

        let Board {
            overlays, scroll, ..
        } = &mut *board;

        if let Some(active) = overlays.select_active_mut() {
            if active.take_flash() {
                flash(&mut self.display, &self.settings)?;
            }

            blit(
                &mut self.frame,
                active,
                scroll.x,
                scroll.y_orig,
                SourceRect::whole(active),
                active.transparent(),
            );

            advance(active, scroll, self.settings.tick, Instant::now());
        }

        drop(board);
        self.display.present(&self.frame)
    }

    /// Evict finished overlays and fade stale streaming content.
    pub fn housekeeping(&mut self) {
        let Some(mut board) = self.board.try_lock() else {
            return;
        };

        if board.overlays.prune_expired() > 0 {
            board.scroll.reset(self.settings.promote_offset);

            if let Some(next) = board.overlays.select_active() {
                tracing::debug!(text = next.source(), "Promoted overlay");
            }
        }

        let streaming = board
            .last_stream_input
            .is_some_and(|at| at.elapsed() < self.settings.fade_after);

        if !streaming {
            board.stream.fade();
        }
    }
}

/// Blink the whole display. Blocks for the duration of the effect.
fn flash<D: Display>(display: &mut D, settings: &RenderSettings) -> Result<(), DisplayError> {
    tracing::debug!(cycles = settings.flash_cycles, "Flashing");

    for _ in 0..settings.flash_cycles {
        display.fill(color::WHITE)?;
        std::thread::sleep(settings.flash_interval);
        display.fill(color::BLACK)?;
        std::thread::sleep(settings.flash_interval);
    }

    Ok(())
}

/// Move the shown overlay along by one tick.
fn advance(active: &mut TextRaster, scroll: &mut ScrollState, tick: Duration, now: Instant) {
    let width = i32::try_from(active.width()).unwrap_or(i32::MAX);

    if active.is_idle() {
        match scroll.last_idle_step {
            None => scroll.last_idle_step = Some(now),
            Some(last) if now.duration_since(last) >= IDLE_STEP => {
                scroll.x -= 1;
                scroll.last_idle_step = Some(now);
            }
            Some(_) => {}
        }

        if scroll.x.saturating_add(width) <= 0 {
            scroll.x = scroll.x_orig;
        }
    } else if active.scroll_required() {
        scroll.x -= 1;

        if scroll.x.saturating_add(width) < 0 {
            scroll.x = scroll.x_orig;
            active.set_end_of_line();
        }
    } else {
        active.set_end_of_line();
    }

    active.decrease_duration(tick);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use rgb::RGB8;

    use super::advance;
    use super::RenderLoop;
    use super::RenderSettings;
    use crate::display::HeadlessDisplay;
    use crate::raster::testing::solid;
    use crate::raster::RasterFlags;
    use crate::state::Board;
    use crate::state::ScrollState;
    use crate::state::SharedBoard;

    const RED: RGB8 = RGB8::new(255, 0, 0);
    const TICK: Duration = Duration::from_millis(10);

    fn settings() -> RenderSettings {
        RenderSettings {
            tick: TICK,
            flash_cycles: 2,
            flash_interval: Duration::ZERO,
            promote_offset: 8,
            fade_after: Duration::from_secs(1),
        }
    }

    fn render_loop() -> RenderLoop<HeadlessDisplay> {
        let board = SharedBoard::new(Board::new(16, 4, ScrollState::new(21, 0)));
        RenderLoop::new(board, HeadlessDisplay::new(16, 4), settings())
    }

    #[test]
    fn scrolling_overlay_reaches_end_of_line() {
        let mut raster = solid(4, 2, RED, RasterFlags::default());
        let mut scroll = ScrollState::new(20, 0);
        let now = Instant::now();

        for _ in 0..24 {
            advance(&mut raster, &mut scroll, TICK, now);
            assert!(!raster.end_of_line());
        }
        assert_eq!(scroll.x, -4);

        advance(&mut raster, &mut scroll, TICK, now);
        assert!(raster.end_of_line());
        assert_eq!(scroll.x, 20);
        assert_eq!(raster.duration_left_us(), 10_000_000 - 25 * 10_000);
    }

    #[test]
    fn static_overlay_ends_line_immediately() {
        let flags = RasterFlags {
            scroll: false,
            ..RasterFlags::default()
        };
        let mut raster = solid(4, 2, RED, flags);
        let mut scroll = ScrollState::new(20, 0);

        advance(&mut raster, &mut scroll, TICK, Instant::now());
        assert!(raster.end_of_line());
        assert_eq!(scroll.x, 20);
    }

    #[test]
    fn idle_overlay_steps_once_per_second() {
        let flags = RasterFlags {
            is_idle: true,
            ..RasterFlags::default()
        };
        let mut raster = solid(4, 2, RED, flags);
        let mut scroll = ScrollState::new(20, 0);
        let start = Instant::now();

        advance(&mut raster, &mut scroll, TICK, start);
        advance(&mut raster, &mut scroll, TICK, start + Duration::from_millis(500));
        assert_eq!(scroll.x, 20);

        advance(&mut raster, &mut scroll, TICK, start + Duration::from_millis(1000));
        assert_eq!(scroll.x, 19);
        assert!(!raster.end_of_line());
    }

    #[test]
    fn idle_overlay_wraps() {
        let flags = RasterFlags {
            is_idle: true,
            ..RasterFlags::default()
        };
        let mut raster = solid(4, 2, RED, flags);
        let mut scroll = ScrollState::new(20, 0);
        scroll.x = -3;
        scroll.last_idle_step = Some(Instant::now());

        advance(&mut raster, &mut scroll, TICK, Instant::now() + Duration::from_secs(1));
        assert_eq!(scroll.x, 20);
    }

    #[test]
    fn compose_layers_stream_lcd_and_overlay() {
        let mut render = render_loop();
        {
            let mut board = render.board.lock();
            board.stream.set(0, 0, RGB8::new(0, 0, 9));
            board.lcd.set(1, 0, RGB8::new(0, 9, 0));
            board.scroll.x = 10;
            board
                .overlays
                .insert_or_replace(solid(2, 2, RED, RasterFlags::default()));
        }

        render.compose().unwrap();

        let frame = render.display().frame();
        assert_eq!(frame.get(0, 0), Some(RGB8::new(0, 0, 9)));
        assert_eq!(frame.get(1, 0), Some(RGB8::new(0, 9, 0)));
        assert_eq!(frame.get(10, 0), Some(RED));
        assert_eq!(frame.get(11, 1), Some(RED));
        assert_eq!(frame.get(12, 0), Some(RGB8::default()));
        assert_eq!(render.board.lock().scroll.x, 9);
    }

    #[test]
    fn busy_board_repeats_last_frame() {
        let mut render = render_loop();
        render.board.lock().stream.set(2, 1, RED);
        render.compose().unwrap();

        let board = render.board.clone();
        let mut guard = board.lock();
        guard.stream.clear();

        render.compose().unwrap();
        assert_eq!(render.display().frames(), 2);
        assert_eq!(render.display().frame().get(2, 1), Some(RED));
        drop(guard);

        render.compose().unwrap();
        assert_eq!(render.display().frames(), 3);
        assert_eq!(render.display().frame().get(2, 1), Some(RGB8::default()));
    }

    #[test]
    fn flash_is_shown_once() {
        let mut render = render_loop();
        let flags = RasterFlags {
            want_flash: true,
            ..RasterFlags::default()
        };
        render
            .board
            .lock()
            .overlays
            .insert_or_replace(solid(2, 2, RED, flags));

        render.compose().unwrap();
        // two cycles of white and black, then the frame
        assert_eq!(render.display().frames(), 5);

        render.compose().unwrap();
        assert_eq!(render.display().frames(), 6);
    }

    #[test]
    fn housekeeping_prunes_and_promotes() {
        let mut render = render_loop();
        {
            let mut board = render.board.lock();
            let mut done = solid(2, 2, RED, RasterFlags::default());
            done.decrease_duration(Duration::from_secs(60));
            done.set_end_of_line();
            board.overlays.insert_or_replace(done);
            board.scroll.x = -1;
        }

        render.housekeeping();

        let board = render.board.lock();
        assert!(board.overlays.current().is_empty());
        assert_eq!(board.scroll.x, 8);
    }

    #[test]
    fn stream_fades_only_without_recent_input() {
        let mut render = render_loop();
        render.board.lock().stream.set(0, 0, RED);
        render.board.lock().touch_stream();

        render.housekeeping();
        assert_eq!(render.board.lock().stream.get(0, 0), Some(RED));

        render.board.lock().last_stream_input = Some(Instant::now() - Duration::from_secs(2));
        render.housekeeping();
        assert_eq!(render.board.lock().stream.get(0, 0), Some(RGB8::new(252, 0, 0)));
    }

    #[test]
    fn run_stops_on_cancel_and_clears() {
        let mut render = render_loop();
        render.board.lock().stream.fill(RED);
        render.compose().unwrap();
        assert_eq!(render.display().frame().get(5, 2), Some(RED));

        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let display = render.run(token);

        assert!(display.frame().pixels().all(crate::buffer::is_black));
    }
}
