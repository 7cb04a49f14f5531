//! Network listeners that feed the board.

use crate::font::FontSource;
use crate::raster::TextRaster;
use crate::state::Context;

pub mod announce;
pub mod lcd;
pub mod pixel;
pub mod pixel_binary;
pub mod text;

/// Largest datagram any of the UDP listeners accepts.
pub const MAX_DATAGRAM: usize = 65536;

/// Rasterize off the async runtime.
///
/// Failures only cost the message at hand, so they are logged and `None` is
/// returned.
pub(crate) async fn rasterize(
    ctx: &Context,
    font: FontSource,
    text: String,
    height: usize,
) -> Option<TextRaster> {
    let fonts = ctx.fonts.clone();
    let antialias = ctx.config.fonts.antialias;

    let result = tokio::task::spawn_blocking(move || {
        fonts
            .rasterize(&font, &text, height, antialias)
            .map_err(|error| (error, text))
    })
    .await;

    match result {
        Ok(Ok(raster)) => Some(raster),
        Ok(Err((error, text))) => {
            tracing::warn!(?error, %text, "Failed rendering text");
            None
        }
        Err(error) => {
            tracing::error!(?error, "Rasterizer task failed");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use crate::state::Board;
    use crate::state::Context;

    /// Poll the board until `check` holds, failing the test after two seconds.
    pub async fn wait_for<F>(ctx: &Context, mut check: F)
    where
        F: FnMut(&Board) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);

        loop {
            if check(&ctx.board.lock()) {
                return;
            }

            assert!(
                tokio::time::Instant::now() < deadline,
                "board never reached expected state"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn context() -> Context {
        let config = crate::config::Config::from_toml("[display]\nwidth = 64\nheight = 16\n")
            .unwrap();
        Context::new(config)
    }
}
