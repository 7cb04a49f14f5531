//! Text messages, one per UDP datagram.

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::font::markup;
use crate::font::RasterizeError;
use crate::raster::RasterFlags;
use crate::state::Context;

pub async fn serve(socket: UdpSocket, ctx: Context, token: CancellationToken) {
    tracing::info!(addr = ?socket.local_addr().ok(), "Listening for text messages");
    let mut buffer = vec![0; super::MAX_DATAGRAM];

    loop {
        let (len, peer) = tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut buffer) => match received {
                Ok(received) => received,
                Err(error) => {
                    tracing::warn!(?error, "Failed to receive text message");
                    continue;
                }
            },
        };

        tracing::info!(?peer, len, "Received text message");
        handle_message(&ctx, &buffer[..len]).await;
    }

    tracing::debug!("Text listener stopped");
}

/// Show `payload` on the board.
///
/// Text for a priority that is already on display is prepended to what is
/// shown there, idle or not. Otherwise idle text replaces the idle fallback.
///
/// Messages are handled one at a time, so a merge never builds on a stale
/// entry. The board itself is only locked for the lookup and the insert.
pub async fn handle_message(ctx: &Context, payload: &[u8]) {
    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(error) => {
            let error = RasterizeError::from(error);
            tracing::warn!(?error, "Dropping text message");
            return;
        }
    };

    let spans = markup::parse(text);
    let flags = RasterFlags::from_spans(&spans);
    tracing::debug!(
        visible = %markup::visible_text(&spans),
        priority = flags.priority,
        idle = flags.is_idle,
        "Text message"
    );

    let _serialized = ctx.text_merge.lock().await;

    let existing = ctx
        .board
        .lock()
        .overlays
        .source_at(flags.priority)
        .map(str::to_string);
    let merging = existing.is_some();
    let text = match existing {
        Some(existing) => format!("{text} {existing}"),
        None => text.to_string(),
    };

    let height = ctx.config.display.height;
    let Some(raster) = super::rasterize(ctx, ctx.config.fonts.text.clone(), text, height).await
    else {
        return;
    };

    let mut board = ctx.board.lock();
    if raster.is_idle() && !merging {
        tracing::debug!(replacing = board.overlays.idle().is_some(), "New idle text");
        board.overlays.set_idle(raster);
    } else {
        let insertion = board.overlays.insert_or_replace(raster);
        tracing::debug!(?insertion, overlays = board.overlays.current().len(), "New overlay");
    }

    let width = i32::try_from(board.stream.width()).unwrap_or(i32::MAX);
    board.scroll.reset(width);
}
