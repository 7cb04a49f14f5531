//! Packed binary pixel records over UDP.
//!
//! Byte 1 of a datagram selects the record size: zero for `x y r g b`
//! (7 bytes), anything else for `x y r g b a` (8 bytes). Records start at
//! byte 2, coordinates are little endian `u16`.

use rgb::RGB8;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::buffer::PixelBuffer;
use crate::state::Context;

const HEADER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub x: u16,
    pub y: u16,
    pub color: RGB8,
}

/// Decode the complete records of `datagram`. A partial trailing record is
/// dropped.
pub fn records(datagram: &[u8]) -> impl Iterator<Item = Record> + '_ {
    let stride = match datagram.get(1) {
        Some(0) | None => 7,
        Some(_) => 8,
    };

    datagram
        .get(HEADER_LEN..)
        .unwrap_or_default()
        .chunks_exact(stride)
        .map(|r| Record {
            x: u16::from_le_bytes([r[0], r[1]]),
            y: u16::from_le_bytes([r[2], r[3]]),
            color: RGB8::new(r[4], r[5], r[6]),
        })
}

pub fn apply(datagram: &[u8], buffer: &mut PixelBuffer) {
    for record in records(datagram) {
        buffer.set(i32::from(record.x), i32::from(record.y), record.color);
    }
}

pub async fn serve(socket: UdpSocket, ctx: Context, token: CancellationToken) {
    tracing::info!(addr = ?socket.local_addr().ok(), "Listening for binary pixel records");
    let mut buffer = vec![0; super::MAX_DATAGRAM];

    loop {
        let len = tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut buffer) => match received {
                Ok((len, _peer)) => len,
                Err(error) => {
                    tracing::warn!(?error, "Failed to receive binary pixel datagram");
                    continue;
                }
            },
        };

        let mut board = ctx.board.lock();
        apply(&buffer[..len], &mut board.stream);
        board.touch_stream();
    }

    tracing::debug!("Binary pixel listener stopped");
}
