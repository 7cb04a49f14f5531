//! Line based pixel streaming (`PX x y rrggbb`), over UDP and TCP.

use std::net::SocketAddr;

use futures::StreamExt;
use rgb::RGB8;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::net::UdpSocket;
use tokio_util::codec::FramedRead;
use tokio_util::codec::LinesCodec;
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::buffer::PixelBuffer;
use crate::color::ColorError;
use crate::state::Context;

pub const MAX_LINE_LENGTH: usize = 4096;

/// Reported for pixels outside the buffer, so every get gets an answer.
const OUT_OF_RANGE: RGB8 = RGB8::new(255, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Size,
    Get { x: i32, y: i32 },
    Set { x: i32, y: i32, color: RGB8 },
    /// Mix `color` into the current pixel with the given opacity
    Blend { x: i32, y: i32, color: RGB8, alpha: u8 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}'")]
    Unknown(String),

    #[error("Missing coordinate")]
    MissingCoordinate,

    #[error("Invalid coordinate '{0}'")]
    InvalidCoordinate(String),

    #[error("Invalid colour")]
    Color(#[from] ColorError),

    #[error("Unexpected trailing argument '{0}'")]
    Trailing(String),
}

impl std::str::FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_ascii_whitespace();

        match tokens.next() {
            Some("SIZE") => return Ok(Command::Size),
            Some("PX") => {}
            other => return Err(CommandError::Unknown(other.unwrap_or_default().to_string())),
        }

        let x = coordinate(tokens.next())?;
        let y = coordinate(tokens.next())?;

        let Some(color) = tokens.next() else {
            return Ok(Command::Get { x, y });
        };

        if let Some(extra) = tokens.next() {
            return Err(CommandError::Trailing(extra.to_string()));
        }

        if color.len() == 8 {
            let [r, g, b, alpha] = crate::color::parse_hex_bytes::<4>(color)?;
            return Ok(Command::Blend {
                x,
                y,
                color: RGB8::new(r, g, b),
                alpha,
            });
        }

        let [r, g, b] = crate::color::parse_hex_bytes::<3>(color)?;
        Ok(Command::Set {
            x,
            y,
            color: RGB8::new(r, g, b),
        })
    }
}

fn coordinate(token: Option<&str>) -> Result<i32, CommandError> {
    let token = token.ok_or(CommandError::MissingCoordinate)?;
    token
        .parse()
        .map_err(|_| CommandError::InvalidCoordinate(token.to_string()))
}

/// `dst` takes `src` with opacity `alpha`.
///
/// Every channel is mixed against the red channel of the destination.
fn blend(src: RGB8, dst: RGB8, alpha: u8) -> RGB8 {
    let a = u32::from(alpha);
    let base = u32::from(dst.r) * (255 - a);
    let mix = |c: u8| ((u32::from(c) * a + base) / 255) as u8;
    RGB8::new(mix(src.r), mix(src.g), mix(src.b))
}

impl Command {
    /// Apply to the streaming buffer, returning the reply for the client.
    pub fn apply(self, buffer: &mut PixelBuffer) -> Option<String> {
        match self {
            Command::Size => Some(format!("SIZE {} {}\n", buffer.width(), buffer.height())),
            Command::Get { x, y } => {
                let c = buffer.get(x, y).unwrap_or(OUT_OF_RANGE);
                Some(format!("PX {x} {y} {:02x}{:02x}{:02x}\n", c.r, c.g, c.b))
            }
            Command::Set { x, y, color } => {
                buffer.set(x, y, color);
                None
            }
            Command::Blend { x, y, color, alpha } => {
                if let Some(dst) = buffer.get(x, y) {
                    buffer.set(x, y, blend(color, dst, alpha));
                }
                None
            }
        }
    }
}

/// Run every line of `datagram` until the first malformed one.
pub fn handle_datagram(ctx: &Context, datagram: &[u8]) {
    let text = String::from_utf8_lossy(datagram);
    let mut board = ctx.board.lock();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match line.parse::<Command>() {
            Ok(command) => {
                // no way to answer a datagram
                let _ = command.apply(&mut board.stream);
            }
            Err(error) => {
                tracing::warn!(?error, %line, "Invalid pixel command, dropping rest of datagram");
                break;
            }
        }
    }

    board.touch_stream();
}

pub async fn serve_udp(socket: UdpSocket, ctx: Context, token: CancellationToken) {
    tracing::info!(addr = ?socket.local_addr().ok(), "Listening for pixel commands over UDP");
    let mut buffer = vec![0; super::MAX_DATAGRAM];

    loop {
        let len = tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut buffer) => match received {
                Ok((len, _peer)) => len,
                Err(error) => {
                    tracing::warn!(?error, "Failed to receive pixel datagram");
                    continue;
                }
            },
        };

        handle_datagram(&ctx, &buffer[..len]);
    }

    tracing::debug!("UDP pixel listener stopped");
}

pub async fn serve_tcp(
    listener: TcpListener,
    ctx: Context,
    tracker: TaskTracker,
    token: CancellationToken,
) {
    tracing::info!(addr = ?listener.local_addr().ok(), "Listening for pixel commands over TCP");

    loop {
        let (stream, peer) = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(error) => {
                    tracing::warn!(?error, "Failed to accept pixel connection");
                    continue;
                }
            },
        };

        tracing::info!(?peer, "Pixel connection");
        tracker.spawn(handle_connection(stream, peer, ctx.clone(), token.clone()));
    }

    tracing::debug!("TCP pixel listener stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Context,
    token: CancellationToken,
) {
    let (read, mut write) = stream.into_split();
    let mut lines = FramedRead::new(read, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    loop {
        let line = tokio::select! {
            _ = token.cancelled() => break,
            line = lines.next() => line,
        };

        let line = match line {
            None => break,
            Some(Ok(line)) => line,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                tracing::warn!(?peer, "Line too long, closing pixel connection");
                break;
            }
            Some(Err(LinesCodecError::Io(error))) => {
                tracing::debug!(?peer, ?error, "Pixel connection failed");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(error) => {
                tracing::warn!(?peer, ?error, %line, "Invalid pixel command, closing connection");
                break;
            }
        };

        let reply = {
            let mut board = ctx.board.lock();
            board.touch_stream();
            command.apply(&mut board.stream)
        };

        if let Some(reply) = reply {
            if let Err(error) = write.write_all(reply.as_bytes()).await {
                tracing::debug!(?peer, ?error, "Failed to reply, closing pixel connection");
                break;
            }
        }
    }

    tracing::info!(?peer, "Pixel connection closed");
}

#[cfg(test)]
mod tests {
    use rgb::RGB8;
    use tokio::io::AsyncBufReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::io::BufReader;
    use tokio::net::TcpListener;
    use tokio::net::TcpStream;

    use super::blend;
    use super::Command;
    use super::CommandError;
    use crate::buffer::PixelBuffer;
    use crate::protocol::testing::context;

    #[test]
    fn parse_commands() {
        assert_eq!("SIZE".parse(), Ok(Command::Size));
        assert_eq!("PX 3 4".parse(), Ok(Command::Get { x: 3, y: 4 }));
        assert_eq!(
            "PX 3 4 ff8800".parse(),
            Ok(Command::Set {
                x: 3,
                y: 4,
                color: RGB8::new(0xff, 0x88, 0)
            })
        );
        assert_eq!(
            "PX -1 0 00000080".parse(),
            Ok(Command::Blend {
                x: -1,
                y: 0,
                color: RGB8::default(),
                alpha: 0x80
            })
        );
    }

    #[test]
    fn reject_malformed_commands() {
        assert!(matches!("PY 1 1".parse::<Command>(), Err(CommandError::Unknown(_))));
        assert_eq!("PX 1".parse::<Command>(), Err(CommandError::MissingCoordinate));
        assert!(matches!(
            "PX a 1".parse::<Command>(),
            Err(CommandError::InvalidCoordinate(_))
        ));
        assert!(matches!("PX 1 1 fff".parse::<Command>(), Err(CommandError::Color(_))));
        assert!(matches!("PX 1 1 gggggg".parse::<Command>(), Err(CommandError::Color(_))));
        assert!(matches!(
            "PX 1 1 ffffff 1".parse::<Command>(),
            Err(CommandError::Trailing(_))
        ));
    }

    #[test]
    fn blend_uses_red_of_destination() {
        let dst = RGB8::new(255, 0, 0);
        assert_eq!(blend(RGB8::new(0, 0, 0), dst, 0), RGB8::new(255, 255, 255));
        assert_eq!(blend(RGB8::new(10, 20, 30), dst, 255), RGB8::new(10, 20, 30));
    }

    #[test]
    fn get_outside_buffer_answers_red() {
        let mut buffer = PixelBuffer::new(2, 2);
        assert_eq!(
            Command::Get { x: 5, y: 0 }.apply(&mut buffer).as_deref(),
            Some("PX 5 0 ff0000\n")
        );
        assert_eq!(
            Command::Get { x: 1, y: 1 }.apply(&mut buffer).as_deref(),
            Some("PX 1 1 000000\n")
        );
        assert_eq!(Command::Size.apply(&mut buffer).as_deref(), Some("SIZE 2 2\n"));
    }

    #[test]
    fn datagram_stops_at_first_bad_line() {
        let ctx = context();
        super::handle_datagram(&ctx, b"PX 0 0 ff0000\nPX 1\nPX 2 0 00ff00\n");

        let board = ctx.board.lock();
        assert_eq!(board.stream.get(0, 0), Some(RGB8::new(255, 0, 0)));
        assert_eq!(board.stream.get(2, 0), Some(RGB8::default()));
        assert!(board.last_stream_input.is_some());
    }

    async fn connect() -> (crate::state::Context, TcpStream, tokio_util::sync::CancellationToken) {
        let ctx = context();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = tokio_util::sync::CancellationToken::new();
        let tracker = tokio_util::task::TaskTracker::new();
        tokio::spawn(super::serve_tcp(listener, ctx.clone(), tracker, token.clone()));

        (ctx, TcpStream::connect(addr).await.unwrap(), token)
    }

    #[tokio::test]
    async fn tcp_set_then_get() {
        let (_ctx, stream, token) = connect().await;
        let (read, mut write) = stream.into_split();
        let mut read = BufReader::new(read);

        write.write_all(b"PX 3 4 ff0000\nPX 3 4\n").await.unwrap();
        let mut reply = String::new();
        read.read_line(&mut reply).await.unwrap();
        insta::assert_snapshot!(reply.trim_end(), @"PX 3 4 ff0000");

        write.write_all(b"SIZE\n").await.unwrap();
        reply.clear();
        read.read_line(&mut reply).await.unwrap();
        assert_eq!(reply, "SIZE 64 16\n");

        token.cancel();
    }

    #[tokio::test]
    async fn tcp_pipelined_gets_stay_in_step() {
        let (_ctx, stream, token) = connect().await;
        let (read, mut write) = stream.into_split();
        let mut read = BufReader::new(read);

        write
            .write_all(b"PX 1 1 00ff00\nPX 999 0\nPX 1 1\n")
            .await
            .unwrap();

        let mut replies = String::new();
        for _ in 0..2 {
            read.read_line(&mut replies).await.unwrap();
        }
        insta::assert_snapshot!(replies.trim_end(), @r"
        PX 999 0 ff0000
        PX 1 1 00ff00
        ");

        token.cancel();
    }

    #[tokio::test]
    async fn tcp_malformed_command_closes_connection() {
        let (ctx, stream, token) = connect().await;
        let (read, mut write) = stream.into_split();
        let mut read = BufReader::new(read);

        write.write_all(b"PX 1 1 ff0000\nbogus\nPX 2 2 ff0000\n").await.unwrap();

        let mut rest = String::new();
        assert_eq!(read.read_line(&mut rest).await.unwrap(), 0);

        let board = ctx.board.lock();
        assert_eq!(board.stream.get(1, 1), Some(RGB8::new(255, 0, 0)));
        assert_eq!(board.stream.get(2, 2), Some(RGB8::default()));
        drop(board);

        token.cancel();
    }
}
