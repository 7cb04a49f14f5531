//! Emulation of a networked character LCD.
//!
//! Clients drive screens made of text and bar widgets. All widgets are drawn
//! into the board's LCD layer, one character cell per `cell_width` by
//! `cell_height` pixels.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tokio_util::codec::LinesCodec;
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub mod command;
pub mod screens;

use self::command::Request;
use self::screens::CellGeometry;
use self::screens::ClientId;
use self::screens::Screens;
use crate::state::Context;

const MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LcdError {
    #[error("Empty command")]
    Empty,

    #[error("Unterminated quote")]
    UnterminatedQuote,

    #[error("Invalid command \"{0}\"")]
    UnknownCommand(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Missing value for \"{0}\"")]
    MissingValue(String),

    #[error("Invalid {name} \"{value}\"")]
    InvalidArgument { name: &'static str, value: String },

    #[error("Invalid widget type \"{0}\"")]
    UnknownWidgetType(String),

    #[error("Invalid screen option \"{0}\"")]
    UnknownScreenKey(String),

    #[error("Invalid screen id \"{0}\"")]
    UnknownScreen(String),

    #[error("Invalid widget id \"{0}\"")]
    UnknownWidget(String),

    #[error("Screen \"{0}\" already exists")]
    DuplicateScreen(String),

    #[error("Widget \"{0}\" already exists")]
    DuplicateWidget(String),
}

/// Screen registry shared by all connections.
#[derive(Debug, Clone, Default)]
pub struct SharedScreens(Arc<Mutex<Screens>>);

impl SharedScreens {
    pub fn lock(&self) -> MutexGuard<'_, Screens> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One connected client.
pub struct Session {
    client: ClientId,
    ctx: Context,
    screens: SharedScreens,
}

impl Session {
    pub fn new(client: ClientId, ctx: Context, screens: SharedScreens) -> Self {
        Self {
            client,
            ctx,
            screens,
        }
    }

    fn cell(&self) -> CellGeometry {
        CellGeometry {
            width: self.ctx.config.lcd.cell_width,
            height: self.ctx.config.lcd.cell_height,
        }
    }

    /// Process one line and produce the reply, including the newline.
    pub async fn handle_line(&self, line: &str) -> String {
        let result = match line.parse::<Request>() {
            Ok(request) => self.handle_request(request).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(reply) => reply,
            Err(error) => {
                tracing::debug!(client = self.client, %line, %error, "Rejected LCD command");
                format!("huh? {error}\n")
            }
        }
    }

    async fn handle_request(&self, request: Request) -> Result<String, LcdError> {
        let mutating = request.is_mutating();
        let client = self.client;

        match request {
            Request::Hello => return Ok(self.greeting()),
            Request::Noop | Request::ClientIgnored => {}
            Request::ScreenAdd { screen } => self.screens.lock().add_screen(client, screen)?,
            Request::ScreenDel { screen } => self.screens.lock().remove_screen(client, &screen)?,
            Request::ScreenSet { screen, settings } => {
                self.screens
                    .lock()
                    .configure_screen(client, &screen, settings)?;
            }
            Request::WidgetAdd {
                screen,
                widget,
                kind,
            } => self.screens.lock().add_widget(client, &screen, widget, kind)?,
            Request::WidgetDel { screen, widget } => {
                self.screens.lock().remove_widget(client, &screen, &widget)?;
            }
            Request::WidgetSet {
                screen,
                widget,
                args,
            } => {
                let wanted = self
                    .screens
                    .lock()
                    .set_widget(client, &screen, &widget, &args)?;

                if let Some(text) = wanted {
                    self.rasterize_widget(&screen, &widget, text).await;
                }
            }
        }

        if mutating {
            self.redraw();
        }

        Ok(String::from("success\n"))
    }

    fn greeting(&self) -> String {
        let cell = self.cell();
        let columns = self.ctx.config.display.width / cell.width;
        let rows = self.ctx.config.display.height / cell.height;

        format!(
            "connect LCDproc 0.5.9 protocol 0.3 lcd wid {columns} hgt {rows} cellwid {} cellhgt {}\n",
            cell.width, cell.height
        )
    }

    async fn rasterize_widget(&self, screen: &str, widget: &str, text: String) {
        let lcd = &self.ctx.config.lcd;
        let marked = format!("{}{text}", lcd.markup);
        let font = self.ctx.config.fonts.lcd.clone();

        let Some(raster) = super::rasterize(&self.ctx, font, marked, lcd.cell_height).await else {
            return;
        };

        if !self
            .screens
            .lock()
            .attach_raster(self.client, screen, widget, &text, raster)
        {
            tracing::debug!(client = self.client, %screen, %widget, "Widget changed while rendering");
        }
    }

    /// Repaint the LCD layer from scratch.
    pub fn redraw(&self) {
        let screens = self.screens.lock();
        let mut board = self.ctx.board.lock();
        screens.redraw(&mut board.lcd, self.cell(), self.ctx.config.lcd.bar_color);
    }

    /// Forget everything the client created.
    pub fn close(&self) {
        let removed = self.screens.lock().remove_client(self.client);
        tracing::debug!(client = self.client, removed, "Removed screens of LCD client");
        self.redraw();
    }
}

pub async fn serve(listener: TcpListener, ctx: Context, tracker: TaskTracker, token: CancellationToken) {
    tracing::info!(addr = ?listener.local_addr().ok(), "Listening for LCD clients");
    let screens = SharedScreens::default();
    let mut next_client: ClientId = 0;

    loop {
        let (stream, peer) = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(error) => {
                    tracing::warn!(?error, "Failed to accept LCD connection");
                    continue;
                }
            },
        };

        next_client += 1;
        tracing::info!(?peer, client = next_client, "LCD connection");

        let session = Session::new(next_client, ctx.clone(), screens.clone());
        tracker.spawn(handle_connection(stream, peer, session, token.clone()));
    }

    tracing::debug!("LCD listener stopped");
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, session: Session, token: CancellationToken) {
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
                tracing::warn!(?peer, "Line too long, closing LCD connection");
                break;
            }
            Some(Err(LinesCodecError::Io(error))) => {
                tracing::debug!(?peer, ?error, "LCD connection failed");
                break;
            }
        };

        let reply = session.handle_line(&line).await;

        if let Err(error) = write.write_all(reply.as_bytes()).await {
            tracing::debug!(?peer, ?error, "Failed to reply, closing LCD connection");
            break;
        }
    }

    session.close();
    tracing::info!(?peer, "LCD connection closed");
}

#[cfg(test)]
mod tests {
    use rgb::RGB8;
    use tokio::io::AsyncBufReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::io::BufReader;
    use tokio::net::TcpListener;
    use tokio::net::TcpStream;

    use super::Session;
    use super::SharedScreens;
    use crate::buffer::is_black;
    use crate::config::Config;
    use crate::state::Context;

    fn context() -> Context {
        Context::new(Config::from_toml("[display]\nwidth = 128\nheight = 64\n").unwrap())
    }

    /// Bounding box of all lit pixels of the LCD layer.
    fn lit_area(ctx: &Context) -> Option<(i32, i32, i32, i32)> {
        let board = ctx.board.lock();
        let mut area: Option<(i32, i32, i32, i32)> = None;

        for y in 0..board.lcd.height() as i32 {
            for x in 0..board.lcd.width() as i32 {
                if board.lcd.get(x, y).is_some_and(|p| !is_black(p)) {
                    area = Some(match area {
                        None => (x, y, x, y),
                        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                    });
                }
            }
        }

        area
    }

    #[tokio::test]
    async fn replies() {
        let ctx = context();
        let session = Session::new(1, ctx, SharedScreens::default());

        insta::assert_snapshot!(
            session.handle_line("hello").await.trim_end(),
            @"connect LCDproc 0.5.9 protocol 0.3 lcd wid 8 hgt 4 cellwid 16 cellhgt 16"
        );
        assert_eq!(session.handle_line("client_set -name test").await, "success\n");
        assert_eq!(session.handle_line("screen_add s").await, "success\n");
        insta::assert_snapshot!(
            session.handle_line("screen_add s").await.trim_end(),
            @r#"huh? Screen "s" already exists"#
        );
        insta::assert_snapshot!(
            session.handle_line("frobnicate").await.trim_end(),
            @r#"huh? Invalid command "frobnicate""#
        );
    }

    #[tokio::test]
    async fn title_and_bar_widgets() {
        let ctx = context();
        let session = Session::new(1, ctx.clone(), SharedScreens::default());

        for line in ["screen_add s", "widget_add s t title", "widget_set s t Hi"] {
            assert_eq!(session.handle_line(line).await, "success\n", "{line}");
        }
        let (x0, y0, _, y1) = lit_area(&ctx).unwrap();
        assert!(x0 < 12 && y0 < 16 && y1 < 16);

        session.handle_line("widget_del s t").await;
        assert_eq!(lit_area(&ctx), None);

        session.handle_line("widget_add s b hbar").await;
        session.handle_line("widget_set s b 1 2 10").await;
        assert_eq!(lit_area(&ctx), Some((16, 32, 47, 47)));
        assert_eq!(ctx.board.lock().lcd.get(16, 32), Some(RGB8::new(0, 255, 0)));
    }

    #[tokio::test]
    async fn widget_text_lands_on_its_cell() {
        let ctx = context();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = tokio_util::sync::CancellationToken::new();
        let tracker = tokio_util::task::TaskTracker::new();
        tokio::spawn(super::serve(listener, ctx.clone(), tracker.clone(), token.clone()));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut read = BufReader::new(read);

        let mut replies = Vec::new();
        for line in ["hello", "screen_add 1", "widget_add 1 1 string", "widget_set 1 1 2 3 Hi"] {
            write.write_all(format!("{line}\n").as_bytes()).await.unwrap();
            let mut reply = String::new();
            read.read_line(&mut reply).await.unwrap();
            replies.push(reply);
        }
        assert!(replies[0].starts_with("connect"));
        assert!(replies[1..].iter().all(|r| r == "success\n"), "{replies:?}");

        let (x0, y0, x1, y1) = lit_area(&ctx).unwrap();
        assert!(x0 >= 2 * 16 && x1 < 2 * 16 + 12, "{x0}..{x1}");
        assert!(y0 >= 3 * 16 && y1 < 4 * 16, "{y0}..{y1}");
        let lit = ctx.board.lock().lcd.get(x0, y0).unwrap();
        assert_eq!((lit.r, lit.b), (0, 0));

        drop(write);
        drop(read);
        tracker.close();
        tracker.wait().await;
        assert_eq!(lit_area(&ctx), None);

        token.cancel();
    }
}
