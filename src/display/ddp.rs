use ddp_rs::connection::DDPConnection;
use rgb::RGB8;
use smart_leds_trait::SmartLedsWrite;

use super::Display;
use super::DisplayError;
use crate::buffer::PixelBuffer;
use crate::config::DdpConfig;
use crate::config::Layout;

/// Streams pixels over a DDP connection.
pub struct Writer {
    connection: DDPConnection,
}

impl Writer {
    pub fn new(connection: DDPConnection) -> Self {
        Self { connection }
    }
}

impl SmartLedsWrite for Writer {
    type Error = ddp_rs::error::DDPError;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.connection
            .write(
                &iterator
                    .into_iter()
                    .map(|c| c.into())
                    .flat_map(|rgb| [rgb.r, rgb.g, rgb.b].into_iter())
                    .collect::<Vec<u8>>(),
            )
            .map(drop)
    }
}

pub struct DdpDisplay {
    writer: Writer,
    layout: Layout,
    width: usize,
    height: usize,
    brightness: u8,
}

impl DdpDisplay {
    pub fn connect(
        config: &DdpConfig,
        width: usize,
        height: usize,
        brightness_percent: u8,
    ) -> Result<Self, DisplayError> {
        let connection = DDPConnection::try_new(
            std::net::SocketAddr::new(config.host, config.port),
            ddp_rs::protocol::PixelConfig::default(), // RGB, 8 bits per channel
            ddp_rs::protocol::ID::Default,
            std::net::UdpSocket::bind(("0.0.0.0", config.udp_port))
                .map_err(DisplayError::UdpBind)?,
        )?;

        Ok(Self {
            writer: Writer::new(connection),
            layout: config.layout,
            width,
            height,
            brightness: percent_to_brightness(brightness_percent),
        })
    }

    fn write(&mut self, pixels: Vec<RGB8>) -> Result<(), DisplayError> {
        let brightness = self.brightness;
        self.writer
            .write(smart_leds::brightness(pixels.into_iter(), brightness))
            .map_err(DisplayError::from)
    }
}

fn percent_to_brightness(percent: u8) -> u8 {
    (u16::from(percent.min(100)) * 255 / 100) as u8
}

/// Panel order of `frame`.
fn ordered(frame: &PixelBuffer, layout: Layout) -> Vec<RGB8> {
    if layout == Layout::Rectangular {
        return frame.pixels().collect();
    }

    let mut out = Vec::with_capacity(frame.width() * frame.height());

    for y in 0..frame.height() {
        let reverse = y % 2 == 1;

        for i in 0..frame.width() {
            let x = if reverse { frame.width() - 1 - i } else { i };
            out.push(frame.get(x as i32, y as i32).unwrap_or_default());
        }
    }

    out
}

impl Display for DdpDisplay {
    fn present(&mut self, frame: &PixelBuffer) -> Result<(), DisplayError> {
        let pixels = ordered(frame, self.layout);
        self.write(pixels)
    }

    fn fill(&mut self, color: RGB8) -> Result<(), DisplayError> {
        self.write(vec![color; self.width * self.height])
    }
}
