use rgb::RGB8;

use crate::buffer::PixelBuffer;
use crate::config::Backend;
use crate::config::DisplayConfig;

mod ddp;
mod headless;

pub use self::ddp::DdpDisplay;
pub use self::headless::HeadlessDisplay;

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("DDP error")]
    Ddp(#[from] ddp_rs::error::DDPError),

    #[error("Failed to bind UDP socket for DDP output")]
    UdpBind(#[source] std::io::Error),
}

/// Something a finished frame can be pushed to.
pub trait Display: Send {
    /// Make `frame` visible.
    fn present(&mut self, frame: &PixelBuffer) -> Result<(), DisplayError>;

    fn fill(&mut self, color: RGB8) -> Result<(), DisplayError>;

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.fill(RGB8::default())
    }
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn present(&mut self, frame: &PixelBuffer) -> Result<(), DisplayError> {
        (**self).present(frame)
    }

    fn fill(&mut self, color: RGB8) -> Result<(), DisplayError> {
        (**self).fill(color)
    }
}

pub fn open(config: &DisplayConfig) -> Result<Box<dyn Display>, DisplayError> {
    match &config.backend {
        Backend::Headless => {
            tracing::info!(width = config.width, height = config.height, "Using headless display");
            Ok(Box::new(HeadlessDisplay::new(config.width, config.height)))
        }
        Backend::Ddp(ddp) => {
            tracing::info!(host = %ddp.host, port = ddp.port, "Using DDP display");
            let display = DdpDisplay::connect(ddp, config.width, config.height, config.brightness)?;
            Ok(Box::new(display))
        }
    }
}
