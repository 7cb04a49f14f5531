use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Setting up error reporting failed")]
    InstallingColorEyre(#[source] color_eyre::Report),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Display error")]
    Display(#[from] crate::display::DisplayError),

    #[error("Failed to bind {what} socket on {addr}")]
    Bind {
        what: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install signal handler")]
    Signal(#[source] std::io::Error),

    #[error("Render loop panicked")]
    RenderLoop(#[source] tokio::task::JoinError),
}
