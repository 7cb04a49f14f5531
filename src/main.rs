use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

mod blit;
mod buffer;
mod cli;
mod color;
mod config;
mod display;
mod error;
mod font;
mod logging;
mod overlay;
mod protocol;
mod raster;
mod render;
mod state;
mod systemd;

use crate::error::Error;
use crate::protocol::announce::Announcer;
use crate::render::RenderLoop;
use crate::render::RenderSettings;
use crate::state::Context;

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    setup_panic();
    color_eyre::install().map_err(Error::InstallingColorEyre)?;
    let cli = <crate::cli::Cli as clap::Parser>::parse();
    crate::logging::setup(cli.verbosity)?;
    let cfg = crate::config::Config::load(&cli.config).await?;

    match cli.command {
        cli::Command::Run => {
            let process = systemd::ProcessState::new();
            process.set_starting();

            if let Err(error) = run(cfg, &process).await {
                process.set_failed();
                return Err(error.into());
            }

            process.set_stopping();
        }
        cli::Command::VerifyConfig => {
            tracing::info!("Configuration verified");
        }
    }

    Ok(())
}

fn setup_panic() {
    human_panic::setup_panic!(human_panic::Metadata::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ));
}

async fn bind_udp(what: &'static str, addr: SocketAddr) -> Result<UdpSocket, Error> {
    UdpSocket::bind(addr)
        .await
        .map_err(|source| Error::Bind { what, addr, source })
}

async fn bind_tcp(what: &'static str, addr: SocketAddr) -> Result<TcpListener, Error> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { what, addr, source })
}

/// Resolves once the process is asked to stop.
async fn shutdown_signal() -> Result<&'static str, Error> {
    use tokio::signal::unix::signal;
    use tokio::signal::unix::SignalKind;

    let mut interrupt = signal(SignalKind::interrupt()).map_err(Error::Signal)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(Error::Signal)?;
    let mut user1 = signal(SignalKind::user_defined1()).map_err(Error::Signal)?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = user1.recv() => "SIGUSR1",
    };

    Ok(name)
}

async fn run(config: crate::config::Config, process: &systemd::ProcessState) -> Result<(), Error> {
    let net = &config.network;
    let addr = |port| SocketAddr::new(net.interface, port);

    let text_socket = bind_udp("text message", addr(net.text_port)).await?;
    let pixel_udp_socket = bind_udp("pixel ASCII", addr(net.pixel_ascii_udp_port)).await?;
    let pixel_binary_socket = bind_udp("pixel binary", addr(net.pixel_binary_port)).await?;
    let pixel_tcp_listener = bind_tcp("pixel ASCII", addr(net.pixel_tcp_port)).await?;
    let lcd_listener = bind_tcp("LCD", addr(net.lcd_port)).await?;

    let announce_target = Announcer::broadcast_target(net.announce_port);
    let announcer = Announcer {
        socket: Announcer::bind(net.announce_port)
            .await
            .map_err(|source| Error::Bind {
                what: "announcement",
                addr: announce_target,
                source,
            })?,
        target: announce_target,
        payload: protocol::announce::payload(
            net.interface,
            net.pixel_binary_port,
            config.display.width,
            config.display.height,
        ),
        interval: net.announce_interval,
    };

    let display = display::open(&config.display)?;
    let settings = RenderSettings::from(&config);
    let ctx = Context::new(config);

    let token = CancellationToken::new();
    let tracker = TaskTracker::new();

    tracker.spawn(protocol::text::serve(text_socket, ctx.clone(), token.clone()));
    tracker.spawn(protocol::pixel::serve_udp(pixel_udp_socket, ctx.clone(), token.clone()));
    tracker.spawn(protocol::pixel_binary::serve(pixel_binary_socket, ctx.clone(), token.clone()));
    tracker.spawn(protocol::pixel::serve_tcp(
        pixel_tcp_listener,
        ctx.clone(),
        tracker.clone(),
        token.clone(),
    ));
    tracker.spawn(protocol::lcd::serve(
        lcd_listener,
        ctx.clone(),
        tracker.clone(),
        token.clone(),
    ));
    tracker.spawn(announcer.run(token.clone()));

    let render_loop = RenderLoop::new(ctx.board.clone(), display, settings);
    let render = tokio::task::spawn_blocking({
        let token = token.clone();
        move || render_loop.run(token)
    });

    process.set_running();

    let result = tokio::select! {
        signal = shutdown_signal() => signal.map(|name| tracing::info!(signal = name, "Shutting down")),
        _ = token.cancelled() => Ok(()),
    };

    token.cancel();
    tracker.close();
    tracker.wait().await;
    tracing::debug!("All listeners stopped");

    render.await.map_err(Error::RenderLoop)?;
    ctx.fonts.uninit();

    result
}
