//! Fluxwm
//!
//! A reparenting X11 window manager: frames, decorations, tab groups,
//! workspaces and the ICCCM/EWMH state a pager needs.

mod config;
mod shared;
mod wm;
mod x11_async;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::wm::display::DisplayConnection;
use crate::wm::server::XServer;
use crate::wm::WindowManager;
use crate::x11_async::X11EventStream;

/// Command line options
#[derive(Debug, Default)]
struct Options {
    /// Take over from a running window manager
    replace: bool,
    display: Option<String>,
    config: Option<PathBuf>,
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--replace" | "-r" => options.replace = true,
                "--display" | "-d" => {
                    options.display = Some(args.next().context("--display needs a value")?);
                }
                "--config" | "-c" => {
                    options.config = Some(PathBuf::from(
                        args.next().context("--config needs a value")?,
                    ));
                }
                other => anyhow::bail!("Unknown argument: {}", other),
            }
        }
        Ok(options)
    }
}

/// Main application state
struct App {
    wm: WindowManager<DisplayConnection>,

    /// Display socket readiness
    stream: X11EventStream,

    /// Configuration file given on the command line
    config_path: Option<PathBuf>,
}

impl App {
    fn new(options: &Options) -> Result<Self> {
        let config = Config::load(options.config.as_deref())?;
        let server = DisplayConnection::connect(options.display.as_deref(), options.replace)?;
        let stream = X11EventStream::new(server.raw_fd())?;
        let mut wm = WindowManager::new(server, config)?;
        wm.scan_existing_windows()?;
        Ok(Self {
            wm,
            stream,
            config_path: options.config.clone(),
        })
    }

    /// Handle everything already received from the display
    fn drain_events(&mut self) -> Result<()> {
        while let Some(event) = self.wm.server.poll_event()? {
            if let Err(e) = self.wm.handle_event(&event) {
                error!("Failed to handle {:?}: {:#}", event, e);
            }
        }
        Ok(())
    }

    fn reload(&mut self) {
        match Config::load(self.config_path.as_deref()) {
            Ok(config) => {
                if let Err(e) = self.wm.reload(config) {
                    error!("Failed to apply reloaded configuration: {:#}", e);
                }
            }
            Err(e) => warn!("Keeping current configuration: {:#}", e),
        }
    }

    /// Main event loop
    async fn run(mut self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;

        info!("Starting main event loop");
        loop {
            self.drain_events()?;
            if let Err(e) = self.wm.fire_timers(Instant::now()) {
                error!("Failed to run timers: {:#}", e);
            }
            self.wm.server.flush()?;

            if self.wm.server.shutdown_requested() {
                break;
            }
            if self.wm.server.take_reload() {
                self.reload();
                continue;
            }

            let deadline = self.wm.timers.next_deadline();
            tokio::select! {
                result = self.stream.wait_readable() => result?,
                () = async {
                    match deadline {
                        Some(deadline) => {
                            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                        }
                        None => std::future::pending().await,
                    }
                } => debug!("Timer deadline reached"),
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    self.wm.server.request_shutdown();
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down");
                    self.wm.server.request_shutdown();
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading configuration");
                    self.wm.server.request_reload();
                }
            }
        }

        info!("Exiting main loop");
        self.wm.shutdown()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "fluxwm=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Fluxwm");
    let options = Options::parse(std::env::args().skip(1))?;
    if options.replace {
        info!("--replace flag detected: will attempt to replace existing WM");
    }

    let app = App::new(&options)?;
    if let Err(e) = app.run().await {
        error!("Window manager error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
