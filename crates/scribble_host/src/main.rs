#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};
use lazy_static::lazy_static;
use scribble_edit::collaboration::{ServerConfig, run_server};
use scribble_engine::Image;
use semver::Version;

mod settings;

lazy_static! {
    pub static ref VERSION: Version = Version::parse(env!("CARGO_PKG_VERSION")).unwrap();
}

#[derive(Parser, Debug)]
#[command(version, about = "Collaborative, versioned image editing", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Host a collaboration server
    Host {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(short, long)]
        bind: Option<IpAddr>,

        /// Config file (default: scribble.toml in the config directory)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Image every new room starts with, instead of a blank canvas
        #[arg(long, value_name = "FILE")]
        canvas: Option<PathBuf>,

        /// Size of the blank canvas
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,

        /// Maximum participants per room (0 = unlimited)
        #[arg(long)]
        max_participants: Option<usize>,

        /// Outbound queue length per participant
        #[arg(long)]
        queue_len: Option<usize>,

        /// Broadcast changed regions instead of full images
        #[arg(long)]
        send_diffs: bool,
    },
}

fn start_logger() -> Option<LoggerHandle> {
    let Some(log_dir) = settings::log_dir() else {
        eprintln!("Failed to create log directory");
        return None;
    };
    let logger = Logger::try_with_env_or_str("info, tungstenite=warn, tokio_tungstenite=warn").ok()?;
    match logger
        .log_to_file(FileSpec::default().directory(&log_dir).basename("scribble").suffix("log").suppress_timestamp())
        .rotate(Criterion::Size(64 * 1024), Naming::Numbers, Cleanup::KeepLogFiles(3))
        .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
        .start()
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to start logger: {e}");
            None
        }
    }
}

fn load_canvas(path: &Path) -> anyhow::Result<Image> {
    let rgba = image::open(path).with_context(|| format!("opening canvas {}", path.display()))?.to_rgba8();
    Ok(Image::from_rgba_image(rgba)?)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logger = start_logger();
    log::info!("Starting scribble {}", *VERSION);

    let Command::Host {
        port,
        bind,
        config,
        canvas,
        width,
        height,
        max_participants,
        queue_len,
        send_diffs,
    } = args.command;

    let mut server_config: ServerConfig = settings::load_server_config(config.as_deref())?;
    if bind.is_some() || port.is_some() {
        server_config.bind_addr = SocketAddr::new(
            bind.unwrap_or(server_config.bind_addr.ip()),
            port.unwrap_or(server_config.bind_addr.port()),
        );
    }
    if let Some(width) = width {
        server_config.canvas_width = width;
    }
    if let Some(height) = height {
        server_config.canvas_height = height;
    }
    if let Some(max) = max_participants {
        server_config.max_participants = max;
    }
    if let Some(len) = queue_len {
        server_config.outbound_queue_len = len;
    }
    server_config.send_diffs |= send_diffs;
    if let Some(path) = canvas {
        let image = load_canvas(&path)?;
        log::info!("Rooms start from {} ({}x{})", path.display(), image.width(), image.height());
        server_config.initial_canvas = Some(image);
    }

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(run_server(server_config))?;
    log::info!("Shutting down.");
    Ok(())
}
