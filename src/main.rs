//! # Estafeta CLI
//!
//! Command-line front end for the Bluetooth printer bridge.
//!
//! ## Usage
//!
//! ```bash
//! # Pick a printer from the bonded devices
//! estafeta devices
//! estafeta connect 00:11:62:AA:BB:CC
//!
//! # Print
//! estafeta print "Hello, world"
//! echo "from stdin" | estafeta print
//! estafeta print-raw --file receipt.bin
//! estafeta raster "¿Dónde está?"
//!
//! # Save the raster bitmap instead of printing
//! estafeta raster --png preview.png "¿Dónde está?"
//!
//! # Serve the JSON API
//! estafeta serve --listen 127.0.0.1:8080
//! ```

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use estafeta::{
    EstafetaError, PrinterBridge,
    bridge::{Fanout, JobHandle, NotificationLog, TracingNotifier},
    logging,
    printer::{BridgeSettings, ConfigStore, JsonFileStore},
    protocol::{PrintJob, graphics},
    render::RasterRenderer,
    server::{self, AppState, ServerConfig},
    transport::BluezAdapter,
};

/// Estafeta - Bluetooth ESC/POS printer bridge
#[derive(Parser, Debug)]
#[command(name = "estafeta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Preference file holding the selected printer
    #[arg(long, global = true, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Bridge settings (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = logging::DEFAULT_LEVEL)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show, set or clear the selected printer
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },

    /// List printers bonded with this host
    Devices,

    /// Select a printer and test the connection
    Connect { address: String },

    /// Test the connection to the selected printer
    Check,

    /// Print text
    Print {
        /// Text to print (read from stdin when omitted)
        text: Option<String>,
    },

    /// Send a complete ESC/POS command stream untouched
    PrintRaw {
        /// Binary file to send
        #[arg(long, value_name = "FILE", conflicts_with = "base64")]
        file: Option<PathBuf>,

        /// Base64-encoded payload
        #[arg(long)]
        base64: Option<String>,
    },

    /// Send a command stream wrapped in a wake/init preamble
    PrintAlt {
        /// Binary file to send
        #[arg(long, value_name = "FILE", conflicts_with = "base64")]
        file: Option<PathBuf>,

        /// Base64-encoded payload
        #[arg(long)]
        base64: Option<String>,
    },

    /// Print text as a bitmap
    ///
    /// Text is drawn with the built-in Spleen bitmap face, which has hard
    /// pixel edges. Set `raster.font_path` in the --settings file to a
    /// TrueType font for anti-aliased output.
    Raster {
        text: String,

        /// Output to PNG file instead of printing
        #[arg(long, value_name = "FILE")]
        png: Option<PathBuf>,
    },

    /// Print the built-in self test
    Diagnostic,

    /// Serve the JSON API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
    },
}

#[derive(Subcommand, Debug)]
enum AddressAction {
    /// Print the selected printer
    Get,
    /// Select a printer without connecting
    Set { address: String },
    /// Forget the selected printer
    Clear,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), EstafetaError> {
    let cli = Cli::parse();
    logging::init_logger(&cli.log_level)?;

    let settings = match &cli.settings {
        Some(path) => BridgeSettings::load(path)?,
        None => BridgeSettings::default(),
    };

    // Raster preview needs no printer at all
    if let Commands::Raster {
        text,
        png: Some(png_path),
    } = &cli.command
    {
        let renderer = RasterRenderer::new(settings.raster.clone());
        save_preview(png_path, &renderer.rasterize(text))?;
        println!("Saved to {}", png_path.display());
        return Ok(());
    }

    let store = match &cli.store {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::default_location(),
    };
    let log = Arc::new(NotificationLog::default());
    let notifier = Fanout::new()
        .with(Arc::new(TracingNotifier))
        .with(log.clone());
    let bridge = PrinterBridge::new(
        Arc::new(BluezAdapter::new(settings.rfcomm_channel)),
        ConfigStore::new(store),
        Arc::new(notifier),
        settings,
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(cli.command, bridge, log))
}

async fn dispatch(
    command: Commands,
    bridge: PrinterBridge,
    log: Arc<NotificationLog>,
) -> Result<(), EstafetaError> {
    match command {
        Commands::Address { action } => {
            match action {
                AddressAction::Get => match bridge.get_address() {
                    Some(address) => println!("{}", address),
                    None => println!("No printer configured"),
                },
                AddressAction::Set { address } => {
                    if !bridge.set_address(&address) {
                        return Err(EstafetaError::InvalidAddress(address));
                    }
                    println!("Printer set to {}", address);
                }
                AddressAction::Clear => {
                    bridge.clear_address();
                    println!("Printer cleared");
                }
            }
            Ok(())
        }
        Commands::Devices => {
            let devices = bridge.list_paired();
            if devices.is_empty() {
                println!("No paired devices");
            }
            for device in devices {
                println!("{}  {}", device.address, device.name);
            }
            Ok(())
        }
        Commands::Connect { address } => finish(bridge.connect(&address), &log).await,
        Commands::Check => finish(bridge.check_connection(), &log).await,
        Commands::Print { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            finish(bridge.print(&text), &log).await
        }
        Commands::PrintRaw { file, base64 } => {
            let handle = match (file, base64) {
                (Some(path), _) => bridge.print_raw(read_file(&path)?),
                (None, Some(data)) => bridge.print_base64(&data),
                (None, None) => return Err(missing_payload()),
            };
            finish(handle, &log).await
        }
        Commands::PrintAlt { file, base64 } => {
            let handle = match (file, base64) {
                (Some(path), _) => bridge.submit(PrintJob::Alternative(read_file(&path)?)),
                (None, Some(data)) => bridge.print_alternative(&data),
                (None, None) => return Err(missing_payload()),
            };
            finish(handle, &log).await
        }
        Commands::Raster { text, .. } => finish(bridge.print_raster(&text), &log).await,
        Commands::Diagnostic => finish(bridge.diagnostic_test(), &log).await,
        Commands::Serve { listen } => {
            let config = ServerConfig {
                listen_addr: listen,
            };
            server::serve(AppState::new(config, bridge, log)).await
        }
    }
}

/// Wait for a job and echo its success notification.
async fn finish(handle: JobHandle, log: &NotificationLog) -> Result<(), EstafetaError> {
    let id = handle.id();
    handle.wait().await?;
    if let Some(note) = log.for_job(id).pop() {
        println!("{}", note.message);
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, EstafetaError> {
    std::fs::read(path).map_err(|e| {
        EstafetaError::InvalidPayload(format!("Failed to read {}: {}", path.display(), e))
    })
}

fn missing_payload() -> EstafetaError {
    EstafetaError::InvalidPayload("pass --file or --base64".into())
}

/// Save a raster command (header + bitmap) as a PNG image.
fn save_preview(path: &Path, command: &[u8]) -> Result<(), EstafetaError> {
    use image::{GrayImage, Luma};

    let (width_bytes, height) = graphics::parse_header(command)
        .ok_or_else(|| EstafetaError::InvalidPayload("not a raster command".into()))?;
    let data = &command[graphics::RASTER_HEADER_LEN..];
    let width_bytes = width_bytes as usize;
    let width = width_bytes * 8;

    let mut img = GrayImage::new(width as u32, height as u32);
    for y in 0..height as usize {
        for x in 0..width {
            let byte = data.get(y * width_bytes + x / 8).copied().unwrap_or(0);
            let is_black = (byte >> (7 - (x % 8))) & 1 == 1;
            let color = if is_black { 0u8 } else { 255u8 };
            img.put_pixel(x as u32, y as u32, Luma([color]));
        }
    }

    img.save(path)
        .map_err(|e| EstafetaError::Io(std::io::Error::other(format!("Failed to save PNG: {}", e))))
}
