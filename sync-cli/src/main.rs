//! `sync`: command-line client for the Sync writing tablet.
//!
//! ```text
//! sync stream [--raw]                  Print drawn paths as JSON lines until Ctrl-C
//! sync ls [FOLDER]...                  List a folder on the device
//! sync get NAME [--from F]... [-o OUT] Download a stored file
//! sync rm NAME [--from F]...           Delete a stored file
//! sync erase                           Blank the tablet screen
//! sync --config <path>                 Load a custom config TOML
//! sync --gen-config                    Write default config to stdout
//! ```

mod config;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sync_core::hid::DeviceMode;
use sync_core::{
    CaptureReport, ConnectionPhase, FolderListingItem, FtpEvent, FtpHandle, FtpListener,
    PathSegment, RemotePath, ResultCode, StreamingEvent, StreamingHandle, StreamingListener,
};

use crate::config::CliConfig;

type CliResult<T> = Result<T, Box<dyn Error>>;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sync", version, about = "Command-line client for the Sync writing tablet")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "sync.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream pen input as JSON lines until Ctrl-C.
    Stream {
        /// Also print every capture report.
        #[arg(long)]
        raw: bool,
    },
    /// List a folder; each FOLDER is entered in turn from the root.
    Ls { folders: Vec<String> },
    /// Download a file.
    Get {
        name: String,
        /// Folder to enter first; repeat for nested folders.
        #[arg(long = "from")]
        from: Vec<String>,
        /// Output path; defaults to NAME in the working directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a file.
    Rm {
        name: String,
        #[arg(long = "from")]
        from: Vec<String>,
    },
    /// Blank the tablet screen.
    Erase,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&CliConfig::default())?;
        println!("{text}");
        return Ok(());
    }
    if cli.init_config {
        CliConfig::write_default(&cli.config)?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::load(&cli.config);

    // Logs go to stderr; stdout carries JSON.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("sync v{}", env!("CARGO_PKG_VERSION"));

    match command {
        Command::Stream { raw } => stream(&config, raw).await,
        Command::Ls { folders } => {
            let mut ftp = FtpClient::open(&config).await?;
            let path = ftp.enter(&folders).await?;
            let items = ftp.list().await?;
            ftp.close().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "path": path.to_string(),
                    "items": items,
                }))?
            );
            Ok(())
        }
        Command::Get { name, from, output } => {
            let mut ftp = FtpClient::open(&config).await?;
            ftp.enter(&from).await?;
            let item = ftp
                .list()
                .await?
                .into_iter()
                .find(|i| i.name == name && !i.is_folder())
                .ok_or_else(|| format!("no file named {name:?}"))?;
            let item = ftp.get(item).await?;
            ftp.close().await?;

            let output = output.unwrap_or_else(|| PathBuf::from(&item.name));
            std::fs::write(&output, &item.data)?;
            info!(bytes = item.data.len(), "saved {}", output.display());
            Ok(())
        }
        Command::Rm { name, from } => {
            let mut ftp = FtpClient::open(&config).await?;
            ftp.enter(&from).await?;
            ftp.delete(&name).await?;
            ftp.close().await?;
            info!("deleted {name}");
            Ok(())
        }
        Command::Erase => {
            let tablet = Tablet::open(&config, false).await?;
            tablet.handle.erase().await?;
            tablet.close().await?;
            info!("screen erased");
            Ok(())
        }
    }
}

// ── File transfer ────────────────────────────────────────────────

/// Forwards completions to the command that is waiting for them.
struct FtpForward(mpsc::UnboundedSender<FtpEvent>);

impl FtpListener for FtpForward {
    fn on_connect_complete(&mut self, result: ResultCode) {
        let _ = self.0.send(FtpEvent::Connect(result));
    }

    fn on_disconnect_complete(&mut self, result: ResultCode) {
        let _ = self.0.send(FtpEvent::Disconnect(result));
    }

    fn on_folder_listing_complete(&mut self, items: Option<Vec<FolderListingItem>>, _: ResultCode) {
        let _ = self.0.send(FtpEvent::FolderListing(items));
    }

    fn on_change_folder_complete(&mut self, path: Option<RemotePath>, _: ResultCode) {
        let _ = self.0.send(FtpEvent::ChangeFolder(path));
    }

    fn on_delete_complete(&mut self, name: Option<String>, _: ResultCode) {
        let _ = self.0.send(FtpEvent::Delete(name));
    }

    fn on_get_file_complete(&mut self, item: Option<FolderListingItem>, _: ResultCode) {
        let _ = self.0.send(FtpEvent::GetFile(item));
    }
}

/// One command at a time over an OBEX session.
struct FtpClient {
    handle: FtpHandle,
    task: JoinHandle<FtpForward>,
    events: mpsc::UnboundedReceiver<FtpEvent>,
    timeout: Duration,
}

impl FtpClient {
    async fn open(config: &CliConfig) -> CliResult<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let (handle, task) = FtpHandle::spawn(config.ftp_transport(), FtpForward(tx));
        let mut client = Self {
            handle,
            task,
            events,
            timeout: config.request_timeout(),
        };

        client.handle.open().await?;
        client.handle.connect().await?;
        match client.next().await? {
            FtpEvent::Connect(ResultCode::Ok) => Ok(client),
            _ => Err(format!("cannot connect to {}", config.network.ftp_address).into()),
        }
    }

    async fn next(&mut self) -> CliResult<FtpEvent> {
        match tokio::time::timeout(self.timeout, self.events.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err("file-transfer service stopped".into()),
            Err(_) => Err("timed out waiting for the device".into()),
        }
    }

    /// Enter each folder in turn, returning where we ended up.
    async fn enter(&mut self, folders: &[String]) -> CliResult<RemotePath> {
        let mut path = RemotePath::root();
        for folder in folders {
            self.handle.change_folder(folder.as_str()).await?;
            match self.next().await? {
                FtpEvent::ChangeFolder(Some(now)) => path = now,
                _ => return Err(format!("cannot enter folder {folder:?}").into()),
            }
        }
        Ok(path)
    }

    async fn list(&mut self) -> CliResult<Vec<FolderListingItem>> {
        self.handle.list_folder().await?;
        match self.next().await? {
            FtpEvent::FolderListing(Some(items)) => Ok(items),
            _ => Err("folder listing failed".into()),
        }
    }

    async fn get(&mut self, item: FolderListingItem) -> CliResult<FolderListingItem> {
        let name = item.name.clone();
        self.handle.get_file(item).await?;
        match self.next().await? {
            FtpEvent::GetFile(Some(item)) => Ok(item),
            _ => Err(format!("cannot download {name:?}").into()),
        }
    }

    async fn delete(&mut self, name: &str) -> CliResult<()> {
        self.handle.delete_file(name).await?;
        match self.next().await? {
            FtpEvent::Delete(Some(_)) => Ok(()),
            _ => Err(format!("cannot delete {name:?}").into()),
        }
    }

    async fn close(mut self) -> CliResult<()> {
        self.handle.disconnect().await?;
        if let FtpEvent::Disconnect(result) = self.next().await? {
            if !result.is_ok() {
                warn!("device did not acknowledge disconnect");
            }
        }
        self.handle.shutdown().await?;
        self.task.await?;
        Ok(())
    }
}

// ── Streaming ────────────────────────────────────────────────────

enum StreamUpdate {
    State(ConnectionPhase),
    Event(StreamingEvent),
}

struct StreamForward {
    tx: mpsc::UnboundedSender<StreamUpdate>,
    raw: bool,
}

impl StreamForward {
    fn event(&self, event: StreamingEvent) {
        let _ = self.tx.send(StreamUpdate::Event(event));
    }
}

impl StreamingListener for StreamForward {
    fn on_state_change(&mut self, _previous: &ConnectionPhase, current: &ConnectionPhase) {
        let _ = self.tx.send(StreamUpdate::State(current.clone()));
    }

    fn on_capture_report(&mut self, report: &CaptureReport) {
        if self.raw {
            self.event(StreamingEvent::CaptureReport(*report));
        }
    }

    fn on_drawn_paths(&mut self, paths: &[PathSegment]) {
        self.event(StreamingEvent::DrawnPaths(paths.to_vec()));
    }

    fn on_erase(&mut self) {
        self.event(StreamingEvent::Erase);
    }

    fn on_save(&mut self) {
        self.event(StreamingEvent::Save);
    }
}

struct Tablet {
    handle: StreamingHandle,
    task: JoinHandle<StreamForward>,
    updates: mpsc::UnboundedReceiver<StreamUpdate>,
}

impl Tablet {
    /// Open the HID channel and wait for the device to be configured.
    async fn open(config: &CliConfig, raw: bool) -> CliResult<Self> {
        let (tx, updates) = mpsc::unbounded_channel();
        let (handle, task) = StreamingHandle::spawn(
            config.streaming_transport(),
            StreamForward { tx, raw },
            config.streaming_options(),
        );
        let mut tablet = Self {
            handle,
            task,
            updates,
        };

        tablet.handle.open().await?;
        loop {
            match tablet.updates.recv().await {
                Some(StreamUpdate::State(phase)) if phase.is_connected() => return Ok(tablet),
                Some(StreamUpdate::State(phase)) if phase.is_disconnected() => {
                    return Err(format!(
                        "cannot open {}",
                        config.network.streaming_address
                    )
                    .into());
                }
                Some(_) => {}
                None => return Err("streaming service stopped".into()),
            }
        }
    }

    async fn close(self) -> CliResult<()> {
        self.handle.close().await?;
        self.handle.shutdown().await?;
        self.task.await?;
        Ok(())
    }
}

fn event_json(event: &StreamingEvent) -> serde_json::Value {
    match event {
        StreamingEvent::CaptureReport(report) => json!({ "event": "report", "report": report }),
        StreamingEvent::DrawnPaths(segments) => json!({ "event": "paths", "segments": segments }),
        StreamingEvent::Erase => json!({ "event": "erase" }),
        StreamingEvent::Save => json!({ "event": "save" }),
    }
}

async fn stream(config: &CliConfig, raw: bool) -> CliResult<()> {
    let mut tablet = Tablet::open(config, raw).await?;

    // The device comes up in file mode.
    let mode = config.streaming_mode();
    if mode != DeviceMode::File {
        tablet.handle.set_mode(mode).await?;
    }
    info!(%mode, "streaming; Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, closing");
                break;
            }
            update = tablet.updates.recv() => match update {
                Some(StreamUpdate::Event(event)) => println!("{}", event_json(&event)),
                Some(StreamUpdate::State(phase)) if phase.is_disconnected() => {
                    warn!("tablet disconnected");
                    break;
                }
                Some(StreamUpdate::State(_)) => {}
                None => break,
            },
        }
    }

    tablet.close().await
}

// ── Tests ────────────────────────────────────────────────────────
