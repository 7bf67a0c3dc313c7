//! Configuration for the `sync` command-line client.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sync_core::hid::DeviceMode;
use sync_core::{StreamingOptions, TcpTransport};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where the tablet's byte channels are reachable.
    pub network: NetworkConfig,
    /// Live capture settings.
    pub streaming: StreamingConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// `host:port` of the HID byte channel (e.g. an RFCOMM bridge).
    pub streaming_address: String,
    /// `host:port` of the OBEX file-transfer byte channel.
    pub ftp_address: String,
    /// Give up opening a channel after this long. 0 waits forever.
    pub connect_timeout_ms: u64,
    /// Give up waiting for a file-transfer reply after this long.
    pub request_timeout_ms: u64,
}

/// Live capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Keep-alive period while in capture mode.
    pub keepalive_ms: u64,
    /// Device mode for `sync stream`: "capture" or "file".
    pub mode: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            streaming_address: "127.0.0.1:7450".into(),
            ftp_address: "127.0.0.1:7451".into(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            keepalive_ms: 3_000,
            mode: "capture".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    fn with_timeout(&self, address: &str) -> TcpTransport {
        let transport = TcpTransport::new(address);
        match self.network.connect_timeout_ms {
            0 => transport,
            ms => transport.with_timeout(Duration::from_millis(ms)),
        }
    }

    pub fn streaming_transport(&self) -> TcpTransport {
        self.with_timeout(&self.network.streaming_address)
    }

    pub fn ftp_transport(&self) -> TcpTransport {
        self.with_timeout(&self.network.ftp_address)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms.max(1))
    }

    pub fn streaming_options(&self) -> StreamingOptions {
        StreamingOptions {
            keepalive: Duration::from_millis(self.streaming.keepalive_ms.max(100)),
        }
    }

    /// Mode to put the device in for streaming. Unknown names fall back
    /// to capture.
    pub fn streaming_mode(&self) -> DeviceMode {
        match self.streaming.mode.trim().to_ascii_lowercase().as_str() {
            "file" => DeviceMode::File,
            "capture" => DeviceMode::Capture,
            other => {
                tracing::warn!("unknown streaming mode {other:?}; using capture");
                DeviceMode::Capture
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
