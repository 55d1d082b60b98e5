//! Configuration module for the data-path test server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.
//!
//! Packet length and seed are an out-of-band contract with the device
//! under test: both ends must generate the reference packet with the same
//! parameters for validation to succeed.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the test server
#[derive(Parser, Debug)]
#[command(name = "datapath-bench")]
#[command(author = "datapath-bench authors")]
#[command(version = "0.1.0")]
#[command(about = "A UDP test endpoint for device data-path validation", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind all three channel sockets to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Upload channel port
    #[arg(long)]
    pub upload_port: Option<u16>,

    /// Echo channel port
    #[arg(long)]
    pub echo_port: Option<u16>,

    /// Download channel port
    #[arg(long)]
    pub download_port: Option<u16>,

    /// Reference packet length in bytes
    #[arg(short = 'n', long)]
    pub packet_length: Option<usize>,

    /// Reference packet generator seed
    #[arg(short, long)]
    pub seed: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub packet: PacketConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Upload channel port
    #[serde(default = "default_upload_port")]
    pub upload_port: u16,
    /// Echo channel port
    #[serde(default = "default_echo_port")]
    pub echo_port: u16,
    /// Download channel port
    #[serde(default = "default_download_port")]
    pub download_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            upload_port: default_upload_port(),
            echo_port: default_echo_port(),
            download_port: default_download_port(),
        }
    }
}

/// Reference packet configuration
#[derive(Debug, Deserialize)]
pub struct PacketConfig {
    /// Packet length in bytes
    #[serde(default = "default_packet_length")]
    pub length: usize,
    /// Generator seed
    #[serde(default = "default_seed")]
    pub seed: u32,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            length: default_packet_length(),
            seed: default_seed(),
        }
    }
}

/// Loop timing configuration
#[derive(Debug, Deserialize)]
pub struct TimingConfig {
    /// Receive backoff interval in milliseconds
    #[serde(default = "default_poll_backoff_ms")]
    pub poll_backoff_ms: u64,
    /// Download rounds per trigger
    #[serde(default = "default_burst_rounds")]
    pub burst_rounds: u32,
    /// Packets sent back-to-back per round
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    /// Pause between rounds in milliseconds
    #[serde(default = "default_burst_pause_ms")]
    pub burst_pause_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_backoff_ms: default_poll_backoff_ms(),
            burst_rounds: default_burst_rounds(),
            burst_size: default_burst_size(),
            burst_pause_ms: default_burst_pause_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_upload_port() -> u16 {
    7777
}

fn default_echo_port() -> u16 {
    7778
}

fn default_download_port() -> u16 {
    7779
}

fn default_packet_length() -> usize {
    1024
}

fn default_seed() -> u32 {
    1234
}

fn default_poll_backoff_ms() -> u64 {
    50
}

fn default_burst_rounds() -> u32 {
    20
}

fn default_burst_size() -> u32 {
    5
}

fn default_burst_pause_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub upload_port: u16,
    pub echo_port: u16,
    pub download_port: u16,
    pub packet_length: usize,
    pub seed: u32,
    pub poll_backoff_ms: u64,
    pub burst_rounds: u32,
    pub burst_size: u32,
    pub burst_pause_ms: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence)
        Ok(Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            upload_port: cli.upload_port.unwrap_or(toml_config.server.upload_port),
            echo_port: cli.echo_port.unwrap_or(toml_config.server.echo_port),
            download_port: cli
                .download_port
                .unwrap_or(toml_config.server.download_port),
            packet_length: cli.packet_length.unwrap_or(toml_config.packet.length),
            seed: cli.seed.unwrap_or(toml_config.packet.seed),
            poll_backoff_ms: toml_config.timing.poll_backoff_ms,
            burst_rounds: toml_config.timing.burst_rounds,
            burst_size: toml_config.timing.burst_size,
            burst_pause_ms: toml_config.timing.burst_pause_ms,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
