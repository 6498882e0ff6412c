//! Configuration: a YAML file on disk, overridable by CLI flags.
//!
//! Mirrors the split used throughout this codebase's corpus: a plain serde-deserializable struct
//! with a `Default` impl usable by both the bootstrap binary and the test harness.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Command-line flags accepted by the `sshchat` binary.
///
/// Any flag given here overrides the corresponding value loaded from `--config`.
#[derive(clap::Parser, Debug)]
#[command(name = "sshchat", about = "A chatroom you SSH into", version)]
pub struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. "0.0.0.0:2222".
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Path to the server's private host key (generated on first run if missing).
    #[arg(long)]
    pub host_key_path: Option<PathBuf>,

    /// Path to a file of authorized-operator public keys, one per line.
    #[arg(long)]
    pub authorized_ops_path: Option<PathBuf>,

    /// Path to a message-of-the-day file written to clients after the shell is granted.
    #[arg(long)]
    pub motd: Option<PathBuf>,
}

/// The merged, fully-resolved configuration used by the rest of the crate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub host_key_path: PathBuf,
    pub authorized_ops_path: Option<PathBuf>,
    pub motd: Option<PathBuf>,
    pub max_message_bytes: usize,
    pub mailbox_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub default_silence: Duration,
    pub name_max_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:2222".to_owned(),
            host_key_path: PathBuf::from("./ssh_chat_host_key"),
            authorized_ops_path: None,
            motd: None,
            max_message_bytes: 1000,
            mailbox_capacity: 10,
            default_silence: Duration::from_secs(5 * 60),
            name_max_len: 16,
        }
    }
}

impl Config {
    /// Loads the config file at `path` if given, applying CLI overrides on top.
    ///
    /// Used by `main`; kept separate from `Default` so tests can build a `Config` without
    /// touching the filesystem.
    pub fn load(cli: &Cli) -> anyhow::Result<Config> {
        let mut config = match &cli.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&raw)?
            }
            None => Config::default(),
        };

        if let Some(addr) = &cli.listen_addr {
            config.listen_addr = addr.clone();
        }
        if let Some(path) = &cli.host_key_path {
            config.host_key_path = path.clone();
        }
        if cli.authorized_ops_path.is_some() {
            config.authorized_ops_path = cli.authorized_ops_path.clone();
        }
        if cli.motd.is_some() {
            config.motd = cli.motd.clone();
        }

        Ok(config)
    }

    /// A config suitable for tests: no filesystem access, short silence default so tests don't
    /// need to sleep a full five minutes.
    #[cfg(test)]
    pub fn sample() -> Config {
        Config {
            default_silence: Duration::from_millis(50),
            ..Config::default()
        }
    }
}
