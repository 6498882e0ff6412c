//! Process bootstrap: parse flags, load configuration, load or generate the host key, seed
//! operators, and hand off to the SSH listener loop.

use std::sync::Arc;

use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use russh::keys::{HashAlg, PublicKey};

use sshchat::config::{Cli, Config};
use sshchat::hub::Hub;
use sshchat::ssh::{load_or_generate_host_key, SshServer};

fn seed_operators(hub: &Hub, path: &std::path::Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match PublicKey::from_openssh(line) {
            Ok(key) => {
                let fingerprint = key.fingerprint(HashAlg::Sha256).to_string();
                hub.seed_operator(fingerprint);
            }
            Err(err) => warn!("{}:{}: skipping unparseable operator key: {}", path.display(), lineno + 1, err),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn,sshchat=info")).init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load(&cli)?);

    let hub = Hub::new(config.name_max_len);
    if let Some(path) = &config.authorized_ops_path {
        seed_operators(&hub, path)?;
        info!("seeded operators from {}", path.display());
    }

    let host_key = load_or_generate_host_key(&config.host_key_path)?;
    let server = SshServer::new(config, hub, host_key);
    server.run().await
}
