//! ZETA server binary

use clap::{Arg, Command};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use zeta_core::nonce::NonceStore;
use zeta_engine::{PgStore, Store};
use zeta_server::config::Config;
use zeta_server::{http, keys, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("zeta-server")
        .version("0.1.0")
        .about("Cryptographically self-verifying event ticket server")
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("PATH")
                .help("Directory holding the server key files")
                .default_value("./data"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_name("ADDR")
                .help("Bind address")
                .default_value("127.0.0.1:8080"),
        )
        .get_matches();

    let data_dir: PathBuf = matches
        .get_one::<String>("data-dir")
        .unwrap()
        .parse()
        .expect("Invalid data directory path");

    let bind_addr: SocketAddr = matches
        .get_one::<String>("bind")
        .unwrap()
        .parse()
        .expect("Invalid bind address");

    info!("Starting ZETA server");
    info!("Data directory: {}", data_dir.display());
    info!("Bind address: {}", bind_addr);

    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        info!("Created data directory: {}", data_dir.display());
    }

    let config = Config::from_env();

    let signer = keys::load_or_generate(&data_dir.join("priv.key"), &data_dir.join("pub.key"))?;
    info!("Server keypair loaded");

    // The nonce store must be up before the first request is accepted
    let nonces = match &config.redis_url {
        Some(url) => {
            info!("Using Redis nonce store");
            NonceStore::redis(url).await?
        }
        None => {
            info!("Using in-memory nonce store");
            NonceStore::in_memory()
        }
    };

    let store = Store::Postgres(PgStore::connect(&config.database).await?);
    info!("Database pool initialized");

    let listener = TcpListener::bind(bind_addr).await?;
    http::serve(listener, AppState::new(store, nonces, signer)).await?;

    Ok(())
}
