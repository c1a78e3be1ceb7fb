//! Database schema installer

use clap::{Arg, ArgAction, Command};
use zeta_engine::PgStore;
use zeta_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("zeta-setup")
        .version("0.1.0")
        .about("Install the ZETA database schema")
        .arg(
            Arg::new("drop")
                .long("drop")
                .action(ArgAction::SetTrue)
                .help("Drop existing tables before creating the schema"),
        )
        .get_matches();

    let config = Config::from_env();
    let store = PgStore::connect(&config.database).await?;
    store.install_schema(matches.get_flag("drop")).await?;

    println!("database schema installed");
    Ok(())
}
