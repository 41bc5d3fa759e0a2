//! Run the dirscope API server standalone.
//!
//! The data directory (config, installed-apps cache) comes from
//! `DIRSCOPE_DATA_DIR` and defaults to the current directory.

use std::path::PathBuf;

use dirscope::Server;

const DATA_DIR_ENV: &str = "DIRSCOPE_DATA_DIR";

fn data_dir() -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let data_dir = data_dir();
    let mut server = match Server::new(data_dir.clone()).await {
        Ok(server) => server,
        Err(error) => {
            log::error!("failed to start server: {error}");
            std::process::exit(1);
        }
    };

    println!("dirscope listening on http://{}", server.addr());
    println!("data directory: {}", data_dir.display());
    println!("\nAvailable endpoints:");
    println!("  GET  /health                - Health check");
    println!("  POST /directory/list        - List a directory (cached)");
    println!("  POST /directory/invalidate  - Drop a cached listing");
    println!("  POST /directory/mutated     - Report a completed mutation");
    println!("  POST /analysis/scan         - Scan a subtree");
    println!("  POST /analysis/duplicates   - Page duplicate groups");
    println!("  POST /apps/installed        - List installed applications");
    println!("\nPress Ctrl+C to stop");

    if let Err(error) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for ctrl-c: {error}");
    }
    println!("\nShutting down...");
    if let Err(error) = server.shutdown() {
        log::warn!("{error}");
    }
}
