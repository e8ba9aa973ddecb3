//! Startup routine: build the pool from the environment or exit.
//!
//! Set `RUST_LOG` to control log output (default: `info`).

use dataconnect::ConnectionProvider;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let provider = ConnectionProvider::from_env();
    match provider.get().await {
        Ok(pool) => {
            let status = pool.status();
            tracing::info!(
                max_size = status.max_size,
                size = status.size,
                "database pool initialized"
            );
        }
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}
