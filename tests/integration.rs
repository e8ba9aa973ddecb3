//! Integration tests for dataconnect
//!
//! The ignored tests need a reachable database and read the same variables as the
//! binary (`DB_USER`, `DB_PASS`, `DB_NAME`, and `INSTANCE_HOST`/`DB_PORT` or
//! `INSTANCE_CONNECTION_NAME`).
//!
//! Run with: cargo test --test integration -- --ignored --nocapture

use dataconnect::connection::{dsn, ConnectionInfo};
use dataconnect::{ConnectionDetails, ConnectionProvider, PgPoolFactory, Strategy};
use std::collections::HashMap;

fn example_env() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("DB_USER", "u"),
        ("DB_PASS", "p"),
        ("DB_NAME", "d"),
        ("INSTANCE_HOST", "127.0.0.1"),
        ("DB_PORT", "5432"),
    ])
}

#[test]
fn test_direct_tcp_example_connection_string() {
    let details = ConnectionDetails::from_source(&example_env()).unwrap();
    assert_eq!(Strategy::select(&details), Strategy::DirectTcp);
    assert_eq!(
        dsn::tcp_dsn(&details),
        "host=127.0.0.1 user=u password=p port=5432 database=d"
    );

    let info = ConnectionInfo::parse(&dsn::tcp_dsn(&details)).unwrap();
    assert_eq!(info.host_or_default(), "127.0.0.1");
    assert_eq!(info.port_or_default(), 5432);
}

#[tokio::test]
async fn test_provider_opens_lazy_tcp_pool() {
    let provider = ConnectionProvider::new(example_env(), PgPoolFactory::default());
    let pool = provider.get().await.unwrap();
    assert_eq!(pool.status().size, 0);
    assert_eq!(pool.manager().pg_config().get_dbname(), Some("d"));
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn test_connect_and_ping() {
    let provider = ConnectionProvider::from_env();
    let pool = provider.get().await.expect("initialize pool");

    let client = pool.get().await.expect("checkout");
    let row = client.query_one("SELECT 1::INT4", &[]).await.expect("query");
    let one: i32 = row.get(0);
    assert_eq!(one, 1);
}
