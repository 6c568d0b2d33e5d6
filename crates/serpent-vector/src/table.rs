//! LanceDB connection helpers.
use lancedb::{connect, Connection, Table};

use serpent_core::{Error, Result};

pub(crate) fn store_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Persistence(e.to_string())
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(store_err)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(store_err)?;
    Ok(names.iter().any(|n| n == name))
}

/// Open `name` if it exists.
pub async fn open_table(conn: &Connection, name: &str) -> Result<Option<Table>> {
    if !table_exists(conn, name).await? { return Ok(None); }
    conn.open_table(name).execute().await.map(Some).map_err(store_err)
}
