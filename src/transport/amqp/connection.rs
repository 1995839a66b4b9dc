use lapin::{Connection, ConnectionProperties};
use log::info;

/// Opens a connection to the broker at the given URL
///
/// Connection failure is fatal from the caller's perspective: the error is
/// propagated unchanged and no retry or backoff is attempted.
pub async fn connect(url: &str) -> Result<Connection, lapin::Error> {
    let connection = Connection::connect(url, ConnectionProperties::default()).await?;

    info!("Connected to the message broker");

    Ok(connection)
}
