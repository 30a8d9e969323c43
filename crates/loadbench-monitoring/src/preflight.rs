//! Port-occupancy preflight.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Whether something already accepts TCP connections on `host:port`.
///
/// Used before spawning a server: if the port is taken, a later health
/// success would come from the wrong process.
pub async fn port_accepts_connections(host: &str, port: u16, connect_timeout: Duration) -> bool {
    match timeout(connect_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {
            debug!("Preflight: {}:{} accepts connections", host, port);
            true
        }
        Ok(Err(e)) => {
            debug!("Preflight: {}:{} is free ({})", host, port, e);
            false
        }
        Err(_) => false,
    }
}
