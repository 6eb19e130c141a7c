//! Byte-stream framing over reliable TCP connections (spec §4.2).
//!
//! One cell is delivered per accepted connection. Reads are bounded by a
//! growing buffer seeded at [`protocol::INITIAL_READ_BUFFER`] and a
//! per-read deadline; a peer closing after writing one cell is expected,
//! not an error. Writes dial with a bounded connect timeout, write the
//! fully serialized cell, and close.

use crate::cell::RelayCell;
use relaynet_common::config::protocol::{CONNECT_TIMEOUT_SECS, INITIAL_READ_BUFFER, READ_DEADLINE_SECS};
use relaynet_common::{Endpoint, RelayNetError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Bind a listening endpoint. Bind failure is relay-scoped and fatal
/// (spec §7: `BindError`).
pub async fn bind(endpoint: &Endpoint) -> Result<TcpListener, RelayNetError> {
    let addr = endpoint.to_socket_addr()?;
    TcpListener::bind(addr)
        .await
        .map_err(|e| RelayNetError::bind(e.to_string()))
}

/// Read one cell from an accepted connection, respecting the configured
/// read deadline. Returns `Ok(None)` if the peer closed without sending
/// any bytes (an empty connection, distinct from a malformed cell).
pub async fn read_cell(
    stream: &mut TcpStream,
    read_deadline: Duration,
) -> Result<Option<RelayCell>, RelayNetError> {
    let mut buf = Vec::with_capacity(INITIAL_READ_BUFFER);
    let mut chunk = vec![0u8; INITIAL_READ_BUFFER];

    loop {
        let read = timeout(read_deadline, stream.read(&mut chunk))
            .await
            .map_err(|_| RelayNetError::Timeout)?
            .map_err(RelayNetError::Io)?;

        if read == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..read]);
    }

    if buf.is_empty() {
        return Ok(None);
    }

    RelayCell::parse(&buf).map(Some)
}

/// Default read deadline for a per-connection handler.
pub fn default_read_deadline() -> Duration {
    Duration::from_secs(READ_DEADLINE_SECS)
}

/// Default connect timeout when dialing a forward target.
pub fn default_connect_timeout() -> Duration {
    Duration::from_secs(CONNECT_TIMEOUT_SECS)
}

/// Dial `target`, write the serialized cell, and close. Failure to dial
/// is a transient error reported to the caller; it never aborts the relay.
pub async fn send_cell(
    target: &Endpoint,
    cell: &RelayCell,
    connect_timeout: Duration,
) -> Result<(), RelayNetError> {
    let addr = target.to_socket_addr()?;

    let mut stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| RelayNetError::dial(format!("connect to {target} timed out")))?
        .map_err(|e| RelayNetError::dial(format!("connect to {target}: {e}")))?;

    let bytes = cell.serialize();
    stream
        .write_all(&bytes)
        .await
        .map_err(|e| RelayNetError::dial(format!("write to {target}: {e}")))?;
    stream
        .shutdown()
        .await
        .map_err(|e| RelayNetError::dial(format!("shutdown write to {target}: {e}")))?;

    Ok(())
}
