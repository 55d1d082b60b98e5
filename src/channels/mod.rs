//! Channel handlers, one per well-known port.
//!
//! - `upload`: validates and tallies, never replies
//! - `echo`: sends valid packets back to the sender
//! - `download`: streams paced bursts of the reference packet on a valid
//!   trigger
//!
//! All three share the same loop shape: a bounded receive wait so the
//! shutdown flag is re-checked at least once per backoff interval, then a
//! channel-specific reaction to the validated datagram.

pub mod download;
pub mod echo;
pub mod upload;

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::debug;

/// Largest possible UDP payload. Receiving into a buffer this size means
/// an oversized datagram is observed at its true length and classified as
/// a length mismatch instead of being silently truncated into a match.
pub(crate) const MAX_DATAGRAM: usize = 65535;

/// Outcome of one bounded receive attempt.
pub(crate) enum Recv {
    /// A datagram arrived: payload length and sender address.
    Data(usize, SocketAddr),
    /// Nothing queued within the backoff window.
    Idle,
    /// The socket errored out; during shutdown this is the normal exit
    /// path for the loop.
    Closed,
}

/// Wait up to `backoff` for a datagram on `socket`.
pub(crate) async fn recv_with_backoff(
    socket: &UdpSocket,
    buf: &mut [u8],
    backoff: Duration,
) -> Recv {
    match time::timeout(backoff, socket.recv_from(buf)).await {
        Err(_) => Recv::Idle,
        Ok(Ok((len, peer))) => Recv::Data(len, peer),
        Ok(Err(e)) => {
            debug!(error = %e, "Receive failed, stopping channel loop");
            Recv::Closed
        }
    }
}
