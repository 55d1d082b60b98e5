//! Echo channel: round-trip latency and loss testing.
//!
//! Valid packets are sent straight back to their sender, byte for byte.
//! Invalid packets are dropped without a reply; the sender's bounded
//! receive wait is its negative signal.

use crate::channels::{recv_with_backoff, Recv, MAX_DATAGRAM};
use crate::shutdown::ShutdownFlag;
use crate::validator::Validator;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info};

pub struct EchoHandler {
    socket: UdpSocket,
    validator: Validator,
    shutdown: ShutdownFlag,
    backoff: Duration,
}

impl EchoHandler {
    pub fn new(
        socket: UdpSocket,
        validator: Validator,
        shutdown: ShutdownFlag,
        backoff: Duration,
    ) -> Self {
        EchoHandler {
            socket,
            validator,
            shutdown,
            backoff,
        }
    }

    pub async fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        while !self.shutdown.is_shutdown() {
            match recv_with_backoff(&self.socket, &mut buf, self.backoff).await {
                Recv::Idle => continue,
                Recv::Closed => break,
                Recv::Data(len, peer) => {
                    let outcome = self.validator.validate(&buf[..len], peer);
                    if outcome.is_valid() {
                        info!(peer = %peer, "Echo: sending packet");
                        // Fire-and-forget; a failed send is not retried.
                        if let Err(e) = self.socket.send_to(&buf[..len], peer).await {
                            debug!(peer = %peer, error = %e, "Echo send failed");
                        }
                    }
                }
            }
        }

        debug!("Echo channel stopped");
    }
}
