//! Download channel: downlink throughput testing.
//!
//! Any valid datagram is a trigger; the sender requests a stream simply
//! by uploading one copy of the reference packet to this port. The burst
//! loop runs inline in the handler task, so a trigger arriving mid-burst
//! stays queued in the socket's receive buffer until the current burst
//! completes. Bursts are never queued up.

use crate::channels::{recv_with_backoff, Recv, MAX_DATAGRAM};
use crate::shutdown::ShutdownFlag;
use crate::validator::Validator;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::{debug, info};

/// Shape of the burst stream sent in response to a trigger.
#[derive(Debug, Clone, Copy)]
pub struct BurstPlan {
    /// Number of paced rounds per trigger.
    pub rounds: u32,
    /// Back-to-back packets per round.
    pub packets_per_round: u32,
    /// Pause between rounds, pacing the stream for slow receivers.
    pub pause: Duration,
}

pub struct DownloadHandler {
    socket: UdpSocket,
    validator: Validator,
    shutdown: ShutdownFlag,
    backoff: Duration,
    burst: BurstPlan,
}

impl DownloadHandler {
    pub fn new(
        socket: UdpSocket,
        validator: Validator,
        shutdown: ShutdownFlag,
        backoff: Duration,
        burst: BurstPlan,
    ) -> Self {
        DownloadHandler {
            socket,
            validator,
            shutdown,
            backoff,
            burst,
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
                        self.send_burst(peer).await;
                    }
                }
            }
        }

        debug!("Download channel stopped");
    }

    /// Stream `rounds * packets_per_round` copies of the reference packet
    /// to `peer`, pausing between rounds.
    async fn send_burst(&self, peer: SocketAddr) {
        info!(
            peer = %peer,
            rounds = self.burst.rounds,
            packets_per_round = self.burst.packets_per_round,
            "Download: starting burst stream"
        );

        let payload = self.validator.reference().as_bytes();

        for _ in 0..self.burst.rounds {
            for _ in 0..self.burst.packets_per_round {
                info!(peer = %peer, "Download: sending packet");
                if let Err(e) = self.socket.send_to(payload, peer).await {
                    debug!(peer = %peer, error = %e, "Download send failed");
                }
            }

            time::sleep(self.burst.pause).await;
        }
    }
}
