//! Upload channel: uplink delivery testing.
//!
//! Receives datagrams and tallies validation outcomes without ever
//! replying, so no response traffic skews the sender's measurements.

use crate::channels::{recv_with_backoff, Recv, MAX_DATAGRAM};
use crate::shutdown::ShutdownFlag;
use crate::validator::Validator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// Running tallies for the upload channel.
///
/// Written only by the upload handler; the shared handle exists so the
/// controlling code (and tests) can observe counts while the loop runs.
#[derive(Debug, Default)]
pub struct UploadCounters {
    valid: AtomicU64,
    invalid: AtomicU64,
}

impl UploadCounters {
    pub fn valid(&self) -> u64 {
        self.valid.load(Ordering::Relaxed)
    }

    pub fn invalid(&self) -> u64 {
        self.invalid.load(Ordering::Relaxed)
    }
}

pub struct UploadHandler {
    socket: UdpSocket,
    validator: Validator,
    shutdown: ShutdownFlag,
    backoff: Duration,
    counters: Arc<UploadCounters>,
}

impl UploadHandler {
    pub fn new(
        socket: UdpSocket,
        validator: Validator,
        shutdown: ShutdownFlag,
        backoff: Duration,
    ) -> Self {
        UploadHandler {
            socket,
            validator,
            shutdown,
            backoff,
            counters: Arc::new(UploadCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<UploadCounters> {
        Arc::clone(&self.counters)
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
                        self.counters.valid.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.counters.invalid.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        debug!(
            valid = self.counters.valid(),
            invalid = self.counters.invalid(),
            "Upload channel stopped"
        );
    }
}
