//! Packet validation shared by all three channels.
//!
//! Validation never fails in the error sense: a malformed datagram is a
//! classification, logged and counted, and the channel loop keeps running.

use crate::packet::ReferencePacket;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Why a datagram failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// Datagram length differs from the reference packet length.
    LengthMismatch { expected: usize, observed: usize },
    /// Right length, wrong bytes.
    ContentMismatch,
}

/// Per-datagram validation result, consumed immediately by the handler.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOutcome {
    pub peer: SocketAddr,
    pub observed_len: usize,
    pub failure: Option<ValidationFailure>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }
}

/// Compares inbound datagrams against the reference packet.
///
/// Cheap to clone: handlers share the underlying packet allocation.
#[derive(Debug, Clone)]
pub struct Validator {
    reference: ReferencePacket,
}

impl Validator {
    pub fn new(reference: ReferencePacket) -> Self {
        Validator { reference }
    }

    /// The payload the download channel streams.
    pub fn reference(&self) -> &ReferencePacket {
        &self.reference
    }

    /// Classify `received` against the reference packet.
    ///
    /// Emits one log event per call: the outcome with the peer's address,
    /// and the specific reason on failure.
    pub fn validate(&self, received: &[u8], peer: SocketAddr) -> ValidationOutcome {
        let expected = self.reference.len();
        let observed = received.len();

        let failure = if observed != expected {
            warn!(
                peer = %peer,
                expected,
                observed,
                "Invalid test packet length"
            );
            Some(ValidationFailure::LengthMismatch { expected, observed })
        } else if received != self.reference.as_bytes() {
            warn!(peer = %peer, "Invalid test packet content");
            Some(ValidationFailure::ContentMismatch)
        } else {
            info!(peer = %peer, len = observed, "Valid test packet");
            None
        };

        ValidationOutcome {
            peer,
            observed_len: observed,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn validator() -> Validator {
        Validator::new(ReferencePacket::generate(64, 1234))
    }

    #[test]
    fn test_reference_packet_is_valid() {
        let v = validator();
        let data = v.reference().as_bytes().to_vec();
        let outcome = v.validate(&data, peer());
        assert!(outcome.is_valid());
        assert_eq!(outcome.observed_len, 64);
        assert_eq!(outcome.peer, peer());
    }

    #[test]
    fn test_wrong_length_is_length_mismatch() {
        let v = validator();
        let outcome = v.validate(&[0u8; 32], peer());
        assert_eq!(
            outcome.failure,
            Some(ValidationFailure::LengthMismatch {
                expected: 64,
                observed: 32,
            })
        );
    }

    #[test]
    fn test_wrong_content_is_content_mismatch() {
        let v = validator();
        let mut data = v.reference().as_bytes().to_vec();
        data[10] ^= 0xff;
        let outcome = v.validate(&data, peer());
        assert_eq!(outcome.failure, Some(ValidationFailure::ContentMismatch));
    }

    #[test]
    fn test_empty_datagram_is_length_mismatch() {
        let v = validator();
        let outcome = v.validate(&[], peer());
        assert_eq!(
            outcome.failure,
            Some(ValidationFailure::LengthMismatch {
                expected: 64,
                observed: 0,
            })
        );
    }
}
