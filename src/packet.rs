//! Reference packet generation.
//!
//! Both ends of a data-path test must produce the same packet without
//! exchanging it on the wire, so the payload comes from a seeded
//! pseudo-random stream rather than a hardcoded blob. The device under
//! test runs the same generator with the same seed; only length and seed
//! are part of the out-of-band configuration contract.

use bytes::{BufMut, Bytes, BytesMut};

/// LCG multiplier. Must match the generator on the device side.
const MULTIPLIER: u32 = 1103515245;
/// LCG increment. Must match the generator on the device side.
const INCREMENT: u32 = 12345;
/// State is kept to 31 bits.
const STATE_MASK: u32 = 0x7fff_ffff;

/// Minimal linear-congruential generator producing one byte per step.
///
/// `state = (1103515245 * state + 12345) mod 2^31`, output is the low
/// byte of each successive state. Wrapping u32 arithmetic followed by the
/// 31-bit mask is exact here because 2^31 divides 2^32.
struct Prng {
    state: u32,
}

impl Prng {
    fn new(seed: u32) -> Self {
        Prng {
            state: seed & STATE_MASK,
        }
    }

    fn next_byte(&mut self) -> u8 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT)
            & STATE_MASK;
        (self.state & 0xff) as u8
    }
}

/// The fixed payload all three channels validate against and the download
/// channel streams. Generated once at startup, immutable afterwards.
///
/// Internally a frozen [`Bytes`], so handler clones share one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePacket {
    data: Bytes,
}

impl ReferencePacket {
    /// Generate the reference payload. Pure function of `(length, seed)`:
    /// the same inputs always yield the same bytes.
    pub fn generate(length: usize, seed: u32) -> Self {
        let mut prng = Prng::new(seed);
        let mut data = BytesMut::with_capacity(length);
        for _ in 0..length {
            data.put_u8(prng.next_byte());
        }
        ReferencePacket {
            data: data.freeze(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let a = ReferencePacket::generate(1024, 1234);
        let b = ReferencePacket::generate(1024, 1234);
        assert_eq!(a, b);
        assert_eq!(a.len(), 1024);
    }

    #[test]
    fn test_seed_changes_output() {
        let a = ReferencePacket::generate(256, 1234);
        let b = ReferencePacket::generate(256, 1235);
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_first_byte_for_reference_seed() {
        // (1103515245 * 1234 + 12345) mod 2^31 = 233191843, low byte 0xa3
        let packet = ReferencePacket::generate(4, 1234);
        assert_eq!(packet.as_bytes()[0], 0xa3);
    }

    #[test]
    fn test_prefix_is_stable_across_lengths() {
        let short = ReferencePacket::generate(16, 42);
        let long = ReferencePacket::generate(64, 42);
        assert_eq!(short.as_bytes(), &long.as_bytes()[..16]);
    }

    #[test]
    fn test_zero_length_packet() {
        let packet = ReferencePacket::generate(0, 1234);
        assert_eq!(packet.len(), 0);
    }
}
