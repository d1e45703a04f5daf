//! FNV-1a 64, streamed, with a base64-digest convenience wrapper.
//!
//! Offset basis and prime are the canonical FNV-1a 64 constants. The hasher
//! accepts incremental `update` calls and must produce the same digest as a
//! single-shot hash of the concatenation of all updates; this is what lets
//! the fingerprint calculator feed a JSON document through in chunks rather
//! than materializing it twice.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0100_0000_01b3;

/// Streaming FNV-1a 64 accumulator.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    pub fn new() -> Self {
        Fnv1a64 {
            state: OFFSET_BASIS,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        for &b in bytes {
            self.state ^= u64::from(b);
            self.state = self.state.wrapping_mul(PRIME);
        }
        self
    }

    /// Raw 64-bit accumulator value.
    pub fn finish_u64(&self) -> u64 {
        self.state
    }

    /// 8-byte little-endian encoding, base64 (standard alphabet, padded).
    pub fn finish_base64(&self) -> String {
        STANDARD.encode(self.state.to_le_bytes())
    }
}

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot hash of a byte slice, base64-encoded.
pub fn hash_base64(bytes: &[u8]) -> String {
    let mut h = Fnv1a64::new();
    h.update(bytes);
    h.finish_base64()
}
