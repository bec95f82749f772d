//! Content hashing for conflict detection
//!
//! A cheap equality check, not a security primitive: the hash protects
//! against accidental concurrent-edit collisions, never against
//! malicious tampering.

/// 32-bit multiplier-31 rolling hash over the UTF-8 bytes of `content`.
pub fn content_hash(content: &str) -> u32 {
    let mut h: u32 = 0;
    for byte in content.as_bytes() {
        h = h.wrapping_mul(31).wrapping_add(u32::from(*byte));
    }
    h
}
