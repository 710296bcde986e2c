//! MurmurHash3 x64_128.
//!
//! Algorithm by Austin Appleby. The hasher here is incremental: bytes may be
//! fed in any chunking and the digest is identical to hashing the
//! concatenation in one call.

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// Incremental MurmurHash3 x64_128 state.
#[derive(Clone, Debug)]
pub struct Murmur3x64_128 {
    h1: u64,
    h2: u64,
    buf: [u8; 16],
    buf_len: usize,
    total: u64,
}

impl Default for Murmur3x64_128 {
    fn default() -> Self {
        Self::new()
    }
}

impl Murmur3x64_128 {
    /// Hasher with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Hasher with both lanes initialised to `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            h1: seed,
            h2: seed,
            buf: [0; 16],
            buf_len: 0,
            total: 0,
        }
    }

    /// Total number of bytes fed so far.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Feed more bytes.
    pub fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;

        if self.buf_len > 0 {
            let take = (16 - self.buf_len).min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];
            if self.buf_len < 16 {
                return;
            }
            let block = self.buf;
            self.block(&block);
            self.buf_len = 0;
        }

        let mut chunks = data.chunks_exact(16);
        for chunk in &mut chunks {
            let mut block = [0u8; 16];
            block.copy_from_slice(chunk);
            self.block(&block);
        }
        let rest = chunks.remainder();
        self.buf[..rest.len()].copy_from_slice(rest);
        self.buf_len = rest.len();
    }

    /// Feed a u64 in little-endian order.
    pub fn update_u64(&mut self, value: u64) {
        self.update(&value.to_le_bytes());
    }

    fn block(&mut self, block: &[u8; 16]) {
        let (lo, hi) = block.split_at(8);
        let k1 = u64::from_le_bytes(lo.try_into().unwrap_or_default());
        let k2 = u64::from_le_bytes(hi.try_into().unwrap_or_default());

        self.h1 ^= mix_k1(k1);
        self.h1 = self.h1.rotate_left(27).wrapping_add(self.h2);
        self.h1 = self.h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        self.h2 ^= mix_k2(k2);
        self.h2 = self.h2.rotate_left(31).wrapping_add(self.h1);
        self.h2 = self.h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }

    /// Consume the hasher and produce `(h1, h2)`.
    pub fn finish(mut self) -> (u64, u64) {
        let tail = &self.buf[..self.buf_len];
        if tail.len() > 8 {
            self.h2 ^= mix_k2(le_partial(&tail[8..]));
        }
        if !tail.is_empty() {
            self.h1 ^= mix_k1(le_partial(&tail[..tail.len().min(8)]));
        }

        let mut h1 = self.h1 ^ self.total;
        let mut h2 = self.h2 ^ self.total;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix64(h1);
        h2 = fmix64(h2);
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        (h1, h2)
    }

    /// Consume the hasher and produce the digest as 16 little-endian bytes.
    pub fn finish_bytes(self) -> [u8; 16] {
        to_bytes(self.finish())
    }
}

#[inline]
fn mix_k1(k: u64) -> u64 {
    k.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2)
}

#[inline]
fn mix_k2(k: u64) -> u64 {
    k.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1)
}

/// Assemble up to 8 trailing bytes as a little-endian word.
#[inline]
fn le_partial(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (b as u64) << (8 * i))
}

#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[inline]
fn to_bytes((h1, h2): (u64, u64)) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&h1.to_le_bytes());
    out[8..].copy_from_slice(&h2.to_le_bytes());
    out
}

/// Feed `data` to `hasher` canonicalized to little-endian elements of
/// `pod_size` bytes. On little-endian targets this is a plain `update`.
pub fn update_canonical(hasher: &mut Murmur3x64_128, data: &[u8], pod_size: usize) {
    if cfg!(target_endian = "big") && pod_size > 1 {
        let mut swapped = Vec::with_capacity(data.len());
        for chunk in data.chunks(pod_size) {
            swapped.extend(chunk.iter().rev());
        }
        hasher.update(&swapped);
    } else {
        hasher.update(data);
    }
}

/// One-shot hash of `data`, canonicalized by `pod_size` (None = bytes).
#[inline]
pub fn hash128(data: &[u8], pod_size: Option<usize>) -> (u64, u64) {
    let mut hasher = Murmur3x64_128::new();
    update_canonical(&mut hasher, data, pod_size.unwrap_or(1));
    hasher.finish()
}

/// One-shot hash returned as 16 little-endian bytes.
#[inline]
pub fn hash128_bytes(data: &[u8], pod_size: Option<usize>) -> [u8; 16] {
    to_bytes(hash128(data, pod_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        // seed 0, no input: every mixing step keeps zero
        assert_eq!(hash128(&[], None), (0, 0));
    }

    #[test]
    fn test_chunking_does_not_matter() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let whole = hash128(&data, None);

        for split in [1usize, 3, 7, 15, 16, 17, 33] {
            let mut h = Murmur3x64_128::new();
            for chunk in data.chunks(split) {
                h.update(chunk);
            }
            assert_eq!(h.len(), 1000);
            assert_eq!(h.finish(), whole, "chunk size {split}");
        }
    }

    #[test]
    fn test_every_tail_length_differs() {
        let data: Vec<u8> = (1..=32).collect();
        let mut seen = std::collections::HashSet::new();
        for len in 0..=32 {
            assert!(seen.insert(hash128(&data[..len], None)), "len {len}");
        }
    }

    #[test]
    fn test_seed_changes_digest() {
        let mut a = Murmur3x64_128::new();
        let mut b = Murmur3x64_128::with_seed(1);
        a.update(b"hello");
        b.update(b"hello");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_bytes_layout() {
        let (h1, h2) = hash128(b"test", None);
        let bytes = hash128_bytes(b"test", None);
        assert_eq!(&bytes[..8], &h1.to_le_bytes());
        assert_eq!(&bytes[8..], &h2.to_le_bytes());
    }
}
