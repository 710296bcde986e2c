//! Content keys and structural hashes.
//!
//! Every stored sample carries a 16-byte digest of its canonical bytes.
//! Properties, compounds and objects carry rollups of their children's
//! digests so an unchanged subtree can be recognised, and verified, without
//! reading the samples themselves.

use murmur3::{update_canonical, Murmur3x64_128};
use std::fmt;

use crate::util::{DataType, Dimensions, PlainOldDataType};

/// 128-bit hash stored as 16 little-endian bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 16]);

impl Digest {
    pub const ZERO: Self = Self([0; 16]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    fn from_hasher(hasher: Murmur3x64_128) -> Self {
        Self(hasher.finish_bytes())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity of a sample's content: equal keys mean equal bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub digest: Digest,
    pub num_bytes: u64,
    pub pod: PlainOldDataType,
}

/// Key of a stored sample buffer.
///
/// Numeric buffers are hashed as little-endian elements of the POD width.
/// String buffers are hashed element by element, each followed by its
/// terminator, so `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn hash_of(data_type: DataType, bytes: &[u8]) -> SampleKey {
    let mut hasher = Murmur3x64_128::new();
    let pod = data_type.pod;
    if pod.is_string() {
        let unit = pod.num_bytes();
        let terminator = [0u8; 4];
        // wide strings are already encoded little-endian
        for element in super::sample::split_terminated(bytes, unit) {
            hasher.update(element);
            hasher.update(&terminator[..unit]);
        }
    } else {
        update_canonical(&mut hasher, bytes, pod.num_bytes());
    }
    SampleKey {
        digest: Digest::from_hasher(hasher),
        num_bytes: bytes.len() as u64,
        pod,
    }
}

/// Hash of the concatenation of `parts`.
pub fn hash_parts(parts: &[&[u8]]) -> Digest {
    let mut hasher = Murmur3x64_128::new();
    for part in parts {
        hasher.update(part);
    }
    Digest::from_hasher(hasher)
}

/// Hash of an array sample's stored shape.
pub fn hash_dimensions(dims: &Dimensions) -> Digest {
    let mut hasher = Murmur3x64_128::new();
    for &d in dims.sizes() {
        hasher.update_u64(d as u64);
    }
    Digest::from_hasher(hasher)
}

/// Order-sensitive fold of child digests.
#[derive(Clone, Debug, Default)]
pub struct DigestFold {
    hasher: Murmur3x64_128,
    count: usize,
}

impl DigestFold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, digest: &Digest) {
        self.hasher.update(&digest.0);
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The rollup; `Digest::ZERO` when nothing was pushed.
    pub fn finish(self) -> Digest {
        if self.count == 0 {
            Digest::ZERO
        } else {
            Digest::from_hasher(self.hasher)
        }
    }
}

/// Hash of a leaf property or compound: its serialized header entry
/// followed by the rollup of what it contains.
pub fn property_hash(header_entry: &[u8], rollup: &Digest) -> Digest {
    hash_parts(&[header_entry, &rollup.0])
}

/// Hash of a child object as folded into its parent's children hash.
pub fn object_hash(
    children_hash: &Digest,
    properties_hash: &Digest,
    meta_data: &str,
    name: &str,
) -> Digest {
    hash_parts(&[
        &children_hash.0,
        &properties_hash.0,
        meta_data.as_bytes(),
        name.as_bytes(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_follow_content() {
        let a = hash_of(DataType::FLOAT32, bytemuck::cast_slice(&[1.0f32, 2.0]));
        let b = hash_of(DataType::FLOAT32, bytemuck::cast_slice(&[1.0f32, 2.0]));
        let c = hash_of(DataType::FLOAT32, bytemuck::cast_slice(&[2.0f32, 1.0]));
        assert_eq!(a, b);
        assert_ne!(a.digest, c.digest);
        assert_eq!(a.num_bytes, 8);
        assert_eq!(a.pod, PlainOldDataType::Float32);
    }

    #[test]
    fn test_string_boundaries_matter() {
        let ab_c = hash_of(DataType::STRING, b"ab\0c\0");
        let a_bc = hash_of(DataType::STRING, b"a\0bc\0");
        assert_ne!(ab_c.digest, a_bc.digest);
        // the stored terminators are what gets hashed
        assert_eq!(ab_c.digest.0, murmur3::hash128_bytes(b"ab\0c\0", None));
    }

    #[test]
    fn test_fold_is_order_sensitive() {
        let x = hash_parts(&[b"x"]);
        let y = hash_parts(&[b"y"]);
        let mut xy = DigestFold::new();
        xy.push(&x);
        xy.push(&y);
        let mut yx = DigestFold::new();
        yx.push(&y);
        yx.push(&x);
        assert_ne!(xy.finish(), yx.finish());
        assert_eq!(DigestFold::new().finish(), Digest::ZERO);
    }

    #[test]
    fn test_parts_are_concatenated() {
        assert_eq!(hash_parts(&[b"ab", b"c"]), hash_parts(&[b"a", b"bc"]));
        assert_eq!(Digest::from_slice(&[7; 16]), Some(Digest([7; 16])));
        assert_eq!(Digest::from_slice(&[7; 15]), None);
    }
}
