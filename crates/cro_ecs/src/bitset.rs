//! Bitset implementation.
//!
//! Bitsets are powered by the [`bitset_core`] crate.
//!
//! A bitset is a vector of 32-byte sectors. Its size is controlled by the mutually exclusive
//! `keysize*` features: a keysize of `K` tracks `2^K` entities.
//!
//! | Keysize | Bit Count  | Sectors    | Memory |
//! | ------- | ---------- | ---------- | ------ |
//! |      32 |  4 billion | 16 million | 512 MB |
//! |      24 | 16 million |      65536 |   2 MB |
//! |      20 |  1 million |       4096 | 128 KB |
//! |      16 |      65536 |        256 |   8 KB |
//! |      12 |       4096 |         16 | 512  B |
//! |      10 |       1024 |          4 | 128  B |
//!
//! [`bitset_core`]: https://docs.rs/bitset_core

use cro_macros::{Deref, DerefMut};

use crate::prelude::*;

#[cfg(all(
    feature = "keysize10",
    not(feature = "keysize12"),
    not(feature = "keysize16"),
    not(feature = "keysize20"),
    not(feature = "keysize24"),
    not(feature = "keysize32")
))]
#[allow(missing_docs)]
pub const BITSET_EXP: u32 = 10;

#[cfg(all(
    feature = "keysize12",
    not(feature = "keysize10"),
    not(feature = "keysize16"),
    not(feature = "keysize20"),
    not(feature = "keysize24"),
    not(feature = "keysize32")
))]
#[allow(missing_docs)]
pub const BITSET_EXP: u32 = 12;

// 16 is the default, if no `keysize*` features are enabled then use this one.
#[cfg(any(
    feature = "keysize16",
    all(
        not(feature = "keysize10"),
        not(feature = "keysize12"),
        not(feature = "keysize20"),
        not(feature = "keysize24"),
        not(feature = "keysize32")
    )
))]
#[allow(missing_docs)]
pub const BITSET_EXP: u32 = 16;

#[cfg(all(
    feature = "keysize20",
    not(feature = "keysize10"),
    not(feature = "keysize12"),
    not(feature = "keysize16"),
    not(feature = "keysize24"),
    not(feature = "keysize32")
))]
#[allow(missing_docs)]
pub const BITSET_EXP: u32 = 20;

#[cfg(all(
    feature = "keysize24",
    not(feature = "keysize10"),
    not(feature = "keysize12"),
    not(feature = "keysize16"),
    not(feature = "keysize20"),
    not(feature = "keysize32")
))]
#[allow(missing_docs)]
pub const BITSET_EXP: u32 = 24;

#[cfg(all(
    feature = "keysize32",
    not(feature = "keysize10"),
    not(feature = "keysize12"),
    not(feature = "keysize16"),
    not(feature = "keysize20"),
    not(feature = "keysize24")
))]
#[allow(missing_docs)]
pub const BITSET_EXP: u32 = 32;

pub use bitset_core::*;

/// The number of bits in a bitset, which is also the maximum number of live entities.
pub const BITSET_SIZE: usize = 2usize.saturating_pow(BITSET_EXP);

/// A sector is 8 `u32`s.
const BITSET_SECTOR_SIZE: usize = 32 * 8;

const BITSET_SECTOR_COUNT: usize = BITSET_SIZE / BITSET_SECTOR_SIZE;

/// The type of bitsets used to track entities in component storages and system filters.
#[derive(Deref, DerefMut, Clone, Debug, PartialEq, Eq)]
pub struct BitSetVec(pub Vec<[u32; 8]>);

impl Default for BitSetVec {
    fn default() -> Self {
        create_bitset()
    }
}

impl BitSetVec {
    /// Check whether or not the bitset contains the given entity.
    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.bit_test(entity.index() as usize)
    }

    /// Set an entity on the the bitset.
    #[inline]
    pub fn set(&mut self, entity: Entity) {
        self.bit_set(entity.index() as usize);
    }

    /// Clear an entity from the bitset.
    #[inline]
    pub fn unset(&mut self, entity: Entity) {
        self.bit_reset(entity.index() as usize);
    }
}

/// Creates a bitset big enough to contain the index of each entity.
pub fn create_bitset() -> BitSetVec {
    BitSetVec(vec![[0u32; 8]; BITSET_SECTOR_COUNT])
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn set_and_unset() {
        let mut bits = create_bitset();
        let e = Entity::new(300, 0);
        assert!(!bits.contains(e));
        bits.set(e);
        assert!(bits.contains(e));
        assert!(bits.contains(Entity::new(300, 7)));
        bits.unset(e);
        assert!(!bits.contains(e));
    }

    #[test]
    fn sectors_are_shared_with_bit_ops() {
        let mut bits = create_bitset();
        assert_eq!(bits.len(), BITSET_SIZE / 256);
        bits[1][0] = 1;
        assert!(bits.bit_test(256));
        assert!(bits.contains(Entity::new(256, 0)));
    }

    #[test]
    fn joins_with_bit_and() {
        let mut a = create_bitset();
        let mut b = create_bitset();
        a.bit_set(1);
        a.bit_set(2);
        b.bit_set(2);
        b.bit_set(3);
        a.bit_and(&b);
        assert!(!a.bit_test(1));
        assert!(a.bit_test(2));
        assert!(!a.bit_test(3));
    }
}
