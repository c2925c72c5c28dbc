use std::hash::{DefaultHasher, Hash, Hasher};

/// Approximate membership filter over one high-cardinality text column of
/// a part (email, username, ip_address, cookie_name).
///
/// Bloom-style: k probe positions derived from two seeded 64-bit hashes by
/// double hashing. `may_contain` can return false positives but never
/// false negatives, so a `false` answer lets a query skip the whole part.
#[derive(Debug, Clone)]
pub struct MembershipFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    len: usize,
}

const BITS_PER_KEY: usize = 10;
const NUM_HASHES: u32 = 7;

impl MembershipFilter {
    pub fn with_capacity(expected_keys: usize) -> Self {
        let num_bits = (expected_keys.max(1) * BITS_PER_KEY).next_power_of_two() as u64;
        MembershipFilter {
            bits: vec![0u64; (num_bits / 64).max(1) as usize],
            num_bits,
            num_hashes: NUM_HASHES,
            len: 0,
        }
    }

    pub fn insert(&mut self, term: &str) {
        let (h1, h2) = Self::hash_pair(term);
        for i in 0..self.num_hashes {
            let bit = h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.len += 1;
    }

    pub fn may_contain(&self, term: &str) -> bool {
        let (h1, h2) = Self::hash_pair(term);
        for i in 0..self.num_hashes {
            let bit = h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits;
            if self.bits[(bit / 64) as usize] & (1 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn hash_pair(term: &str) -> (u64, u64) {
        let mut a = DefaultHasher::new();
        0x42u8.hash(&mut a);
        term.hash(&mut a);

        let mut b = DefaultHasher::new();
        0x9eu8.hash(&mut b);
        term.hash(&mut b);

        // An even second hash would cycle over half the positions.
        (a.finish(), b.finish() | 1)
    }
}
