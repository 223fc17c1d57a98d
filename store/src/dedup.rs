//! Bounded idempotency window for one contestant.
//!
//! Keys are reduced to Blake2b-256 digests so the window's memory footprint
//! does not depend on how long callers make their keys. The oldest digest is
//! evicted once the window is full, which bounds how far back a resubmission
//! can still be recognised.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::collections::{HashSet, VecDeque};

use tally_types::IdempotencyKey;

type Blake2b256 = Blake2b<U32>;

/// Default window: remember the last 65 536 keys per contestant.
pub const DEFAULT_IDEMPOTENCY_WINDOW: usize = 65_536;

pub struct IdempotencyWindow {
    capacity: usize,
    digests: HashSet<[u8; 32]>,
    order: VecDeque<[u8; 32]>,
}

impl IdempotencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            digests: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Record `key`. Returns `false` if it was already in the window.
    pub fn insert(&mut self, key: &IdempotencyKey) -> bool {
        let digest = Self::digest(key);
        if self.digests.contains(&digest) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.digests.remove(&oldest);
            }
        }
        self.digests.insert(digest);
        self.order.push_back(digest);
        true
    }

    pub fn contains(&self, key: &IdempotencyKey) -> bool {
        self.digests.contains(&Self::digest(key))
    }

    pub fn digest(key: &IdempotencyKey) -> [u8; 32] {
        let mut hasher = Blake2b256::new();
        hasher.update(key.as_str().as_bytes());
        let result = hasher.finalize();
        let mut output = [0u8; 32];
        output.copy_from_slice(&result);
        output
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl Default for IdempotencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_IDEMPOTENCY_WINDOW)
    }
}
