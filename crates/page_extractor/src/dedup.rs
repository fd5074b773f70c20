//! Bounded approximate set of already-indexed image identifiers.
//!
//! A Bloom filter replaces an ever-growing list: memory is fixed at construction from
//! the expected number of images and the accepted false-positive rate. A false
//! positive makes the extractor skip an image it has never indexed; a genuinely
//! indexed image is never reported as unseen.

use std::f64::consts::LN_2;

use serde::{Deserialize, Serialize};

use crate::hash::Digest;

/// Sizing of the image dedup set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    pub expected_items: usize,
    pub false_positive_rate: f64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            expected_items: 100_000,
            false_positive_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedupSet {
    words: Vec<u64>,
    bit_count: u64,
    hashes: u32,
    recorded: usize,
}

impl DedupSet {
    pub fn new(settings: DedupSettings) -> Self {
        let items = settings.expected_items.max(1) as f64;
        let rate = settings.false_positive_rate.clamp(1e-9, 0.5);
        let bits = (-(items * rate.ln()) / (LN_2 * LN_2)).ceil().max(64.0) as u64;
        let hashes = ((bits as f64 / items) * LN_2).round().clamp(1.0, 16.0) as u32;
        let words = vec![0u64; bits.div_ceil(64) as usize];
        let bit_count = words.len() as u64 * 64;
        Self {
            words,
            bit_count,
            hashes,
            recorded: 0,
        }
    }

    pub fn contains(&self, id: &Digest) -> bool {
        self.positions(id)
            .all(|idx| self.words[(idx / 64) as usize] & (1u64 << (idx % 64)) != 0)
    }

    /// Records `id`; returns `false` when it was (probably) present already.
    pub fn insert(&mut self, id: &Digest) -> bool {
        let positions: Vec<u64> = self.positions(id).collect();
        let mut inserted = false;
        for idx in positions {
            let word = &mut self.words[(idx / 64) as usize];
            let mask = 1u64 << (idx % 64);
            if *word & mask == 0 {
                inserted = true;
                *word |= mask;
            }
        }
        if inserted {
            self.recorded += 1;
        }
        inserted
    }

    /// Number of identifiers recorded so far.
    pub fn len(&self) -> usize {
        self.recorded
    }

    pub fn is_empty(&self) -> bool {
        self.recorded == 0
    }

    /// Size of the bit array in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }

    // Double hashing: h1 + i * h2 for i in 0..hashes.
    fn positions(&self, id: &Digest) -> impl Iterator<Item = u64> + '_ {
        let bytes = id.as_bytes();
        let h1 = mix(bytes, SEEDS[0]);
        let h2 = mix(bytes, SEEDS[1]) | 1;
        (0..self.hashes as u64)
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % self.bit_count)
    }
}

const SEEDS: [u64; 2] = [0x517c_c1b7_2722_0a95, 0x9e37_79b1_85eb_ca87];

fn mix(data: &[u8], seed: u64) -> u64 {
    let mut hash = seed ^ data.len() as u64;
    for &byte in data {
        hash ^= (byte as u64).wrapping_mul(0x1000_0000_01b3);
        hash = hash.rotate_left(13).wrapping_mul(0xff51_afd7_ed55_8ccd);
    }
    hash ^ (hash >> 33)
}
