// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

/// 256-bit slot occupancy map. Serialized as the minimal big-endian byte
/// string of the integer it represents.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bitfield([u64; 4]);

impl Bitfield {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > 32 {
            return None;
        }
        let mut words = [0u64; 4];
        for (i, b) in bytes.iter().rev().enumerate() {
            words[i / 8] |= u64::from(*b) << ((i % 8) * 8);
        }
        Some(Self(words))
    }

    pub fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        for w in self.0.iter().rev() {
            out.extend_from_slice(&w.to_be_bytes());
        }
        let first = out.iter().position(|b| *b != 0).unwrap_or(out.len());
        out.split_off(first)
    }

    pub fn test_bit(&self, idx: u32) -> bool {
        idx < 256 && self.0[(idx / 64) as usize] & (1 << (idx % 64)) != 0
    }

    pub fn set_bit(&mut self, idx: u32) {
        if idx < 256 {
            self.0[(idx / 64) as usize] |= 1 << (idx % 64);
        }
    }

    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of set bits strictly below `idx`: the pointer index of slot `idx`.
    pub fn rank(&self, idx: u32) -> usize {
        (0..idx).filter(|i| self.test_bit(*i)).count()
    }

    /// Highest set bit, if any.
    pub fn highest(&self) -> Option<u32> {
        (0..256u32).rev().find(|i| self.test_bit(*i))
    }

    pub fn iter_set(&self) -> impl Iterator<Item = u32> + '_ {
        (0..256u32).filter(|i| self.test_bit(*i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_big_endian_bytes() {
        let mut bf = Bitfield::default();
        assert!(bf.to_bytes().is_empty());
        bf.set_bit(0);
        bf.set_bit(9);
        assert_eq!(bf.to_bytes(), vec![0x02, 0x01]);
        assert_eq!(Bitfield::from_bytes(&[0x02, 0x01]), Some(bf));
        assert_eq!(bf.rank(9), 1);
        assert_eq!(bf.highest(), Some(9));
    }

    #[test]
    fn high_slots() {
        let mut bf = Bitfield::default();
        bf.set_bit(255);
        let bytes = bf.to_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 0x80);
        assert!(Bitfield::from_bytes(&bytes).unwrap().test_bit(255));
        assert!(Bitfield::from_bytes(&[0u8; 33]).is_none());
    }
}
