// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::Error;

/// Consumes a 256-bit key digest `bit_width` bits at a time, most
/// significant bit first.
#[derive(Debug, Clone)]
pub(crate) struct HashBits {
    hash: [u8; 32],
    consumed: u32,
}

impl HashBits {
    pub fn new(hash: [u8; 32]) -> Self {
        Self { hash, consumed: 0 }
    }

    /// Index of the next `n` bits. Running out of digest is a depth error.
    pub fn next(&mut self, n: u32) -> Result<u32, Error> {
        if n == 0 || n > 8 {
            return Err(Error::InvalidHashBitLen);
        }
        if self.consumed + n > 256 {
            return Err(Error::MaxDepth);
        }
        let mut out = 0u32;
        for _ in 0..n {
            let byte = self.hash[(self.consumed / 8) as usize];
            let bit = (byte >> (7 - self.consumed % 8)) & 1;
            out = (out << 1) | u32::from(bit);
            self.consumed += 1;
        }
        Ok(out)
    }
}

/// Slot path of `hash` down to `depth` levels.
pub(crate) fn slot_path(hash: [u8; 32], bit_width: u32, depth: usize) -> Result<Vec<u32>, Error> {
    let mut bits = HashBits::new(hash);
    (0..depth).map(|_| bits.next(bit_width)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_msb_first() {
        let mut hash = [0u8; 32];
        hash[0] = 0b1011_0110;
        hash[1] = 0b1100_0000;
        let mut bits = HashBits::new(hash);
        assert_eq!(bits.next(3).unwrap(), 0b101);
        assert_eq!(bits.next(5).unwrap(), 0b10110);
        assert_eq!(bits.next(2).unwrap(), 0b11);
        assert_eq!(bits.next(8).unwrap(), 0);
    }

    #[test]
    fn exhaustion_is_max_depth() {
        let mut bits = HashBits::new([0xff; 32]);
        for _ in 0..32 {
            bits.next(8).unwrap();
        }
        assert!(matches!(bits.next(1), Err(Error::MaxDepth)));
    }

    #[test]
    fn width_is_bounded() {
        let mut bits = HashBits::new([0; 32]);
        assert!(matches!(bits.next(9), Err(Error::InvalidHashBitLen)));
    }
}
