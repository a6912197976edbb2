use nanorand::{Rng, WyRand};

/// Hands out single random bits, pulling a fresh 64-bit word from the PRNG
/// only when the current one is spent.
#[derive(Debug, Default)]
pub struct RandomBitStore {
    word: u64,
    left: u32,
}

impl RandomBitStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn next_bit(&mut self, rng: &mut WyRand) -> bool {
        if self.left == 0 {
            self.word = rng.generate::<u64>();
            self.left = 64;
        }
        let bit = self.word & 1;
        self.word >>= 1;
        self.left -= 1;
        bit == 1
    }
}
