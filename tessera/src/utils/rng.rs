use std::{num::NonZeroUsize, ops::RangeInclusive};

use awint::awi::*;
use rand_xoshiro::{
    rand_core::{RngCore, SeedableRng},
    Xoshiro128StarStar,
};

/// A deterministic psuedo-random-number-generator. Is a wrapper around
/// `Xoshiro128StarStar` that buffers rng calls down to the bit level. Used
/// for reproducible randomized operand and problem generation.
#[derive(Debug, Clone)]
pub struct StarRng {
    rng: Xoshiro128StarStar,
    buf: inlawi_ty!(64),
    // invariant: `used < buf.bw()` and indicates the number of bits used out of `buf`
    used: u8,
}

impl StarRng {
    const BW_U8: u8 = 64;

    // note: do not implement `next_usize`, if it exists then there will be
    // arch-dependent rng code in a lot of places

    pub fn new(seed: u64) -> Self {
        let mut rng = Xoshiro128StarStar::seed_from_u64(seed);
        let buf = InlAwi::from_u64(rng.next_u64());
        Self { rng, buf, used: 0 }
    }

    fn refill(&mut self) {
        self.buf = InlAwi::from_u64(self.rng.next_u64());
        self.used = 0;
    }

    pub fn next_bool(&mut self) -> bool {
        let res = self.buf.get(usize::from(self.used)).unwrap_or(false);
        self.used += 1;
        if self.used >= Self::BW_U8 {
            self.refill();
        }
        res
    }

    /// Assigns random value to `bits`
    pub fn next_bits(&mut self, bits: &mut Bits) {
        let mut processed = 0;
        loop {
            let remaining_in_buf = usize::from(Self::BW_U8.wrapping_sub(self.used));
            let remaining = bits.bw().wrapping_sub(processed);
            if remaining == 0 {
                break
            }
            let w = remaining.min(remaining_in_buf);
            // cannot fail, both ranges are in bounds by construction
            let _ = bits.field(processed, &self.buf, usize::from(self.used), w);
            processed = processed.wrapping_add(w);
            if w < remaining_in_buf {
                self.used = self.used.wrapping_add(w as u8);
            } else {
                self.refill();
            }
        }
    }

    pub fn next_u8(&mut self) -> u8 {
        let mut tmp = inlawi!(0u8);
        self.next_bits(&mut tmp);
        tmp.to_u8()
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut tmp = inlawi!(0u32);
        self.next_bits(&mut tmp);
        tmp.to_u32()
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut tmp = inlawi!(0u64);
        self.next_bits(&mut tmp);
        tmp.to_u64()
    }

    /// Returns a uniformly distributed value in `range` by rejection
    /// sampling, or the start if the range is empty
    pub fn next_in(&mut self, range: RangeInclusive<u64>) -> u64 {
        let (lo, hi) = (*range.start(), *range.end());
        if hi <= lo {
            return lo
        }
        let span = hi - lo;
        let bits = 64 - span.leading_zeros();
        loop {
            let mut r = 0u64;
            for i in 0..bits {
                if self.next_bool() {
                    r |= 1 << i;
                }
            }
            if r <= span {
                return lo + r
            }
        }
    }

    /// Takes a random index of a slice. Returns `None` if `slice.is_empty()`.
    #[must_use]
    pub fn index<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let inx = self.next_in(0..=((slice.len() - 1) as u64));
            slice.get(usize::try_from(inx).ok()?)
        }
    }

    /// Returns a `w` bit operand with uniformly random bits, callers decide
    /// whether to read it as two's complement
    pub fn next_operand(&mut self, w: NonZeroUsize) -> Awi {
        let mut res = Awi::zero(w);
        self.next_bits(&mut res);
        res
    }
}

impl RngCore for StarRng {
    fn next_u32(&mut self) -> u32 {
        StarRng::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        StarRng::next_u64(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for byte in dest {
            *byte = self.next_u8();
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_xoshiro::rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for StarRng {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }
}
