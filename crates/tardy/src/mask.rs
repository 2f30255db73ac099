//! Per-step pending tracking.
//!
//! A [`PendingMask`] holds one bit per step. A set bit means the step's result
//! has not been observed yet. The collector starts with every bit set and
//! clears bits as results arrive; whatever is still set when it stops is the
//! verdict handed back to the caller.

use core::fmt;

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PendingMask {
    len: usize,
    words: Vec<u64>,
}

impl PendingMask {
    /// Returns a mask of `len` steps, all pending.
    pub fn all(len: usize) -> Self {
        let mut words = vec![u64::MAX; len.div_ceil(WORD_BITS)];
        let tail = len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1 << tail) - 1;
            }
        }
        Self { len, words }
    }

    /// Number of steps tracked, pending or not.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no step is pending.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn is_pending(&self, step: usize) -> bool {
        step < self.len && self.words[step / WORD_BITS] & (1 << (step % WORD_BITS)) != 0
    }

    /// Clears the bit for `step`. Returns `true` if it was set.
    pub fn clear(&mut self, step: usize) -> bool {
        if !self.is_pending(step) {
            return false;
        }
        self.words[step / WORD_BITS] &= !(1 << (step % WORD_BITS));
        true
    }

    /// Number of steps still pending.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of the pending steps, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|step| self.is_pending(*step))
    }
}

/// Renders the mask in binary with the highest step index first, so a
/// three-step mask with only step 0 done prints as `110`.
impl fmt::Binary for PendingMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 0 {
            return f.write_str("0");
        }
        let bits: String = (0..self.len)
            .rev()
            .map(|step| if self.is_pending(step) { '1' } else { '0' })
            .collect();
        f.pad_integral(true, "0b", &bits)
    }
}

impl fmt::Debug for PendingMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingMask({:b})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_sets_exactly_len_bits() {
        for len in [0, 1, 3, 63, 64, 65, 130] {
            let mask = PendingMask::all(len);
            assert_eq!(mask.len(), len);
            assert_eq!(mask.count(), len);
            assert_eq!(mask.is_empty(), len == 0);
            assert!(!mask.is_pending(len));
        }
    }

    #[test]
    fn clear_is_idempotent() {
        let mut mask = PendingMask::all(70);
        assert!(mask.clear(65));
        assert!(!mask.clear(65));
        assert!(!mask.is_pending(65));
        assert_eq!(mask.count(), 69);
        assert!(!mask.clear(500));
    }

    #[test]
    fn empties_once_every_step_cleared() {
        let mut mask = PendingMask::all(3);
        for step in 0..3 {
            assert!(!mask.is_empty());
            mask.clear(step);
        }
        assert!(mask.is_empty());
        assert_eq!(mask.iter().count(), 0);
    }

    #[test]
    fn iter_yields_pending_steps_in_order() {
        let mut mask = PendingMask::all(5);
        mask.clear(1);
        mask.clear(3);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 2, 4]);
    }

    #[test]
    fn binary_formats_highest_step_first() {
        let mut mask = PendingMask::all(3);
        mask.clear(0);
        assert_eq!(format!("{mask:b}"), "110");
        assert_eq!(format!("{mask:#b}"), "0b110");
        assert_eq!(format!("{:b}", PendingMask::all(0)), "0");
    }
}
