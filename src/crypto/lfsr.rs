//! 16-bit Fibonacci LFSR used as the container's keystream source.
//!
//! Taps sit at bits 0, 6, 9 and 13.  The feedback bit is shifted in at the
//! top while the register shifts right, giving a maximal-length sequence of
//! period 2^16 - 1 over the nonzero states.  Zero is a fixed point and is
//! never reached from a nonzero state.

/// Seed used by the reference producer when no key is supplied.
pub const DEFAULT_SEED: u16 = 0x1337;

const TAP_MASK: u16 = (1 << 0) | (1 << 6) | (1 << 9) | (1 << 13);

/// Advance the register by one step.
#[inline]
pub fn lfsr_step(state: u16) -> u16 {
    let feedback = ((state & TAP_MASK).count_ones() & 1) as u16;
    (state >> 1) | (feedback << 15)
}

/// Iterator over successive LFSR states, excluding the seed itself.
///
/// The state lives in the iterator value; restarting from any seed is just
/// constructing a new one.
#[derive(Debug, Clone)]
pub struct Keystream {
    state: u16,
}

impl Keystream {
    pub fn new(seed: u16) -> Self {
        Self { state: seed }
    }

    /// The most recently produced word (the seed before the first `next`).
    pub fn current(&self) -> u16 {
        self.state
    }
}

impl Iterator for Keystream {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        self.state = lfsr_step(self.state);
        Some(self.state)
    }
}
