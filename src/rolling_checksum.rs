// FNV-64 prime: large and odd.
const DEFAULT_BASE: u64 = 0x0000_0100_0000_01B3;

/// Polynomial rolling checksum over a fixed-width byte window.
///
/// The accumulator holds `sum(b[i] * A^(W-1-i))` over the last `W` bytes,
/// modulo 2^64. Sliding the window costs one multiply, one subtract and one
/// add: the outgoing byte's contribution `A^W * out` is removed explicitly.
///
/// Not collision resistant. A matching digest is only a hint and must be
/// confirmed by comparing the bytes.
#[derive(Debug, Clone)]
pub struct RollingChecksum {
    window: usize,
    base: u64,
    /// `base^window mod 2^64`
    base_pow_window: u64,
    value: u64,
    /// Bytes added since the last reset, saturating at `window`.
    filled: usize,
}

impl RollingChecksum {
    pub fn new(window: usize) -> Self {
        Self::with_base(window, DEFAULT_BASE)
    }

    pub(crate) fn with_base(window: usize, base: u64) -> Self {
        Self {
            window,
            base,
            base_pow_window: wrapping_pow(base, window as u64),
            value: 0,
            filled: 0,
        }
    }

    /// Forget the window contents. The window length and power are kept.
    pub fn reset(&mut self) {
        self.value = 0;
        self.filled = 0;
    }

    /// Slide the window: `outgoing` leaves the trailing edge, `incoming` enters.
    ///
    /// Until the window has been filled once, `outgoing` must be 0.
    pub fn update(&mut self, outgoing: u8, incoming: u8) {
        self.value = self
            .value
            .wrapping_mul(self.base)
            .wrapping_sub(self.base_pow_window.wrapping_mul(outgoing as u64))
            .wrapping_add(incoming as u64);
        if self.filled < self.window {
            self.filled += 1;
        }
    }

    /// True once a full window has been fed since the last reset.
    pub fn is_primed(&self) -> bool {
        self.filled >= self.window
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn digest(&self) -> u64 {
        self.value
    }

    /// Digest equality between two primed checksums.
    ///
    /// Unprimed checksums never match: their value does not describe a full window.
    pub fn matches(&self, other: &RollingChecksum) -> bool {
        self.is_primed() && other.is_primed() && self.value == other.value
    }
}

/// `base^exp mod 2^64` by square-and-multiply.
fn wrapping_pow(mut base: u64, mut exp: u64) -> u64 {
    let mut result: u64 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    result
}
