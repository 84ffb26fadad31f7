//! Fixed parameters of the `XMSS-SHA2_*_256` family.

/// Hash output size in bytes (SHA-256).
pub const N: usize = 32;

/// Winternitz parameter: each chain digit takes values in `0..WOTS_W`.
pub(crate) const WOTS_W: u32 = 16;

/// Number of base-`w` message digits (two per digest byte).
pub(crate) const WOTS_LEN1: usize = 64;

/// Number of checksum digits.
pub(crate) const WOTS_LEN2: usize = 3;

/// Total number of WOTS+ chains per one-time key.
pub const WOTS_LEN: usize = WOTS_LEN1 + WOTS_LEN2;

/// Highest supported tree height; leaf indices must fit in a `u32`.
pub const MAX_HEIGHT: u32 = 31;

/// Total signature size in bytes for a tree of the given height.
pub const fn sig_len(height: u32) -> usize {
    4 + N * (1 + WOTS_LEN + height as usize)
}
