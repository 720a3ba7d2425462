//! Size-class binning: maps a quantized payload size to one of 15
//! segregated free-list indices.
//!
//! Kept as a static table of `(upper_m, bin)` pairs rather than a cascade of
//! `if`/`else` comparisons; a data-driven table reads better and is
//! trivially checked against the bin boundaries below.

/// Number of free-list bins.
pub const BIN_COUNT: usize = 15;

/// `(upper_m, bin)`: a payload size with `m = (size - 8) / 16` falls in
/// `bin` if `m <= upper_m` and `m` exceeded every earlier row's `upper_m`.
/// The last row's `upper_m` is unused (bin 14 catches everything else).
const TABLE: [(usize, usize); 11] = [
  (6, 4),
  (8, 5),
  (16, 6),
  (32, 7),
  (64, 8),
  (128, 9),
  (256, 10),
  (512, 11),
  (1024, 12),
  (2048, 13),
  (usize::MAX, 14),
];

/// Returns the bin index for a block of the given payload size.
///
/// `size` must be a valid quantized payload size (24 + 16k for k >= 0);
/// behavior for other sizes is unspecified. Callers must normalize first.
#[inline]
pub fn index(size: usize) -> usize {
  let m = (size - 8) / 16;
  if m <= 4 {
    return m - 1;
  }
  for &(upper_m, bin) in &TABLE {
    if m <= upper_m {
      return bin;
    }
  }
  BIN_COUNT - 1
}

#[cfg(test)]
mod tests {
  use super::*;

  fn payload_for_m(m: usize) -> usize {
    m * 16 + 8
  }

  #[test]
  fn matches_the_bin_table_exactly() {
    let cases: &[(usize, usize)] = &[
      (1, 0),
      (2, 1),
      (3, 2),
      (4, 3),
      (5, 4),
      (6, 4),
      (7, 5),
      (8, 5),
      (9, 6),
      (16, 6),
      (17, 7),
      (32, 7),
      (33, 8),
      (64, 8),
      (65, 9),
      (128, 9),
      (129, 10),
      (256, 10),
      (257, 11),
      (512, 11),
      (513, 12),
      (1024, 12),
      (1025, 13),
      (2048, 13),
      (2049, 14),
      (100_000, 14),
    ];
    for &(m, expected_bin) in cases {
      let size = payload_for_m(m);
      assert_eq!(index(size), expected_bin, "m={m} size={size}");
    }
  }

  #[test]
  fn only_bin_14_holds_very_large_blocks() {
    let huge = payload_for_m(2049);
    assert_eq!(index(huge), BIN_COUNT - 1);
  }
}
