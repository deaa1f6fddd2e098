// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! Zig-zag scan order mapping between JPEG coefficient order and natural order.

/// Maps zig-zag index (0–63) to natural row-major index (0–63).
///
/// JPEG serializes DCT coefficients in zig-zag order so that low frequencies
/// come first. `UNZIG[3]` is 16: the fourth zig-zag element lands in the
/// first column (16 % 8 == 0) of the third row (16 / 8 == 2).
pub const UNZIG: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Maps natural row-major index (0–63) to zig-zag index (0–63).
///
/// Inverse of [`UNZIG`].
pub const ZIG: [usize; 64] = {
    let mut table = [0usize; 64];
    let mut zz = 0;
    while zz < 64 {
        table[UNZIG[zz]] = zz;
        zz += 1;
    }
    table
};
