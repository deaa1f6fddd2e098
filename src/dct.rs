// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-point 8×8 forward and inverse DCT kernels.
//!
//! Both transforms are separable row/column passes over a single
//! [`Block`]. The inverse follows Z. Wang, "Fast algorithms for the
//! discrete W transform and for the discrete Fourier transform", IEEE
//! Trans. ASSP-32, 1984, with 12-bit multipliers. The forward transform is
//! based on the Independent JPEG Group's jfdctint with 13-bit constants;
//! its output is scaled up by an overall factor of 8, which the
//! quantization divisor absorbs.

/// One 8×8 block of coefficients or samples, in natural (row-major) order
/// unless a call site says otherwise.
pub(crate) type Block = [i32; 64];

/// Coefficient count of a data unit.
pub(crate) const BLOCK_SIZE: usize = 64;

// 12-bit approximations of 2048*sqrt(2)*cos(k*pi/16).
const W1: i32 = 2841;
const W2: i32 = 2676;
const W3: i32 = 2408;
const W5: i32 = 1609;
const W6: i32 = 1108;
const W7: i32 = 565;

const W1PW7: i32 = W1 + W7;
const W1MW7: i32 = W1 - W7;
const W2PW6: i32 = W2 + W6;
const W2MW6: i32 = W2 - W6;
const W3PW5: i32 = W3 + W5;
const W3MW5: i32 = W3 - W5;

// 256/sqrt(2).
const R2: i32 = 181;

/// 2-D inverse DCT in place. The input coefficients must already be
/// multiplied by the quantization table.
pub(crate) fn idct(src: &mut Block) {
    // Horizontal 1-D IDCT.
    for y in 0..8 {
        let y8 = y * 8;
        // If all AC components of the row are zero, the IDCT is trivial.
        if src[y8 + 1] == 0
            && src[y8 + 2] == 0
            && src[y8 + 3] == 0
            && src[y8 + 4] == 0
            && src[y8 + 5] == 0
            && src[y8 + 6] == 0
            && src[y8 + 7] == 0
        {
            let dc = src[y8] << 3;
            for x in 0..8 {
                src[y8 + x] = dc;
            }
            continue;
        }

        // Prescale.
        let mut x0 = (src[y8] << 11) + 128;
        let mut x1 = src[y8 + 4] << 11;
        let mut x2 = src[y8 + 6];
        let mut x3 = src[y8 + 2];
        let mut x4 = src[y8 + 1];
        let mut x5 = src[y8 + 7];
        let mut x6 = src[y8 + 5];
        let mut x7 = src[y8 + 3];

        // Stage 1.
        let mut x8 = W7 * (x4 + x5);
        x4 = x8 + W1MW7 * x4;
        x5 = x8 - W1PW7 * x5;
        x8 = W3 * (x6 + x7);
        x6 = x8 - W3MW5 * x6;
        x7 = x8 - W3PW5 * x7;

        // Stage 2.
        x8 = x0 + x1;
        x0 -= x1;
        x1 = W6 * (x3 + x2);
        x2 = x1 - W2PW6 * x2;
        x3 = x1 + W2MW6 * x3;
        x1 = x4 + x6;
        x4 -= x6;
        x6 = x5 + x7;
        x5 -= x7;

        // Stage 3.
        x7 = x8 + x3;
        x8 -= x3;
        x3 = x0 + x2;
        x0 -= x2;
        x2 = (R2 * (x4 + x5) + 128) >> 8;
        x4 = (R2 * (x4 - x5) + 128) >> 8;

        // Stage 4.
        src[y8] = (x7 + x1) >> 8;
        src[y8 + 1] = (x3 + x2) >> 8;
        src[y8 + 2] = (x0 + x4) >> 8;
        src[y8 + 3] = (x8 + x6) >> 8;
        src[y8 + 4] = (x8 - x6) >> 8;
        src[y8 + 5] = (x0 - x4) >> 8;
        src[y8 + 6] = (x3 - x2) >> 8;
        src[y8 + 7] = (x7 - x1) >> 8;
    }

    // Vertical 1-D IDCT. After the horizontal pass there are typically
    // non-zero AC components, so the all-zero shortcut is not worth it.
    for x in 0..8 {
        // Prescale.
        let mut y0 = (src[x] << 8) + 8192;
        let mut y1 = src[8 * 4 + x] << 8;
        let mut y2 = src[8 * 6 + x];
        let mut y3 = src[8 * 2 + x];
        let mut y4 = src[8 + x];
        let mut y5 = src[8 * 7 + x];
        let mut y6 = src[8 * 5 + x];
        let mut y7 = src[8 * 3 + x];

        // Stage 1.
        let mut y8 = W7 * (y4 + y5) + 4;
        y4 = (y8 + W1MW7 * y4) >> 3;
        y5 = (y8 - W1PW7 * y5) >> 3;
        y8 = W3 * (y6 + y7) + 4;
        y6 = (y8 - W3MW5 * y6) >> 3;
        y7 = (y8 - W3PW5 * y7) >> 3;

        // Stage 2.
        y8 = y0 + y1;
        y0 -= y1;
        y1 = W6 * (y3 + y2) + 4;
        y2 = (y1 - W2PW6 * y2) >> 3;
        y3 = (y1 + W2MW6 * y3) >> 3;
        y1 = y4 + y6;
        y4 -= y6;
        y6 = y5 + y7;
        y5 -= y7;

        // Stage 3.
        y7 = y8 + y3;
        y8 -= y3;
        y3 = y0 + y2;
        y0 -= y2;
        y2 = (R2 * (y4 + y5) + 128) >> 8;
        y4 = (R2 * (y4 - y5) + 128) >> 8;

        // Stage 4.
        src[x] = (y7 + y1) >> 14;
        src[8 + x] = (y3 + y2) >> 14;
        src[8 * 2 + x] = (y0 + y4) >> 14;
        src[8 * 3 + x] = (y8 + y6) >> 14;
        src[8 * 4 + x] = (y8 - y6) >> 14;
        src[8 * 5 + x] = (y0 - y4) >> 14;
        src[8 * 6 + x] = (y3 - y2) >> 14;
        src[8 * 7 + x] = (y7 - y1) >> 14;
    }
}

// Trigonometric constants in 13-bit fixed point (jfdctint).
const FIX_0_298631336: i32 = 2446;
const FIX_0_390180644: i32 = 3196;
const FIX_0_541196100: i32 = 4433;
const FIX_0_765366865: i32 = 6270;
const FIX_0_899976223: i32 = 7373;
const FIX_1_175875602: i32 = 9633;
const FIX_1_501321110: i32 = 12299;
const FIX_1_847759065: i32 = 15137;
const FIX_1_961570560: i32 = 16069;
const FIX_2_053119869: i32 = 16819;
const FIX_2_562915447: i32 = 20995;
const FIX_3_072711026: i32 = 25172;

const CONST_BITS: i32 = 13;
const PASS1_BITS: i32 = 2;
const CENTER_J_SAMPLE: i32 = 128;

/// 2-D forward DCT in place, including the −128 level shift on the DC
/// term. The result is scaled up by an overall factor of 8.
pub(crate) fn fdct(b: &mut Block) {
    // Pass 1: process rows, scaling results up by PASS1_BITS.
    for y in 0..8 {
        let y8 = y * 8;
        let x0 = b[y8];
        let x1 = b[y8 + 1];
        let x2 = b[y8 + 2];
        let x3 = b[y8 + 3];
        let x4 = b[y8 + 4];
        let x5 = b[y8 + 5];
        let x6 = b[y8 + 6];
        let x7 = b[y8 + 7];

        let mut tmp0 = x0 + x7;
        let mut tmp1 = x1 + x6;
        let mut tmp2 = x2 + x5;
        let mut tmp3 = x3 + x4;

        let mut tmp10 = tmp0 + tmp3;
        let mut tmp12 = tmp0 - tmp3;
        let mut tmp11 = tmp1 + tmp2;
        let mut tmp13 = tmp1 - tmp2;

        tmp0 = x0 - x7;
        tmp1 = x1 - x6;
        tmp2 = x2 - x5;
        tmp3 = x3 - x4;

        b[y8] = (tmp10 + tmp11 - 8 * CENTER_J_SAMPLE) << PASS1_BITS;
        b[y8 + 4] = (tmp10 - tmp11) << PASS1_BITS;
        let mut z1 = (tmp12 + tmp13) * FIX_0_541196100;
        z1 += 1 << (CONST_BITS - PASS1_BITS - 1);
        b[y8 + 2] = (z1 + tmp12 * FIX_0_765366865) >> (CONST_BITS - PASS1_BITS);
        b[y8 + 6] = (z1 - tmp13 * FIX_1_847759065) >> (CONST_BITS - PASS1_BITS);

        tmp10 = tmp0 + tmp3;
        tmp11 = tmp1 + tmp2;
        tmp12 = tmp0 + tmp2;
        tmp13 = tmp1 + tmp3;
        z1 = (tmp12 + tmp13) * FIX_1_175875602;
        z1 += 1 << (CONST_BITS - PASS1_BITS - 1);
        tmp0 *= FIX_1_501321110;
        tmp1 *= FIX_3_072711026;
        tmp2 *= FIX_2_053119869;
        tmp3 *= FIX_0_298631336;
        tmp10 *= -FIX_0_899976223;
        tmp11 *= -FIX_2_562915447;
        tmp12 *= -FIX_0_390180644;
        tmp13 *= -FIX_1_961570560;

        tmp12 += z1;
        tmp13 += z1;
        b[y8 + 1] = (tmp0 + tmp10 + tmp12) >> (CONST_BITS - PASS1_BITS);
        b[y8 + 3] = (tmp1 + tmp11 + tmp13) >> (CONST_BITS - PASS1_BITS);
        b[y8 + 5] = (tmp2 + tmp11 + tmp12) >> (CONST_BITS - PASS1_BITS);
        b[y8 + 7] = (tmp3 + tmp10 + tmp13) >> (CONST_BITS - PASS1_BITS);
    }

    // Pass 2: process columns, removing the PASS1_BITS scaling but leaving
    // the overall factor of 8.
    for x in 0..8 {
        let mut tmp0 = b[x] + b[7 * 8 + x];
        let mut tmp1 = b[8 + x] + b[6 * 8 + x];
        let mut tmp2 = b[2 * 8 + x] + b[5 * 8 + x];
        let mut tmp3 = b[3 * 8 + x] + b[4 * 8 + x];

        let mut tmp10 = tmp0 + tmp3 + (1 << (PASS1_BITS - 1));
        let mut tmp12 = tmp0 - tmp3;
        let mut tmp11 = tmp1 + tmp2;
        let mut tmp13 = tmp1 - tmp2;

        tmp0 = b[x] - b[7 * 8 + x];
        tmp1 = b[8 + x] - b[6 * 8 + x];
        tmp2 = b[2 * 8 + x] - b[5 * 8 + x];
        tmp3 = b[3 * 8 + x] - b[4 * 8 + x];

        b[x] = (tmp10 + tmp11) >> PASS1_BITS;
        b[4 * 8 + x] = (tmp10 - tmp11) >> PASS1_BITS;

        let mut z1 = (tmp12 + tmp13) * FIX_0_541196100;
        z1 += 1 << (CONST_BITS + PASS1_BITS - 1);
        b[2 * 8 + x] = (z1 + tmp12 * FIX_0_765366865) >> (CONST_BITS + PASS1_BITS);
        b[6 * 8 + x] = (z1 - tmp13 * FIX_1_847759065) >> (CONST_BITS + PASS1_BITS);

        tmp10 = tmp0 + tmp3;
        tmp11 = tmp1 + tmp2;
        tmp12 = tmp0 + tmp2;
        tmp13 = tmp1 + tmp3;
        z1 = (tmp12 + tmp13) * FIX_1_175875602;
        z1 += 1 << (CONST_BITS + PASS1_BITS - 1);
        tmp0 *= FIX_1_501321110;
        tmp1 *= FIX_3_072711026;
        tmp2 *= FIX_2_053119869;
        tmp3 *= FIX_0_298631336;
        tmp10 *= -FIX_0_899976223;
        tmp11 *= -FIX_2_562915447;
        tmp12 *= -FIX_0_390180644;
        tmp13 *= -FIX_1_961570560;

        tmp12 += z1;
        tmp13 += z1;
        b[8 + x] = (tmp0 + tmp10 + tmp12) >> (CONST_BITS + PASS1_BITS);
        b[3 * 8 + x] = (tmp1 + tmp11 + tmp13) >> (CONST_BITS + PASS1_BITS);
        b[5 * 8 + x] = (tmp2 + tmp11 + tmp12) >> (CONST_BITS + PASS1_BITS);
        b[7 * 8 + x] = (tmp3 + tmp10 + tmp13) >> (CONST_BITS + PASS1_BITS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idct_dc_only_is_flat() {
        for dc in [-1024i32, -256, -8, 0, 8, 64, 1016] {
            let mut b: Block = [0; 64];
            b[0] = dc;
            idct(&mut b);
            let expected = (dc * 2048 + 8192) >> 14;
            for (i, &v) in b.iter().enumerate() {
                assert_eq!(v, expected, "dc={dc} index={i}");
            }
        }
    }

    #[test]
    fn fdct_of_flat_block() {
        let mut b: Block = [96; 64];
        fdct(&mut b);
        // Flat value p becomes a single DC term of 64*(p-128).
        assert_eq!(b[0], 64 * (96 - 128));
        for &v in &b[1..] {
            assert_eq!(v, 0);
        }
    }

    #[test]
    fn fdct_level_shift_cancels_at_midgray() {
        let mut b: Block = [128; 64];
        fdct(&mut b);
        assert_eq!(b, [0; 64]);
    }

    #[test]
    fn transform_round_trip_on_smooth_blocks() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0x4443_5431);
        for _ in 0..200 {
            let base = rng.gen_range(16..240) as i32;
            let gx = rng.gen_range(-3..=3);
            let gy = rng.gen_range(-3..=3);
            let mut src: Block = [0; 64];
            for y in 0..8 {
                for x in 0..8 {
                    src[y * 8 + x] = (base + gx * x as i32 + gy * y as i32).clamp(0, 255);
                }
            }

            let mut b = src;
            fdct(&mut b);
            // Quantize at quality 100 (all divisors 1), then dequantize.
            let mut coeffs: Block = [0; 64];
            for (i, c) in coeffs.iter_mut().enumerate() {
                let a = b[i];
                *c = if a >= 0 { (a + 4) / 8 } else { -((-a + 4) / 8) };
            }
            idct(&mut coeffs);
            for i in 0..64 {
                let out = (coeffs[i] + 128).clamp(0, 255);
                assert!(
                    (out - src[i]).abs() <= 2,
                    "pixel {i}: {} -> {out}",
                    src[i]
                );
            }
        }
    }

    #[test]
    fn transform_round_trip_on_noise() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0x4443_5432);
        for _ in 0..100 {
            let mut src: Block = [0; 64];
            for v in src.iter_mut() {
                *v = rng.gen_range(0..256);
            }
            let mut b = src;
            fdct(&mut b);
            let mut coeffs: Block = [0; 64];
            for (i, c) in coeffs.iter_mut().enumerate() {
                let a = b[i];
                *c = if a >= 0 { (a + 4) / 8 } else { -((-a + 4) / 8) };
            }
            idct(&mut coeffs);
            for i in 0..64 {
                let out = (coeffs[i] + 128).clamp(0, 255);
                assert!(
                    (out - src[i]).abs() <= 8,
                    "pixel {i}: {} -> {out}",
                    src[i]
                );
            }
        }
    }
}
