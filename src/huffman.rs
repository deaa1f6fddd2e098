// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! Canonical Huffman tables for JPEG entropy decoding and encoding.
//!
//! Decoding uses a two-level scheme: an 8-bit look-up table that resolves
//! the common short codes in one step, and a bit-at-a-time ladder over
//! per-length code ranges for codes longer than 8 bits. Encoding uses a
//! symbol-indexed table of precompiled codewords.

use std::io::Read;

use crate::bitio::BitReader;
use crate::error::{Error, Result};
use crate::tables::HuffmanSpec;

/// Maximum number of bits in a Huffman code.
pub(crate) const MAX_CODE_LENGTH: usize = 16;

/// Maximum number of codes in one table.
pub(crate) const MAX_N_CODES: usize = 256;

/// Log2 size of the decoder's look-up table.
const LUT_SIZE: u32 = 8;

/// A canonical Huffman decoder table (ITU-T T.81 section C).
pub(crate) struct Huffman {
    /// Number of codes in the table.
    n_codes: i32,
    /// Look-up table keyed by the next 8 bits of the stream. The high 8
    /// bits of an entry are the decoded value; the low 8 bits are 1 plus
    /// the code length, or 0 when the code is longer than 8 bits.
    lut: [u16; 1 << LUT_SIZE],
    /// Decoded values, sorted by their encoding.
    vals: [u8; MAX_N_CODES],
    /// `min_codes[i]` is the smallest code of length i+1, or -1 if none.
    min_codes: [i32; MAX_CODE_LENGTH],
    /// `max_codes[i]` is the largest code of length i+1, or -1 if none.
    max_codes: [i32; MAX_CODE_LENGTH],
    /// `vals_indices[i]` is the index into `vals` of `min_codes[i]`.
    vals_indices: [i32; MAX_CODE_LENGTH],
}

impl Huffman {
    /// Build a decoder table from a DHT entry: `counts[i]` codes of length
    /// i+1 and the value list in order of increasing code length. The
    /// caller has already validated that `vals.len()` equals the sum of
    /// `counts` and lies in 1..=256.
    pub(crate) fn build(counts: &[u8; 16], vals: &[u8]) -> Huffman {
        let mut h = Huffman {
            n_codes: vals.len() as i32,
            lut: [0; 1 << LUT_SIZE],
            vals: [0; MAX_N_CODES],
            min_codes: [-1; MAX_CODE_LENGTH],
            max_codes: [-1; MAX_CODE_LENGTH],
            vals_indices: [-1; MAX_CODE_LENGTH],
        };
        h.vals[..vals.len()].copy_from_slice(vals);

        // Derive the look-up table. A code of length 1+i, left-aligned to
        // 8 bits, covers 2^(7-i) consecutive entries.
        let mut code: u32 = 0;
        let mut x: usize = 0;
        for i in 0..LUT_SIZE {
            code <<= 1;
            for _ in 0..counts[i as usize] {
                let base = (code << (7 - i)) as u8 as usize;
                let lut_value = u16::from(h.vals[x]) << 8 | (2 + i) as u16;
                for k in 0..1usize << (7 - i) {
                    h.lut[base | k] = lut_value;
                }
                code += 1;
                x += 1;
            }
        }

        // Derive the ladder: per-length code ranges for the slow path.
        let mut c: i32 = 0;
        let mut index: i32 = 0;
        for i in 0..MAX_CODE_LENGTH {
            let n = i32::from(counts[i]);
            if n != 0 {
                h.min_codes[i] = c;
                h.max_codes[i] = c + n - 1;
                h.vals_indices[i] = index;
                c += n;
                index += n;
            }
            c <<= 1;
        }
        h
    }

    /// Decode the next Huffman-coded value from the bit stream.
    pub(crate) fn decode<R: Read>(&self, r: &mut BitReader<R>) -> Result<u8> {
        if self.n_codes == 0 {
            return Err(Error::Format("uninitialized Huffman table"));
        }

        if r.bits.n < 8 {
            match r.ensure_n_bits(8) {
                Ok(()) => {}
                Err(Error::MissingFF00) | Err(Error::ShortHuffmanData) => {
                    // This segment has run out of data, but the symbol in
                    // flight may still be decodable from the bits already
                    // buffered. Drop the overshoot and take the ladder.
                    r.unread_byte_stuffed_byte();
                    return self.decode_slow(r);
                }
                Err(e) => return Err(e),
            }
        }
        let v = self.lut[(r.bits.a >> (r.bits.n - LUT_SIZE as i32) as u32) as usize & 0xff];
        if v != 0 {
            let n = (v & 0xff) - 1;
            r.bits.n -= i32::from(n);
            r.bits.m >>= n;
            return Ok((v >> 8) as u8);
        }
        self.decode_slow(r)
    }

    /// Bit-at-a-time decoding for codes the look-up table cannot resolve.
    fn decode_slow<R: Read>(&self, r: &mut BitReader<R>) -> Result<u8> {
        let mut code: i32 = 0;
        for i in 0..MAX_CODE_LENGTH {
            if r.bits.n == 0 {
                r.ensure_n_bits(1)?;
            }
            if r.bits.a & r.bits.m != 0 {
                code |= 1;
            }
            r.bits.n -= 1;
            r.bits.m >>= 1;
            if code <= self.max_codes[i] {
                return Ok(self.vals[(self.vals_indices[i] + code - self.min_codes[i]) as usize]);
            }
            code <<= 1;
        }
        Err(Error::Format("bad Huffman code"))
    }
}

/// Precompiled encoder table: indexed by symbol, each entry packs the
/// codeword size in the high 8 bits and the codeword in the low 24.
pub(crate) struct HuffmanLut(Vec<u32>);

impl HuffmanLut {
    pub(crate) fn new(s: &HuffmanSpec) -> Self {
        let max_value = s.values.iter().copied().max().unwrap_or(0) as usize;
        let mut lut = vec![0u32; max_value + 1];
        let mut code: u32 = 0;
        let mut k = 0usize;
        for i in 0..MAX_CODE_LENGTH {
            let n_bits = ((i + 1) as u32) << 24;
            for _ in 0..s.counts[i] {
                lut[s.values[k] as usize] = n_bits | code;
                code += 1;
                k += 1;
            }
            code <<= 1;
        }
        HuffmanLut(lut)
    }

    #[inline]
    pub(crate) fn get(&self, value: usize) -> u32 {
        self.0[value]
    }
}
