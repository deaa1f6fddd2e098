// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! Entropy-coded scan decoding: the MCU traversal.
//!
//! One pass over the scan decodes, for every MCU and every data unit, the
//! DC and AC coefficients, honouring restart intervals and the progressive
//! refinements. Baseline blocks are dequantized and inverse-transformed on
//! the spot; progressive blocks accumulate in per-component coefficient
//! planes until the scan that completes their band arrives.

use std::io::Read;

use crate::bitio::BitReader;
use crate::dct::{idct, Block, BLOCK_SIZE};
use crate::decode::{Decoder, MAX_COMPONENTS};
use crate::error::{Error, Result};
use crate::huffman::Huffman;
use crate::marker;
use crate::pixels::store_block;
use crate::tables::MAX_TH;
use crate::zigzag::UNZIG;

const DC_TABLE: usize = 0;
const AC_TABLE: usize = 1;

#[derive(Clone, Copy, Default)]
struct ScanComponent {
    comp_index: usize,
    /// DC table selector.
    td: u8,
    /// AC table selector.
    ta: u8,
}

impl<R: Read> Decoder<R> {
    /// Section B.2.3.
    pub(crate) fn process_sos(&mut self, n: usize) -> Result<()> {
        if self.n_comp == 0 {
            return Err(Error::Format("missing SOF marker"));
        }
        if n < 6 || 4 + 2 * self.n_comp < n || n % 2 != 0 {
            return Err(Error::Format("SOS has wrong length"));
        }
        self.r.read_full(&mut self.tmp[..n])?;
        let n_comp = usize::from(self.tmp[0]);
        if n != 4 + 2 * n_comp {
            return Err(Error::Format("SOS length inconsistent with number of components"));
        }

        let mut scan = [ScanComponent::default(); MAX_COMPONENTS];
        let mut total_hv = 0;
        for i in 0..n_comp {
            let cs = self.tmp[1 + 2 * i];
            let comp_index = (0..self.n_comp)
                .find(|&j| cs == self.comp[j].c)
                .ok_or(Error::Format("unknown component selector"))?;
            scan[i].comp_index = comp_index;
            // Scan component selectors must be distinct; frame identifiers
            // already are, so distinct indexes suffice.
            for j in 0..i {
                if scan[i].comp_index == scan[j].comp_index {
                    return Err(Error::Format("repeated component selector"));
                }
            }
            total_hv += self.comp[comp_index].h * self.comp[comp_index].v;

            scan[i].td = self.tmp[2 + 2 * i] >> 4;
            if scan[i].td > MAX_TH {
                return Err(Error::Format("bad Td value"));
            }
            scan[i].ta = self.tmp[2 + 2 * i] & 0x0f;
            if scan[i].ta > MAX_TH {
                return Err(Error::Format("bad Ta value"));
            }
        }
        // Section B.2.3: an interleaved scan's total H*V must not exceed 10.
        if self.n_comp > 1 && total_hv > 10 {
            return Err(Error::Format("total sampling factors too large"));
        }

        // Spectral selection bounds (Ss, Se) and successive approximation
        // bit positions (Ah, Al). Baseline scans are hard-coded to cover
        // the whole block at full precision.
        let mut zig_start: i32 = 0;
        let mut zig_end: i32 = BLOCK_SIZE as i32 - 1;
        let mut ah: u32 = 0;
        let mut al: u32 = 0;
        if self.progressive {
            zig_start = i32::from(self.tmp[1 + 2 * n_comp]);
            zig_end = i32::from(self.tmp[2 + 2 * n_comp]);
            ah = u32::from(self.tmp[3 + 2 * n_comp] >> 4);
            al = u32::from(self.tmp[3 + 2 * n_comp] & 0x0f);
            if (zig_start == 0 && zig_end != 0)
                || zig_start > zig_end
                || BLOCK_SIZE as i32 <= zig_end
            {
                return Err(Error::Format("bad spectral selection bounds"));
            }
            if zig_start != 0 && n_comp != 1 {
                return Err(Error::Format(
                    "progressive AC coefficients for more than one component",
                ));
            }
            if ah != 0 && ah != al + 1 {
                return Err(Error::Format("bad successive approximation values"));
            }
        }

        // MCU counts come from the Y component's sampling factors.
        let h0 = self.comp[0].h;
        let v0 = self.comp[0].v;
        let mxx = (self.width + 8 * h0 - 1) / (8 * h0);
        let myy = (self.height + 8 * v0 - 1) / (8 * v0);
        if self.img_gray.is_none() && self.img_ycbcr.is_none() {
            self.make_img(mxx, myy)?;
        }
        if self.progressive {
            for i in 0..n_comp {
                let compi = scan[i].comp_index;
                if self.prog_coeffs[compi].is_none() {
                    self.prog_coeffs[compi] = Some(vec![
                        [0; 64];
                        mxx * myy * self.comp[compi].h * self.comp[compi].v
                    ]);
                }
            }
        }

        self.r.reset_bits();
        self.eob_run = 0;

        let mut mcu = 0;
        let mut expected_rst = marker::RST0;
        // b holds the block being decoded, in natural (not zig-zag) order.
        let mut b: Block;
        let mut dc = [0i32; MAX_COMPONENTS];
        // bx and by locate the current block in units of 8x8 blocks.
        let mut bx: usize;
        let mut by: usize;
        let mut block_count = 0;

        for my in 0..myy {
            for mx in 0..mxx {
                for i in 0..n_comp {
                    let comp_index = scan[i].comp_index;
                    let hi = self.comp[comp_index].h;
                    let vi = self.comp[comp_index].v;
                    for j in 0..hi * vi {
                        // Blocks visit one MCU at a time; with 4:2:0
                        // sampling a 32x16 image orders its Y blocks
                        //	0 1 4 5
                        //	2 3 6 7
                        // Non-interleaved scans instead walk the
                        // component's own grid left-to-right, top-to-bottom
                        //	0 1 2 3
                        //	4 5 6 7
                        // and carry no data for blocks whose pixel origin
                        // lies outside the image. Only DC scans may be
                        // interleaved; AC scans have a single component.
                        if n_comp != 1 {
                            bx = hi * mx + j % hi;
                            by = vi * my + j / hi;
                        } else {
                            let q = mxx * hi;
                            bx = block_count % q;
                            by = block_count / q;
                            block_count += 1;
                            if bx * 8 >= self.width || by * 8 >= self.height {
                                continue;
                            }
                        }

                        // Load the partially decoded coefficients, if any.
                        if self.progressive {
                            let coeffs = self.prog_coeffs[comp_index]
                                .as_ref()
                                .ok_or(Error::Format("uninitialized progressive coefficients"))?;
                            b = coeffs[by * mxx * hi + bx];
                        } else {
                            b = [0; 64];
                        }

                        if ah != 0 {
                            if zig_start == 0 {
                                // Refining the DC component is a single bit.
                                if self.r.decode_bit()? {
                                    b[0] |= 1 << al;
                                }
                            } else {
                                let huff = self.huff[AC_TABLE][usize::from(scan[i].ta)]
                                    .as_ref()
                                    .ok_or(Error::Format("uninitialized Huffman table"))?;
                                refine_ac(
                                    &mut self.r,
                                    huff,
                                    &mut b,
                                    zig_start,
                                    zig_end,
                                    1 << al,
                                    &mut self.eob_run,
                                )?;
                            }
                        } else {
                            let mut zig = zig_start;
                            if zig == 0 {
                                zig += 1;
                                // DC coefficient, section F.2.2.1.
                                let huff = self.huff[DC_TABLE][usize::from(scan[i].td)]
                                    .as_ref()
                                    .ok_or(Error::Format("uninitialized Huffman table"))?;
                                let value = huff.decode(&mut self.r)?;
                                if value > 16 {
                                    return Err(Error::Unsupported("excessive DC component"));
                                }
                                let dc_delta = self.r.receive_extend(value)?;
                                dc[comp_index] += dc_delta;
                                b[0] = dc[comp_index] << al;
                            }

                            if zig <= zig_end && self.eob_run > 0 {
                                self.eob_run -= 1;
                            } else if zig <= zig_end {
                                // AC coefficients, section F.2.2.2.
                                let huff = self.huff[AC_TABLE][usize::from(scan[i].ta)]
                                    .as_ref()
                                    .ok_or(Error::Format("uninitialized Huffman table"))?;
                                while zig <= zig_end {
                                    let value = huff.decode(&mut self.r)?;
                                    let val0 = i32::from(value >> 4);
                                    let val1 = value & 0x0f;
                                    if val1 != 0 {
                                        zig += val0;
                                        if zig > zig_end {
                                            break;
                                        }
                                        let ac = self.r.receive_extend(val1)?;
                                        b[UNZIG[zig as usize]] = ac << al;
                                    } else if val0 != 0x0f {
                                        self.eob_run = 1 << val0;
                                        if val0 != 0 {
                                            self.eob_run |= self.r.decode_bits(val0)? as u16;
                                        }
                                        self.eob_run -= 1;
                                        break;
                                    } else {
                                        zig += 0x0f;
                                    }
                                    zig += 1;
                                }
                            }
                        }

                        if self.progressive {
                            if zig_end != BLOCK_SIZE as i32 - 1 || al != 0 {
                                // This block's band is not complete yet;
                                // save the coefficients and move on.
                                let coeffs = self.prog_coeffs[comp_index]
                                    .as_mut()
                                    .ok_or(Error::Format("uninitialized progressive coefficients"))?;
                                coeffs[by * mxx * hi + bx] = b;
                                continue;
                            }
                        }

                        // Dequantize, inverse-transform, and store.
                        let tq = usize::from(self.comp[comp_index].tq);
                        for zig in 0..BLOCK_SIZE {
                            b[UNZIG[zig]] *= self.quant[tq][zig];
                        }
                        idct(&mut b);
                        self.store_data_unit(comp_index, bx, by, &b)?;
                    }
                }

                mcu += 1;
                if self.ri > 0 && mcu % self.ri == 0 && mcu < mxx * myy {
                    // The restart marker must follow immediately; this
                    // decoder does not resynchronize from corrupt input.
                    let mut rst = [0u8; 2];
                    self.r.read_full(&mut rst)?;
                    if rst[0] != 0xff || rst[1] != expected_rst {
                        return Err(Error::Format("bad RST marker"));
                    }
                    expected_rst += 1;
                    if expected_rst == marker::RST7 + 1 {
                        expected_rst = marker::RST0;
                    }
                    // Reset the Huffman decoder, the DC components
                    // (section F.2.1.3.1), and the progressive state
                    // (section G.1.2.2).
                    self.r.reset_bits();
                    dc = [0; MAX_COMPONENTS];
                    self.eob_run = 0;
                }
            }
        }

        Ok(())
    }

    fn store_data_unit(
        &mut self,
        comp_index: usize,
        bx: usize,
        by: usize,
        b: &Block,
    ) -> Result<()> {
        if self.n_comp == 1 {
            let img = self
                .img_gray
                .as_mut()
                .ok_or(Error::Format("uninitialized image planes"))?;
            store_block(&mut img.pix, img.stride, bx, by, b);
            return Ok(());
        }
        if comp_index == 3 {
            store_block(&mut self.black_pix, self.black_stride, bx, by, b);
            return Ok(());
        }
        let img = self
            .img_ycbcr
            .as_mut()
            .ok_or(Error::Format("uninitialized image planes"))?;
        match comp_index {
            0 => store_block(&mut img.y, img.y_stride, bx, by, b),
            1 => store_block(&mut img.cb, img.c_stride, bx, by, b),
            2 => store_block(&mut img.cr, img.c_stride, bx, by, b),
            _ => return Err(Error::Unsupported("too many components")),
        }
        Ok(())
    }
}

/// Refine the AC coefficients of one block in a successive approximation
/// scan (sections G.1.2.2 and G.1.2.3). `delta` is 1 << Al.
fn refine_ac<R: Read>(
    r: &mut BitReader<R>,
    h: &Huffman,
    b: &mut Block,
    zig_start: i32,
    zig_end: i32,
    delta: i32,
    eob_run: &mut u16,
) -> Result<()> {
    let mut zig = zig_start;
    if *eob_run == 0 {
        while zig <= zig_end {
            let mut z = 0;
            let value = h.decode(r)?;
            let val0 = i32::from(value >> 4);
            let val1 = value & 0x0f;

            match val1 {
                0 => {
                    if val0 != 0x0f {
                        *eob_run = 1 << val0;
                        if val0 != 0 {
                            *eob_run |= r.decode_bits(val0)? as u16;
                        }
                        break;
                    }
                }
                1 => {
                    z = delta;
                    if !r.decode_bit()? {
                        z = -z;
                    }
                }
                _ => return Err(Error::Format("unexpected Huffman code")),
            }

            zig = refine_non_zeroes(r, b, zig, zig_end, val0, delta)?;
            if zig > zig_end {
                return Err(Error::Format("too many coefficients"));
            }
            if z != 0 {
                b[UNZIG[zig as usize]] = z;
            }
            zig += 1;
        }
    }
    if *eob_run > 0 {
        *eob_run -= 1;
        refine_non_zeroes(r, b, zig, zig_end, -1, delta)?;
    }
    Ok(())
}

/// Refine non-zero entries of `b` in zig-zag order. If `nz >= 0`, the
/// first `nz` zero entries are skipped over.
fn refine_non_zeroes<R: Read>(
    r: &mut BitReader<R>,
    b: &mut Block,
    mut zig: i32,
    zig_end: i32,
    mut nz: i32,
    delta: i32,
) -> Result<i32> {
    while zig <= zig_end {
        let u = UNZIG[zig as usize];
        if b[u] == 0 {
            if nz == 0 {
                break;
            }
            nz -= 1;
        } else if r.decode_bit()? {
            if b[u] >= 0 {
                b[u] += delta;
            } else {
                b[u] -= delta;
            }
        }
        zig += 1;
    }
    Ok(zig)
}
