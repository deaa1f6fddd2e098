// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! Baseline sequential JPEG encoding.
//!
//! Colour images are written 4:2:0: every 16×16 region yields four Y
//! blocks plus one Cb and one Cr block obtained by 2×2 averaging.
//! Grayscale images are written 4:4:4 with a single component. The fixed
//! Annex K Huffman tables are used for every image; only the quantization
//! tables vary, scaled by the quality parameter.

use std::io::Write;
use std::sync::OnceLock;

use crate::bitio::BitWriter;
use crate::dct::{fdct, Block, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::huffman::HuffmanLut;
use crate::marker;
use crate::pixels::{rgb_to_ycbcr, PixelSource};
use crate::tables::{CHROMINANCE, LUMINANCE, THE_HUFFMAN_SPECS, UNSCALED_QUANT};
use crate::zigzag::UNZIG;

/// The default encoding quality.
pub const DEFAULT_QUALITY: u8 = 100;

/// Encoding parameters. Quality ranges from 1 to 100 inclusive; higher is
/// better.
#[derive(Clone, Copy, Debug)]
pub struct EncodeOptions {
    pub quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

/// `a/b` rounded to the nearest integer instead of towards zero.
fn div(a: i32, b: i32) -> i32 {
    if a >= 0 {
        (a + (b >> 1)) / b
    } else {
        -((-a + (b >> 1)) / b)
    }
}

/// Number of bits needed to hold an integer's magnitude.
const BIT_COUNT: [u8; 256] = {
    let mut t = [0u8; 256];
    let mut i = 1usize;
    while i < 256 {
        let mut n = 0u8;
        let mut v = i;
        while v > 0 {
            n += 1;
            v >>= 1;
        }
        t[i] = n;
        i += 1;
    }
    t
};

fn encoder_luts() -> &'static [HuffmanLut; 4] {
    static LUTS: OnceLock<[HuffmanLut; 4]> = OnceLock::new();
    LUTS.get_or_init(|| {
        [
            HuffmanLut::new(&THE_HUFFMAN_SPECS[0]),
            HuffmanLut::new(&THE_HUFFMAN_SPECS[1]),
            HuffmanLut::new(&THE_HUFFMAN_SPECS[2]),
            HuffmanLut::new(&THE_HUFFMAN_SPECS[3]),
        ]
    })
}

// The SOS marker and header for a single-component scan: component 1 uses
// DC table 0 and AC table 0, followed by Ss=0, Se=63, Ah=Al=0 as section
// B.2.3 requires for sequential DCTs.
const SOS_HEADER_Y: [u8; 10] = [0xff, 0xda, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3f, 0x00];

// The SOS marker and header for a three-component scan: component 1 uses
// tables 0/0, components 2 and 3 use tables 1/1.
const SOS_HEADER_YCBCR: [u8; 14] = [
    0xff, 0xda, 0x00, 0x0c, 0x03, 0x01, 0x00, 0x02, 0x11, 0x03, 0x11, 0x00, 0x3f, 0x00,
];

struct Encoder {
    w: BitWriter,
    /// Scaled quantization tables, in zig-zag order.
    quant: [[u8; 64]; 2],
    luts: &'static [HuffmanLut; 4],
}

impl Encoder {
    fn write_marker_header(&mut self, mark: u8, marker_len: usize) {
        self.w.put_bytes(&[
            0xff,
            mark,
            (marker_len >> 8) as u8,
            (marker_len & 0xff) as u8,
        ]);
    }

    /// Emit `value` with the given Huffman table.
    fn emit_huff(&mut self, h: usize, value: i32) {
        let x = self.luts[h].get(value as usize);
        self.w.emit(x & ((1 << 24) - 1), x >> 24);
    }

    /// Emit a run-length/magnitude pair followed by the magnitude bits.
    fn emit_huff_rle(&mut self, h: usize, run_length: i32, value: i32) {
        let (a, b) = if value < 0 {
            (-value, value - 1)
        } else {
            (value, value)
        };
        let n_bits = if a < 0x100 {
            u32::from(BIT_COUNT[a as usize])
        } else {
            8 + u32::from(BIT_COUNT[(a >> 8) as usize])
        };
        self.emit_huff(h, run_length << 4 | n_bits as i32);
        if n_bits > 0 {
            self.w.emit((b as u32) & ((1 << n_bits) - 1), n_bits);
        }
    }

    fn write_dqt(&mut self, n_component: usize) {
        let n_tables = if n_component == 1 { 1 } else { 2 };
        self.write_marker_header(marker::DQT, 2 + n_tables * (1 + BLOCK_SIZE));
        for i in 0..n_tables {
            self.w.put_byte(i as u8);
            let q = self.quant[i];
            self.w.put_bytes(&q);
        }
    }

    fn write_sof0(&mut self, width: usize, height: usize, n_component: usize) {
        self.write_marker_header(marker::SOF0, 8 + 3 * n_component);
        self.w.put_byte(8); // 8-bit precision
        self.w.put_bytes(&[
            (height >> 8) as u8,
            (height & 0xff) as u8,
            (width >> 8) as u8,
            (width & 0xff) as u8,
            n_component as u8,
        ]);
        if n_component == 1 {
            // No subsampling for a grayscale image.
            self.w.put_bytes(&[1, 0x11, 0x00]);
        } else {
            // 4:2:0 chroma subsampling.
            for i in 0..n_component {
                self.w.put_byte(i as u8 + 1);
                self.w.put_byte([0x22, 0x11, 0x11][i]);
                self.w.put_byte([0x00, 0x01, 0x01][i]);
            }
        }
    }

    fn write_dht(&mut self, n_component: usize) {
        let specs = if n_component == 1 {
            // Grayscale drops the chrominance tables.
            &THE_HUFFMAN_SPECS[..2]
        } else {
            &THE_HUFFMAN_SPECS[..]
        };
        let mut marker_len = 2;
        for s in specs {
            marker_len += 1 + 16 + s.values.len();
        }
        self.write_marker_header(marker::DHT, marker_len);
        for (i, s) in specs.iter().enumerate() {
            self.w.put_byte([0x00, 0x10, 0x01, 0x11][i]);
            self.w.put_bytes(&s.counts);
            self.w.put_bytes(s.values);
        }
    }

    /// Forward-transform and entropy-code one block of samples (in natural
    /// order) against the given quantization table, returning the
    /// quantized DC value for the next block's delta.
    fn write_block(&mut self, b: &mut Block, q: usize, prev_dc: i32) -> i32 {
        fdct(b);
        // The DC delta. The FDCT left an overall factor of 8, absorbed
        // into the quantization divisor.
        let dc = div(b[0], 8 * i32::from(self.quant[q][0]));
        self.emit_huff_rle(2 * q, 0, dc - prev_dc);
        // The AC components, run-length coded over zeros.
        let h = 2 * q + 1;
        let mut run_length = 0;
        for zig in 1..BLOCK_SIZE {
            let ac = div(b[UNZIG[zig]], 8 * i32::from(self.quant[q][zig]));
            if ac == 0 {
                run_length += 1;
            } else {
                while run_length > 15 {
                    self.emit_huff(h, 0xf0);
                    run_length -= 16;
                }
                self.emit_huff_rle(h, run_length, ac);
                run_length = 0;
            }
        }
        if run_length > 0 {
            self.emit_huff(h, 0x00);
        }
        dc
    }

    fn write_sos<S: PixelSource + ?Sized>(&mut self, img: &S, n_component: usize) {
        let (width, height) = (img.width(), img.height());
        let mut b: Block = [0; 64];

        if n_component == 1 {
            self.w.put_bytes(&SOS_HEADER_Y);
            let mut prev_dc_y = 0;
            if let Some((pix, stride)) = img.gray_plane() {
                for y in (0..height).step_by(8) {
                    for x in (0..width).step_by(8) {
                        gray_to_y(pix, stride, width, height, x, y, &mut b);
                        prev_dc_y = self.write_block(&mut b, LUMINANCE, prev_dc_y);
                    }
                }
            }
            self.w.pad_to_byte();
            return;
        }

        self.w.put_bytes(&SOS_HEADER_YCBCR);
        let mut cb = [[0i32; 64]; 4];
        let mut cr = [[0i32; 64]; 4];
        let (mut prev_dc_y, mut prev_dc_cb, mut prev_dc_cr) = (0, 0, 0);
        let rgba = img.rgba_plane();
        for y in (0..height).step_by(16) {
            for x in (0..width).step_by(16) {
                for i in 0..4 {
                    let x_off = (i & 1) * 8;
                    let y_off = (i & 2) * 4;
                    match rgba {
                        Some((pix, stride)) => rgba_to_ycbcr_block(
                            pix,
                            stride,
                            width,
                            height,
                            x + x_off,
                            y + y_off,
                            &mut b,
                            &mut cb[i],
                            &mut cr[i],
                        ),
                        None => to_ycbcr_block(
                            img,
                            x + x_off,
                            y + y_off,
                            &mut b,
                            &mut cb[i],
                            &mut cr[i],
                        ),
                    }
                    prev_dc_y = self.write_block(&mut b, LUMINANCE, prev_dc_y);
                }
                scale(&mut b, &cb);
                prev_dc_cb = self.write_block(&mut b, CHROMINANCE, prev_dc_cb);
                scale(&mut b, &cr);
                prev_dc_cr = self.write_block(&mut b, CHROMINANCE, prev_dc_cr);
            }
        }
        self.w.pad_to_byte();
    }
}

/// Store the 8×8 region of a grayscale plane at (px, py) into `y_block`,
/// replicating the last column and row past the edges.
fn gray_to_y(
    pix: &[u8],
    stride: usize,
    width: usize,
    height: usize,
    px: usize,
    py: usize,
    y_block: &mut Block,
) {
    let xmax = width - 1;
    let ymax = height - 1;
    for j in 0..8 {
        let row = (py + j).min(ymax) * stride;
        for i in 0..8 {
            y_block[8 * j + i] = i32::from(pix[row + (px + i).min(xmax)]);
        }
    }
}

/// Convert the 8×8 region of an interleaved RGBA plane at (px, py) to
/// YCbCr blocks.
fn rgba_to_ycbcr_block(
    pix: &[u8],
    stride: usize,
    width: usize,
    height: usize,
    px: usize,
    py: usize,
    y_block: &mut Block,
    cb_block: &mut Block,
    cr_block: &mut Block,
) {
    let xmax = width - 1;
    let ymax = height - 1;
    for j in 0..8 {
        let row = (py + j).min(ymax) * stride;
        for i in 0..8 {
            let off = row + 4 * (px + i).min(xmax);
            let (yy, cb, cr) = rgb_to_ycbcr(pix[off], pix[off + 1], pix[off + 2]);
            y_block[8 * j + i] = i32::from(yy);
            cb_block[8 * j + i] = i32::from(cb);
            cr_block[8 * j + i] = i32::from(cr);
        }
    }
}

/// Per-pixel fallback for sources without a contiguous RGBA layout.
fn to_ycbcr_block<S: PixelSource + ?Sized>(
    img: &S,
    px: usize,
    py: usize,
    y_block: &mut Block,
    cb_block: &mut Block,
    cr_block: &mut Block,
) {
    let xmax = img.width() - 1;
    let ymax = img.height() - 1;
    for j in 0..8 {
        for i in 0..8 {
            let (r, g, b, _) = img.rgba_at((px + i).min(xmax), (py + j).min(ymax));
            let (yy, cb, cr) = rgb_to_ycbcr((r >> 8) as u8, (g >> 8) as u8, (b >> 8) as u8);
            y_block[8 * j + i] = i32::from(yy);
            cb_block[8 * j + i] = i32::from(cb);
            cr_block[8 * j + i] = i32::from(cr);
        }
    }
}

/// Downsample the 16×16 region held by the four source blocks into one
/// 8×8 block by 2×2 averaging.
fn scale(dst: &mut Block, src: &[Block; 4]) {
    for i in 0..4 {
        let dst_off = (i & 2) << 4 | (i & 1) << 2;
        for y in 0..4 {
            for x in 0..4 {
                let j = 16 * y + 2 * x;
                let sum = src[i][j] + src[i][j + 1] + src[i][j + 8] + src[i][j + 9];
                dst[8 * y + x + dst_off] = (sum + 2) >> 2;
            }
        }
    }
}

/// Encode an image to `w` in baseline JPEG format.
///
/// Sources exposing a grayscale plane are written as single-component
/// 4:4:4; everything else is written as three-component YCbCr 4:2:0.
pub fn encode<W: Write, S: PixelSource + ?Sized>(
    w: &mut W,
    img: &S,
    opts: &EncodeOptions,
) -> Result<()> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(Error::Format("invalid image dimensions"));
    }
    if width >= 1 << 16 || height >= 1 << 16 {
        return Err(Error::Unsupported("image is too large to encode"));
    }

    let quality = i32::from(opts.quality.clamp(1, 100));
    // Convert the quality rating to a percentage scaling factor.
    let scale_factor = if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    };

    let mut e = Encoder {
        w: BitWriter::new(),
        quant: [[0; 64]; 2],
        luts: encoder_luts(),
    };
    for i in 0..e.quant.len() {
        for j in 0..BLOCK_SIZE {
            let x = i32::from(UNSCALED_QUANT[i][j]);
            e.quant[i][j] = ((x * scale_factor + 50) / 100).clamp(1, 255) as u8;
        }
    }

    let n_component = if img.gray_plane().is_some() { 1 } else { 3 };

    e.w.put_bytes(&[0xff, marker::SOI]);
    e.write_dqt(n_component);
    e.write_sof0(width, height, n_component);
    e.write_dht(n_component);
    e.write_sos(img, n_component);
    e.w.put_bytes(&[0xff, marker::EOI]);

    w.write_all(&e.w.into_bytes())?;
    w.flush()?;
    Ok(())
}
