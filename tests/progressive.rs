// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! Progressive (SOF2) decoding tests against hand-assembled multi-scan
//! streams: DC-first with a point transform, DC refinement, spectral
//! AC scans, end-of-band runs spanning blocks, and Huffman tables
//! redefined between scans. Each progressive stream is checked against
//! the baseline stream encoding the same coefficients.

use jpegpix::{decode, Image};

struct Builder {
    out: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl Builder {
    fn new() -> Self {
        Builder {
            out: vec![0xff, 0xd8],
            acc: 0,
            nbits: 0,
        }
    }

    fn segment(&mut self, m: u8, body: &[u8]) {
        self.out.extend_from_slice(&[0xff, m]);
        let len = (body.len() + 2) as u16;
        self.out.extend_from_slice(&len.to_be_bytes());
        self.out.extend_from_slice(body);
    }

    fn bits(&mut self, code: u32, n: u32) {
        for k in (0..n).rev() {
            self.acc = self.acc << 1 | (code >> k) & 1;
            self.nbits += 1;
            if self.nbits == 8 {
                let b = self.acc as u8;
                self.out.push(b);
                if b == 0xff {
                    self.out.push(0x00);
                }
                self.acc = 0;
                self.nbits = 0;
            }
        }
    }

    fn align(&mut self) {
        while self.nbits != 0 {
            self.bits(1, 1);
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.align();
        self.out.extend_from_slice(&[0xff, 0xd9]);
        self.out
    }
}

fn unit_dqt(id: u8) -> Vec<u8> {
    let mut body = vec![id];
    body.extend_from_slice(&[1u8; 64]);
    body
}

fn dht(class: u8, dest: u8, counts: [u8; 16], vals: &[u8]) -> Vec<u8> {
    let mut body = vec![class << 4 | dest];
    body.extend_from_slice(&counts);
    body.extend_from_slice(vals);
    body
}

fn sof(width: u16, height: u16, comps: &[(u8, u8, u8)]) -> Vec<u8> {
    let mut body = vec![8];
    body.extend_from_slice(&height.to_be_bytes());
    body.extend_from_slice(&width.to_be_bytes());
    body.push(comps.len() as u8);
    for &(id, hv, tq) in comps {
        body.extend_from_slice(&[id, hv, tq]);
    }
    body
}

/// An SOS header with explicit spectral selection and successive
/// approximation parameters.
fn sos(comps: &[(u8, u8)], ss: u8, se: u8, ah: u8, al: u8) -> Vec<u8> {
    let mut body = vec![comps.len() as u8];
    for &(id, tdta) in comps {
        body.extend_from_slice(&[id, tdta]);
    }
    body.extend_from_slice(&[ss, se, ah << 4 | al]);
    body
}

fn gray_pixels(img: &Image) -> Vec<u8> {
    match img {
        Image::Gray(m) => {
            let mut out = Vec::with_capacity(m.width * m.height);
            for y in 0..m.height {
                for x in 0..m.width {
                    out.push(m.pixel(x, y));
                }
            }
            out
        }
        _ => panic!("expected a grayscale raster"),
    }
}

/// Two-block 16×8 grayscale image, DC 256 in both blocks, no AC.
/// The baseline stream encodes it in one scan; the progressive stream
/// splits it into a DC scan at Al=1, a DC refinement, and an AC scan
/// whose table is only defined between the scans.
#[test]
fn three_scan_progressive_equals_baseline() {
    // DC table: '00' -> category 0, '01' -> category 9 (for 256),
    // '10' -> category 8 (for the 128 sent at Al=1).
    let mut dc_counts = [0u8; 16];
    dc_counts[1] = 3;
    let dc_vals = [0u8, 9, 8];

    let baseline = {
        let mut b = Builder::new();
        b.segment(0xdb, &unit_dqt(0));
        b.segment(0xc0, &sof(16, 8, &[(1, 0x11, 0)]));
        b.segment(0xc4, &dht(0, 0, dc_counts, &dc_vals));
        // AC table: '0' -> EOB.
        let mut ac_counts = [0u8; 16];
        ac_counts[0] = 1;
        b.segment(0xc4, &dht(1, 0, ac_counts, &[0x00]));
        b.segment(0xda, &sos(&[(1, 0x00)], 0, 63, 0, 0));
        // Block 1: DC difference 256 (category 9), then EOB.
        b.bits(0b01, 2);
        b.bits(256, 9);
        b.bits(0, 1);
        // Block 2: DC difference 0, then EOB.
        b.bits(0b00, 2);
        b.bits(0, 1);
        b.finish()
    };

    let progressive = {
        let mut b = Builder::new();
        b.segment(0xdb, &unit_dqt(0));
        b.segment(0xc2, &sof(16, 8, &[(1, 0x11, 0)]));
        b.segment(0xc4, &dht(0, 0, dc_counts, &dc_vals));

        // Scan 1: DC first, Al=1, sending 256 >> 1 = 128 (category 8).
        b.segment(0xda, &sos(&[(1, 0x00)], 0, 0, 0, 1));
        b.bits(0b10, 2);
        b.bits(128, 8);
        b.bits(0b00, 2);
        b.align();

        // Scan 2: DC refinement, Ah=1, Al=0: one bit per block, both 0.
        b.segment(0xda, &sos(&[(1, 0x00)], 0, 0, 1, 0));
        b.bits(0, 2);
        b.align();

        // AC table defined only now, between scans: '0' -> EOB run of
        // 2^1 + extension.
        let mut ac_counts = [0u8; 16];
        ac_counts[0] = 1;
        b.segment(0xc4, &dht(1, 0, ac_counts, &[0x10]));

        // Scan 3: AC first, Ss=1, Se=63. One EOB run covers both blocks.
        b.segment(0xda, &sos(&[(1, 0x00)], 1, 63, 0, 0));
        b.bits(0, 1); // the EOBn symbol
        b.bits(0, 1); // extension bit: run length 2
        b.finish()
    };

    let base_img = decode(&baseline[..]).unwrap();
    let prog_img = decode(&progressive[..]).unwrap();
    let base_px = gray_pixels(&base_img);
    let prog_px = gray_pixels(&prog_img);
    assert_eq!(base_px, prog_px);
    // DC 256 with unit quantization decodes to luma 160.
    assert!(base_px.iter().all(|&p| p == 160));
}

fn ycbcr_planes(img: &Image) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    match img {
        Image::YCbCr(m) => {
            let mut y = Vec::new();
            let mut cb = Vec::new();
            let mut cr = Vec::new();
            for py in 0..m.height {
                for px in 0..m.width {
                    let (a, b, c) = m.ycbcr_at(px, py);
                    y.push(a);
                    cb.push(b);
                    cr.push(c);
                }
            }
            (y, cb, cr)
        }
        _ => panic!("expected a YCbCr raster"),
    }
}

/// 16×16 4:2:0 colour image decoded from five progressive scans: an
/// interleaved DC-first scan, an interleaved DC refinement, and one
/// non-interleaved AC scan per component.
#[test]
fn interleaved_dc_scans_with_per_component_ac() {
    let comps = [(1u8, 0x22u8, 0u8), (2, 0x11, 0), (3, 0x11, 0)];
    let mut dc_counts = [0u8; 16];
    dc_counts[0] = 1;

    let baseline = {
        let mut b = Builder::new();
        b.segment(0xdb, &unit_dqt(0));
        b.segment(0xc0, &sof(16, 16, &comps));
        b.segment(0xc4, &dht(0, 0, dc_counts, &[0]));
        let mut ac_counts = [0u8; 16];
        ac_counts[0] = 1;
        b.segment(0xc4, &dht(1, 0, ac_counts, &[0x00]));
        b.segment(
            0xda,
            &sos(&[(1, 0x00), (2, 0x00), (3, 0x00)], 0, 63, 0, 0),
        );
        // One MCU: four Y blocks, one Cb, one Cr, all zero.
        for _ in 0..6 {
            b.bits(0, 1); // DC difference 0
            b.bits(0, 1); // EOB
        }
        b.finish()
    };

    let progressive = {
        let mut b = Builder::new();
        b.segment(0xdb, &unit_dqt(0));
        b.segment(0xc2, &sof(16, 16, &comps));
        b.segment(0xc4, &dht(0, 0, dc_counts, &[0]));

        // Scan 1: interleaved DC first at Al=1.
        b.segment(
            0xda,
            &sos(&[(1, 0x00), (2, 0x00), (3, 0x00)], 0, 0, 0, 1),
        );
        for _ in 0..6 {
            b.bits(0, 1);
        }
        b.align();

        // Scan 2: interleaved DC refinement.
        b.segment(
            0xda,
            &sos(&[(1, 0x00), (2, 0x00), (3, 0x00)], 0, 0, 1, 0),
        );
        b.bits(0, 6);
        b.align();

        let mut ac_counts = [0u8; 16];
        ac_counts[0] = 1;
        b.segment(0xc4, &dht(1, 0, ac_counts, &[0x10]));

        // Scan 3: Y spectral scan; two EOB runs cover the four blocks.
        b.segment(0xda, &sos(&[(1, 0x00)], 1, 63, 0, 0));
        b.bits(0, 2);
        b.bits(0, 2);
        b.align();

        // Scans 4 and 5: Cb and Cr, one block each.
        b.segment(0xda, &sos(&[(2, 0x00)], 1, 63, 0, 0));
        b.bits(0, 2);
        b.align();
        b.segment(0xda, &sos(&[(3, 0x00)], 1, 63, 0, 0));
        b.bits(0, 2);
        b.finish()
    };

    let base_img = decode(&baseline[..]).unwrap();
    let prog_img = decode(&progressive[..]).unwrap();
    assert_eq!(ycbcr_planes(&base_img), ycbcr_planes(&prog_img));
    let (y, cb, cr) = ycbcr_planes(&prog_img);
    assert!(y.iter().all(|&p| p == 128));
    assert!(cb.iter().all(|&p| p == 128));
    assert!(cr.iter().all(|&p| p == 128));
}

#[test]
fn bad_spectral_selection_is_rejected() {
    let mut b = Builder::new();
    b.segment(0xdb, &unit_dqt(0));
    b.segment(0xc2, &sof(8, 8, &[(1, 0x11, 0)]));
    let mut dc_counts = [0u8; 16];
    dc_counts[0] = 1;
    b.segment(0xc4, &dht(0, 0, dc_counts, &[0]));
    // Ss > Se.
    b.segment(0xda, &sos(&[(1, 0x00)], 5, 2, 0, 0));
    assert!(decode(&b.finish()[..]).is_err());
}

#[test]
fn interleaved_ac_scan_is_rejected() {
    let comps = [(1u8, 0x11u8, 0u8), (2, 0x11, 0), (3, 0x11, 0)];
    let mut b = Builder::new();
    b.segment(0xdb, &unit_dqt(0));
    b.segment(0xc2, &sof(8, 8, &comps));
    let mut ac_counts = [0u8; 16];
    ac_counts[0] = 1;
    b.segment(0xc4, &dht(1, 0, ac_counts, &[0x00]));
    // AC scans must carry exactly one component.
    b.segment(
        0xda,
        &sos(&[(1, 0x00), (2, 0x00), (3, 0x00)], 1, 63, 0, 0),
    );
    assert!(decode(&b.finish()[..]).is_err());
}
