// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! The marker-driven decoder.
//!
//! [`decode`] walks the segments from SOI to EOI, dispatching each marker
//! to its handler; the entropy-coded scan itself is decoded in the `scan`
//! module. The scanner is liberal where libjpeg is liberal: extraneous
//! bytes between segments are skipped, fill 0xFF bytes before a marker are
//! collapsed (including before SOI itself), stray 0xFF 0x00 pairs are
//! ignored, and restart markers outside a scan are tolerated.

use std::io::Read;

use crate::bitio::BitReader;
use crate::dct::Block;
use crate::error::{Error, Result};
use crate::frame::{parse_sof, Component};
use crate::huffman::Huffman;
use crate::marker;
use crate::pixels::{CmykImage, GrayImage, Image, RgbaImage, Subsampling, YCbCrImage};
use crate::tables::{parse_dht, parse_dqt};

/// Maximum number of components in a frame.
pub(crate) const MAX_COMPONENTS: usize = 4;

// Adobe APP14 colour-transform codes. 0 means unknown (RGB or CMYK),
// 1 means YCbCr, 2 means YCbCrK.
const ADOBE_TRANSFORM_UNKNOWN: u8 = 0;

/// Image dimensions and colour model, available without decoding the
/// entropy-coded data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub width: usize,
    pub height: usize,
    pub color: ColorType,
}

/// The raster variant a decode call would produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorType {
    Gray,
    YCbCr,
    Rgba,
    Cmyk,
}

pub(crate) struct Decoder<R: Read> {
    pub(crate) r: BitReader<R>,
    pub(crate) width: usize,
    pub(crate) height: usize,

    pub(crate) img_gray: Option<GrayImage>,
    pub(crate) img_ycbcr: Option<YCbCrImage>,
    pub(crate) black_pix: Vec<u8>,
    pub(crate) black_stride: usize,

    /// Restart interval in MCUs; zero disables restart markers.
    pub(crate) ri: usize,
    pub(crate) n_comp: usize,
    pub(crate) progressive: bool,
    pub(crate) jfif: bool,
    pub(crate) adobe_transform_valid: bool,
    pub(crate) adobe_transform: u8,
    /// End-of-Band run (ITU-T T.81 section G.1.2.2).
    pub(crate) eob_run: u16,

    pub(crate) comp: [Component; MAX_COMPONENTS],
    /// Saved coefficients between progressive scans, allocated lazily.
    pub(crate) prog_coeffs: [Option<Vec<Block>>; MAX_COMPONENTS],
    /// Huffman tables by class (0 = DC, 1 = AC) and destination.
    pub(crate) huff: [[Option<Huffman>; 4]; 2],
    /// Quantization tables, in zig-zag order.
    pub(crate) quant: [[i32; 64]; 4],
    pub(crate) tmp: [u8; 2 * 64],
}

impl<R: Read> Decoder<R> {
    pub(crate) fn new(r: R) -> Self {
        Self {
            r: BitReader::new(r),
            width: 0,
            height: 0,
            img_gray: None,
            img_ycbcr: None,
            black_pix: Vec::new(),
            black_stride: 0,
            ri: 0,
            n_comp: 0,
            progressive: false,
            jfif: false,
            adobe_transform_valid: false,
            adobe_transform: 0,
            eob_run: 0,
            comp: [Component::default(); MAX_COMPONENTS],
            prog_coeffs: Default::default(),
            huff: Default::default(),
            quant: [[0; 64]; 4],
            tmp: [0; 2 * 64],
        }
    }

    /// Decode the stream. In config-only mode, returns `Ok(None)` as soon
    /// as the frame header has been parsed.
    pub(crate) fn decode(&mut self, config_only: bool) -> Result<Option<Image>> {
        // Check for the Start Of Image marker, tolerating fill bytes.
        self.r.read_full(&mut self.tmp[..2])?;
        if self.tmp[0] != 0xff {
            return Err(Error::Format("missing SOI marker"));
        }
        while self.tmp[1] == 0xff {
            self.tmp[1] = self.r.read_byte()?;
        }
        if self.tmp[1] != marker::SOI {
            return Err(Error::Format("missing SOI marker"));
        }

        // Process segments until the End Of Image marker.
        loop {
            self.r.read_full(&mut self.tmp[..2])?;
            while self.tmp[0] != 0xff {
                // libjpeg silently skips extraneous data before a marker,
                // so we do too.
                self.tmp[0] = self.tmp[1];
                self.tmp[1] = self.r.read_byte()?;
            }
            let mut mark = self.tmp[1];
            if mark == 0 {
                // An 0xff 0x00 pair outside entropy data is extraneous.
                continue;
            }
            while mark == 0xff {
                // Section B.1.1.2: any marker may be preceded by any
                // number of 0xff fill bytes.
                mark = self.r.read_byte()?;
            }
            if mark == marker::EOI {
                break;
            }
            if (marker::RST0..=marker::RST7).contains(&mark) {
                // Some encoders emit a stray restart marker after the
                // final scan; it carries no data and is harmless.
                continue;
            }

            // The 16-bit segment length includes its own two bytes.
            self.r.read_full(&mut self.tmp[..2])?;
            let len = usize::from(self.tmp[0]) << 8 | usize::from(self.tmp[1]);
            if len < 2 {
                return Err(Error::Format("short segment length"));
            }
            let n = len - 2;

            match mark {
                marker::SOF0 | marker::SOF1 | marker::SOF2 => {
                    self.progressive = mark == marker::SOF2;
                    self.process_sof(n)?;
                    if config_only {
                        return Ok(None);
                    }
                }
                marker::DHT => {
                    let body = self.read_segment(n)?;
                    parse_dht(&body, self.progressive, &mut self.huff)?;
                }
                marker::DQT => {
                    let body = self.read_segment(n)?;
                    parse_dqt(&body, &mut self.quant)?;
                }
                marker::SOS => {
                    self.process_sos(n)?;
                }
                marker::DRI => {
                    self.process_dri(n)?;
                }
                marker::APP0 => {
                    self.process_app0(n)?;
                }
                marker::APP14 => {
                    self.process_app14(n)?;
                }
                _ => {
                    if (marker::APP0..=marker::APP15).contains(&mark) || mark == marker::COM {
                        self.r.ignore(n)?;
                    } else if mark < 0xc0 {
                        // Table B.1: everything below 0xC0 is reserved or
                        // structural, so this stream is malformed.
                        return Err(Error::Format("unknown marker"));
                    } else {
                        return Err(Error::Unsupported("unknown marker"));
                    }
                }
            }
        }

        if let Some(img) = self.img_gray.take() {
            return Ok(Some(Image::Gray(img)));
        }
        if let Some(img3) = self.img_ycbcr.take() {
            if !self.black_pix.is_empty() {
                return Ok(Some(self.apply_black(&img3)?));
            }
            if self.is_rgb() {
                return Ok(Some(self.convert_to_rgb(&img3)?));
            }
            return Ok(Some(Image::YCbCr(img3)));
        }
        Err(Error::Format("missing SOS marker"))
    }

    fn read_segment(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut body = vec![0; n];
        self.r.read_full(&mut body)?;
        Ok(body)
    }

    /// Section B.2.2.
    fn process_sof(&mut self, n: usize) -> Result<()> {
        if self.n_comp != 0 {
            return Err(Error::Format("multiple SOF markers"));
        }
        if !matches!(n, 9 | 15 | 18) {
            return Err(Error::Unsupported("number of components"));
        }
        self.r.read_full(&mut self.tmp[..n])?;
        let fh = parse_sof(&self.tmp[..n])?;
        self.width = fh.width;
        self.height = fh.height;
        self.n_comp = fh.n_comp;
        self.comp = fh.comp;
        Ok(())
    }

    /// Section B.2.4.4.
    fn process_dri(&mut self, n: usize) -> Result<()> {
        if n != 2 {
            return Err(Error::Format("DRI has wrong length"));
        }
        self.r.read_full(&mut self.tmp[..2])?;
        self.ri = usize::from(self.tmp[0]) << 8 | usize::from(self.tmp[1]);
        Ok(())
    }

    fn process_app0(&mut self, mut n: usize) -> Result<()> {
        if n < 5 {
            return self.r.ignore(n);
        }
        self.r.read_full(&mut self.tmp[..5])?;
        n -= 5;
        self.jfif = self.tmp[..5] == *b"JFIF\0";
        if n > 0 {
            return self.r.ignore(n);
        }
        Ok(())
    }

    fn process_app14(&mut self, mut n: usize) -> Result<()> {
        if n < 12 {
            return self.r.ignore(n);
        }
        self.r.read_full(&mut self.tmp[..12])?;
        n -= 12;
        if self.tmp[..5] == *b"Adobe" {
            self.adobe_transform_valid = true;
            self.adobe_transform = self.tmp[11];
        }
        if n > 0 {
            return self.r.ignore(n);
        }
        Ok(())
    }

    /// Allocate the output planes, sized to whole MCUs and cropped to the
    /// visible rectangle.
    pub(crate) fn make_img(&mut self, mxx: usize, myy: usize) -> Result<()> {
        if self.n_comp == 1 {
            self.img_gray = Some(GrayImage::with_layout(
                8 * mxx,
                8 * myy,
                self.width,
                self.height,
            ));
            return Ok(());
        }

        let h0 = self.comp[0].h;
        let v0 = self.comp[0].v;
        let hr = h0 / self.comp[1].h;
        let vr = v0 / self.comp[1].v;
        let subsampling = Subsampling::from_ratio(hr, vr)
            .ok_or(Error::Unsupported("luma/chroma subsampling ratio"))?;
        let y_stride = 8 * h0 * mxx;
        let y_height = 8 * v0 * myy;
        self.img_ycbcr = Some(YCbCrImage::new(
            y_stride,
            y_height,
            y_stride / hr,
            y_height / vr,
            subsampling,
            self.width,
            self.height,
        ));

        if self.n_comp == 4 {
            let h3 = self.comp[3].h;
            let v3 = self.comp[3].v;
            self.black_pix = vec![0; 8 * h3 * mxx * 8 * v3 * myy];
            self.black_stride = 8 * h3 * mxx;
        }
        Ok(())
    }

    /// A three-component JPEG carries RGB rather than YCbCr when it has no
    /// JFIF marker and either the Adobe transform says "unknown", or the
    /// component identifiers are literally 'R', 'G', 'B'.
    pub(crate) fn is_rgb(&self) -> bool {
        if self.jfif {
            return false;
        }
        if self.adobe_transform_valid && self.adobe_transform == ADOBE_TRANSFORM_UNKNOWN {
            return true;
        }
        self.comp[0].c == b'R' && self.comp[1].c == b'G' && self.comp[2].c == b'B'
    }

    /// Interleave the three planes of an RGB JPEG into an RGBA raster. No
    /// colour conversion happens; the components already hold R, G, B.
    fn convert_to_rgb(&self, img3: &YCbCrImage) -> Result<Image> {
        let c_scale = self.comp[0].h / self.comp[1].h;
        let v_scale = self.comp[0].v / self.comp[1].v;
        let mut img = RgbaImage::new(self.width, self.height);
        for y in 0..self.height {
            let po = y * img.stride;
            let yo = y * img3.y_stride;
            let co = (y / v_scale) * img3.c_stride;
            for i in 0..self.width {
                img.pix[po + 4 * i] = img3.y[yo + i];
                img.pix[po + 4 * i + 1] = img3.cb[co + i / c_scale];
                img.pix[po + 4 * i + 2] = img3.cr[co + i / c_scale];
                img.pix[po + 4 * i + 3] = 255;
            }
        }
        Ok(Image::Rgba(img))
    }

    /// Combine the three YCbCr planes and the black plane into a CMYK
    /// raster. Adobe stores CMYK inverted (255 is no ink), and a double
    /// inversion is a no-op, so some inversions below are implicit.
    fn apply_black(&self, img3: &YCbCrImage) -> Result<Image> {
        if !self.adobe_transform_valid {
            return Err(Error::Unsupported(
                "unknown color model: 4-component JPEG doesn't have Adobe APP14 metadata",
            ));
        }
        let mut img = CmykImage::new(self.width, self.height);

        if self.adobe_transform != ADOBE_TRANSFORM_UNKNOWN {
            // YCbCrK, per libjpeg's jdapimin.c: convert the YCbCr part to
            // RGB, which lands in the CMY channels because the RGB-to-CMY
            // inversion cancels the Adobe inversion. Only the black
            // channel is actually inverted.
            for y in 0..self.height {
                let o = y * img.stride;
                for x in 0..self.width {
                    let (r, g, b) = img3.rgb_at(x, y);
                    img.pix[o + 4 * x] = r;
                    img.pix[o + 4 * x + 1] = g;
                    img.pix[o + 4 * x + 2] = b;
                    img.pix[o + 4 * x + 3] =
                        255 - self.black_pix[y * self.black_stride + x];
                }
            }
            return Ok(Image::Cmyk(img));
        }

        // Plain CMYK: the first three channels were decoded into the
        // YCbCr planes, possibly subsampled; interleave all four with the
        // inversion applied.
        let translations: [(&[u8], usize); 4] = [
            (&img3.y, img3.y_stride),
            (&img3.cb, img3.c_stride),
            (&img3.cr, img3.c_stride),
            (&self.black_pix, self.black_stride),
        ];
        for (t, &(src, stride)) in translations.iter().enumerate() {
            let subsample =
                self.comp[t].h != self.comp[0].h || self.comp[t].v != self.comp[0].v;
            for y in 0..self.height {
                let o = y * img.stride + t;
                let sy = if subsample { y / 2 } else { y };
                for x in 0..self.width {
                    let sx = if subsample { x / 2 } else { x };
                    img.pix[o + 4 * x] = 255 - src[sy * stride + sx];
                }
            }
        }
        Ok(Image::Cmyk(img))
    }
}

/// Decode a JPEG stream into a pixel raster.
pub fn decode<R: Read>(r: R) -> Result<Image> {
    let mut d = Decoder::new(r);
    match d.decode(false)? {
        Some(img) => Ok(img),
        None => Err(Error::Format("missing SOS marker")),
    }
}

/// Return the dimensions and colour model of a JPEG stream without
/// decoding the entropy-coded data.
pub fn decode_config<R: Read>(r: R) -> Result<Config> {
    let mut d = Decoder::new(r);
    d.decode(true)?;
    let color = match d.n_comp {
        1 => ColorType::Gray,
        3 => {
            if d.is_rgb() {
                ColorType::Rgba
            } else {
                ColorType::YCbCr
            }
        }
        4 => ColorType::Cmyk,
        _ => return Err(Error::Format("missing SOF marker")),
    };
    Ok(Config {
        width: d.width,
        height: d.height,
        color,
    })
}
