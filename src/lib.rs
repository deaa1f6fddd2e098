// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! # jpegpix
//!
//! Pure-Rust JPEG pixel codec (zero external dependencies).
//!
//! Decodes baseline, extended-sequential, and progressive JPEG streams
//! (ITU-T T.81) into pixel rasters, and encodes pixel rasters back to
//! baseline sequential JPEG at a chosen quality.
//!
//! Supports:
//! - Baseline (SOF0), extended sequential (SOF1), and progressive (SOF2)
//!   decoding, 8-bit precision
//! - Grayscale, YCbCr, RGB, and CMYK/YCbCrK (Adobe) colour models
//! - Chroma subsampling 4:4:4, 4:4:0, 4:2:2, 4:2:0, 4:1:1, 4:1:0
//! - Restart markers (DRI/RST)
//! - Baseline encoding: 4:2:0 for colour, single-component for grayscale
//!
//! Does NOT support:
//! - Arithmetic coding, lossless, and hierarchical modes -- rejected at
//!   parse time
//! - 12-bit precision -- rejected at parse time
//!
//! # Quick start
//!
//! ```rust,ignore
//! let data = std::fs::read("photo.jpg").unwrap();
//! let img = jpegpix::decode(&data[..]).unwrap();
//!
//! if let jpegpix::Image::YCbCr(m) = &img {
//!     let (r, g, b) = m.rgb_at(0, 0);
//!     println!("{}x{}, top-left pixel #{r:02x}{g:02x}{b:02x}", m.width, m.height);
//! }
//! ```

pub mod error;
pub mod zigzag;
mod marker;
mod bitio;
mod huffman;
mod tables;
mod frame;
mod dct;
pub mod pixels;
mod scan;
mod decode;
mod encode;

pub use decode::{decode, decode_config, ColorType, Config};
pub use encode::{encode, EncodeOptions, DEFAULT_QUALITY};
pub use error::{Error, Result};
pub use pixels::{
    rgb_to_ycbcr, ycbcr_to_rgb, CmykImage, GrayImage, Image, PixelSource, RgbaImage, Subsampling,
    YCbCrImage,
};
