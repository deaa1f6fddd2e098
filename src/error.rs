// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! Error types for JPEG decoding and encoding.

use std::fmt;
use std::io;

/// Errors that can occur during JPEG decoding or encoding.
#[derive(Debug)]
pub enum Error {
    /// The input is not a valid JPEG stream.
    Format(&'static str),
    /// The input is a valid JPEG but uses an unimplemented feature.
    Unsupported(&'static str),
    /// The byte source or sink failed.
    Io(io::Error),
    /// The input ended in the middle of a segment or scan.
    UnexpectedEof,
    /// A marker byte appeared inside entropy-coded data where the
    /// byte-stuffed sequence 0xFF 0x00 was expected.
    MissingFF00,
    /// The entropy-coded data ran out while decoding a Huffman symbol.
    ShortHuffmanData,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(msg) => write!(f, "invalid JPEG format: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported JPEG feature: {msg}"),
            Self::Io(e) => write!(f, "{e}"),
            Self::UnexpectedEof => write!(f, "unexpected EOF"),
            Self::MissingFF00 => write!(f, "invalid JPEG format: missing 0xff00 sequence"),
            Self::ShortHuffmanData => write!(f, "invalid JPEG format: short Huffman data"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
