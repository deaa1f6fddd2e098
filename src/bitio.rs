// Copyright (c) 2026 The jpegpix developers
// SPDX-License-Identifier: GPL-3.0-only

//! Bit-level I/O for JPEG entropy-coded data.
//!
//! [`BitReader`] buffers a byte source, strips the 0xFF 0x00 byte-stuffing
//! inside entropy-coded segments, and exposes an MSB-first bit accumulator.
//! The Huffman fast path peeks 8 bits at a time, which means a refill can
//! overshoot by one or two bytes into the next marker; the buffer therefore
//! keeps the last two consumed bytes addressable so they can be unread.
//!
//! [`BitWriter`] is the encoding counterpart: an owned output buffer with
//! MSB-first bit emission and 0xFF -> 0xFF 0x00 stuffing.

use std::io::Read;

use crate::error::{Error, Result};

/// Unprocessed bits taken from the byte stream.
///
/// The `n` least significant bits of `a` are the unread bits, consumed MSB
/// first. Invariant: `m == 1 << (n - 1)` when `n > 0`, and `m == 0` when
/// `n == 0` — `m` always masks the next bit to be read.
#[derive(Clone, Copy, Default)]
pub(crate) struct Bits {
    pub a: u32,
    pub m: u32,
    pub n: i32,
}

/// Buffered reader over the byte source with a bit accumulator on top.
pub(crate) struct BitReader<R: Read> {
    r: R,
    /// `buf[i..j]` are bytes read from the source not yet passed on.
    buf: [u8; 4096],
    i: usize,
    j: usize,
    /// Number of bytes to back `i` up after a stuffed-read overshoot (0–2).
    n_unreadable: usize,
    pub(crate) bits: Bits,
}

impl<R: Read> BitReader<R> {
    pub(crate) fn new(r: R) -> Self {
        Self {
            r,
            buf: [0; 4096],
            i: 0,
            j: 0,
            n_unreadable: 0,
            bits: Bits::default(),
        }
    }

    /// Discard the accumulator, returning to a byte boundary.
    pub(crate) fn reset_bits(&mut self) {
        self.bits = Bits::default();
    }

    /// Refill the buffer from the source. Must only be called when every
    /// buffered byte has been consumed.
    fn fill(&mut self) -> Result<()> {
        debug_assert_eq!(self.i, self.j, "fill called with unread bytes");
        // Keep the last two consumed bytes at the front so that
        // unread_byte_stuffed_byte stays valid across the refill.
        if self.j > 2 {
            self.buf[0] = self.buf[self.j - 2];
            self.buf[1] = self.buf[self.j - 1];
            self.i = 2;
            self.j = 2;
        }
        loop {
            match self.r.read(&mut self.buf[self.j..]) {
                Ok(0) => return Err(Error::UnexpectedEof),
                Ok(n) => {
                    self.j += n;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Next raw byte, ignoring byte stuffing.
    pub(crate) fn read_byte(&mut self) -> Result<u8> {
        while self.i == self.j {
            self.fill()?;
        }
        let x = self.buf[self.i];
        self.i += 1;
        self.n_unreadable = 0;
        Ok(x)
    }

    /// Next byte of entropy-coded data. A 0xFF must be followed by 0x00
    /// (which is stripped); any other byte after 0xFF is a marker and
    /// yields [`Error::MissingFF00`].
    pub(crate) fn read_byte_stuffed_byte(&mut self) -> Result<u8> {
        // Fast path when two buffered bytes are available.
        if self.i + 2 <= self.j {
            let x = self.buf[self.i];
            self.i += 1;
            self.n_unreadable = 1;
            if x != 0xff {
                return Ok(x);
            }
            if self.buf[self.i] != 0x00 {
                return Err(Error::MissingFF00);
            }
            self.i += 1;
            self.n_unreadable = 2;
            return Ok(0xff);
        }

        self.n_unreadable = 0;
        let x = self.read_byte()?;
        self.n_unreadable = 1;
        if x != 0xff {
            return Ok(x);
        }
        let y = self.read_byte()?;
        self.n_unreadable = 2;
        if y != 0x00 {
            return Err(Error::MissingFF00);
        }
        Ok(0xff)
    }

    /// Undo the most recent stuffed read, giving a byte of data back from
    /// the accumulator to the buffer. The Huffman look-up table needs 8
    /// bits, so decoding can overshoot by one byte, or two when the
    /// overshoot byte was an 0xFF 0x00 pair.
    pub(crate) fn unread_byte_stuffed_byte(&mut self) {
        self.i -= self.n_unreadable;
        self.n_unreadable = 0;
        if self.bits.n >= 8 {
            self.bits.a >>= 8;
            self.bits.n -= 8;
            self.bits.m >>= 8;
        }
    }

    /// Read exactly `p.len()` bytes, ignoring byte stuffing.
    pub(crate) fn read_full(&mut self, p: &mut [u8]) -> Result<()> {
        // Give back any overshot bytes first.
        if self.n_unreadable != 0 {
            if self.bits.n >= 8 {
                self.unread_byte_stuffed_byte();
            }
            self.n_unreadable = 0;
        }
        let mut off = 0;
        while off < p.len() {
            if self.i == self.j {
                self.fill()?;
            }
            let n = (p.len() - off).min(self.j - self.i);
            p[off..off + n].copy_from_slice(&self.buf[self.i..self.i + n]);
            self.i += n;
            off += n;
        }
        Ok(())
    }

    /// Skip exactly `n` bytes.
    pub(crate) fn ignore(&mut self, mut n: usize) -> Result<()> {
        if self.n_unreadable != 0 {
            if self.bits.n >= 8 {
                self.unread_byte_stuffed_byte();
            }
            self.n_unreadable = 0;
        }
        loop {
            let m = n.min(self.j - self.i);
            self.i += m;
            n -= m;
            if n == 0 {
                break;
            }
            self.fill()?;
        }
        Ok(())
    }

    /// Read stuffed bytes into the accumulator until it holds at least `n`
    /// bits. Callers check `bits.n < n` first to keep the hot path short.
    pub(crate) fn ensure_n_bits(&mut self, n: i32) -> Result<()> {
        loop {
            let c = match self.read_byte_stuffed_byte() {
                Ok(c) => c,
                Err(Error::UnexpectedEof) => return Err(Error::ShortHuffmanData),
                Err(e) => return Err(e),
            };
            self.bits.a = self.bits.a << 8 | u32::from(c);
            self.bits.n += 8;
            if self.bits.m == 0 {
                self.bits.m = 1 << 7;
            } else {
                self.bits.m <<= 8;
            }
            if self.bits.n >= n {
                return Ok(());
            }
        }
    }

    /// Decode a single bit.
    pub(crate) fn decode_bit(&mut self) -> Result<bool> {
        if self.bits.n == 0 {
            self.ensure_n_bits(1)?;
        }
        let ret = self.bits.a & self.bits.m != 0;
        self.bits.n -= 1;
        self.bits.m >>= 1;
        Ok(ret)
    }

    /// Decode `n` bits, MSB first.
    pub(crate) fn decode_bits(&mut self, n: i32) -> Result<u32> {
        if self.bits.n < n {
            self.ensure_n_bits(n)?;
        }
        let mut ret = self.bits.a >> (self.bits.n - n) as u32;
        ret &= (1 << n as u32) - 1;
        self.bits.n -= n;
        self.bits.m >>= n as u32;
        Ok(ret)
    }

    /// RECEIVE and EXTEND composed (ITU-T T.81 section F.2.2.1): read `t`
    /// magnitude bits and sign-extend them into a signed coefficient value.
    pub(crate) fn receive_extend(&mut self, t: u8) -> Result<i32> {
        if self.bits.n < i32::from(t) {
            self.ensure_n_bits(i32::from(t))?;
        }
        self.bits.n -= i32::from(t);
        self.bits.m >>= t;
        let s = 1i32 << t;
        let mut x = (self.bits.a >> self.bits.n as u32) as i32 & (s - 1);
        if x < s >> 1 {
            x += ((-1) << t) + 1;
        }
        Ok(x)
    }
}

/// Accumulating bit writer for JPEG output.
///
/// Marker bytes go in raw via [`BitWriter::put_byte`]; entropy-coded bits go
/// in via [`BitWriter::emit`], which stuffs every 0xFF with a following 0x00.
pub(crate) struct BitWriter {
    out: Vec<u8>,
    bits: u32,
    n_bits: u32,
}

impl BitWriter {
    pub(crate) fn new() -> Self {
        Self {
            out: Vec::new(),
            bits: 0,
            n_bits: 0,
        }
    }

    pub(crate) fn put_byte(&mut self, b: u8) {
        debug_assert_eq!(self.n_bits, 0, "marker byte inside entropy data");
        self.out.push(b);
    }

    pub(crate) fn put_bytes(&mut self, p: &[u8]) {
        debug_assert_eq!(self.n_bits, 0, "marker bytes inside entropy data");
        self.out.extend_from_slice(p);
    }

    /// Emit the least significant `n_bits` bits of `bits`, MSB first.
    /// Precondition: `bits < 1 << n_bits` and `n_bits <= 16`.
    pub(crate) fn emit(&mut self, mut bits: u32, mut n_bits: u32) {
        n_bits += self.n_bits;
        bits <<= 32 - n_bits;
        bits |= self.bits;
        while n_bits >= 8 {
            let b = (bits >> 24) as u8;
            self.out.push(b);
            if b == 0xff {
                self.out.push(0x00);
            }
            bits <<= 8;
            n_bits -= 8;
        }
        self.bits = bits;
        self.n_bits = n_bits;
    }

    /// Pad any partial byte with 1-bits to the next byte boundary.
    pub(crate) fn pad_to_byte(&mut self) {
        self.emit(0x7f, 7);
        self.bits = 0;
        self.n_bits = 0;
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_raw_and_stuffed_bytes() {
        let data: &[u8] = &[0x12, 0xff, 0x00, 0x34];
        let mut r = BitReader::new(data);
        assert_eq!(r.read_byte().unwrap(), 0x12);
        assert_eq!(r.read_byte_stuffed_byte().unwrap(), 0xff);
        assert_eq!(r.read_byte_stuffed_byte().unwrap(), 0x34);
        assert!(matches!(r.read_byte(), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn stuffed_read_rejects_marker() {
        let data: &[u8] = &[0xff, 0xd9];
        let mut r = BitReader::new(data);
        assert!(matches!(
            r.read_byte_stuffed_byte(),
            Err(Error::MissingFF00)
        ));
    }

    #[test]
    fn decode_bits_msb_first() {
        // 0xA5 = 1010_0101, 0x3C = 0011_1100
        let data: &[u8] = &[0xa5, 0x3c];
        let mut r = BitReader::new(data);
        assert_eq!(r.decode_bits(4).unwrap(), 0b1010);
        assert!(r.decode_bit().unwrap() == false);
        assert_eq!(r.decode_bits(5).unwrap(), 0b10100);
        assert_eq!(r.decode_bits(6).unwrap(), 0b111100);
    }

    #[test]
    fn receive_extend_signs() {
        // Category 3: bits 000..011 are negative (-7..-4), 100..111 positive.
        let data: &[u8] = &[0b0000_0000];
        let mut r = BitReader::new(data);
        assert_eq!(r.receive_extend(3).unwrap(), -7);
        let data: &[u8] = &[0b1110_0000];
        let mut r = BitReader::new(data);
        assert_eq!(r.receive_extend(3).unwrap(), 7);
        let data: &[u8] = &[0b1000_0000];
        let mut r = BitReader::new(data);
        assert_eq!(r.receive_extend(1).unwrap(), 1);
        let data: &[u8] = &[0b0000_0000];
        let mut r = BitReader::new(data);
        assert_eq!(r.receive_extend(1).unwrap(), -1);
    }

    #[test]
    fn unread_after_overshoot() {
        let data: &[u8] = &[0xab, 0xcd];
        let mut r = BitReader::new(data);
        assert_eq!(r.read_byte_stuffed_byte().unwrap(), 0xab);
        r.unread_byte_stuffed_byte();
        assert_eq!(r.read_byte().unwrap(), 0xab);
        assert_eq!(r.read_byte().unwrap(), 0xcd);
    }

    #[test]
    fn unread_shifts_accumulator() {
        let data: &[u8] = &[0x12, 0x34];
        let mut r = BitReader::new(data);
        r.ensure_n_bits(16).unwrap();
        assert_eq!(r.bits.n, 16);
        r.unread_byte_stuffed_byte();
        assert_eq!(r.bits.n, 8);
        assert_eq!(r.bits.a, 0x12);
        assert_eq!(r.bits.m, 1 << 7);
    }

    #[test]
    fn accumulator_invariant_random_reads() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0x4a50_4547);
        for _ in 0..64 {
            let mut data = vec![0u8; 512];
            rng.fill(&mut data[..]);
            // Stuff the stream so 0xFF never reads as a marker.
            let mut stuffed = Vec::with_capacity(data.len() * 2);
            for &b in &data {
                stuffed.push(b);
                if b == 0xff {
                    stuffed.push(0x00);
                }
            }
            let mut r = BitReader::new(&stuffed[..]);
            for _ in 0..256 {
                match rng.gen_range(0..3) {
                    0 => {
                        let _ = r.decode_bit().unwrap();
                    }
                    1 => {
                        let n = rng.gen_range(1..=16);
                        let _ = r.decode_bits(n).unwrap();
                    }
                    _ => {
                        let t = rng.gen_range(0..=11) as u8;
                        let _ = r.receive_extend(t).unwrap();
                    }
                }
                if r.bits.n > 0 {
                    assert_eq!(r.bits.m, 1 << (r.bits.n - 1) as u32);
                } else {
                    assert_eq!(r.bits.m, 0);
                }
            }
        }
    }

    #[test]
    fn writer_stuffs_and_pads() {
        let mut w = BitWriter::new();
        w.emit(0xff, 8);
        w.emit(0b101, 3);
        w.pad_to_byte();
        assert_eq!(w.into_bytes(), vec![0xff, 0x00, 0b1011_1111]);
    }

    #[test]
    fn writer_crosses_byte_boundaries() {
        let mut w = BitWriter::new();
        w.emit(0b1, 1);
        w.emit(0b0111_1111_1110, 12);
        w.pad_to_byte();
        // 1 0111111111 10 + 111 padding
        assert_eq!(w.into_bytes(), vec![0b1011_1111, 0b1111_0111]);
    }

    #[test]
    fn writer_keeps_markers_raw() {
        let mut w = BitWriter::new();
        w.put_bytes(&[0xff, 0xd8]);
        w.emit(0b0110, 4);
        w.pad_to_byte();
        w.put_bytes(&[0xff, 0xd9]);
        assert_eq!(w.into_bytes(), vec![0xff, 0xd8, 0b0110_1111, 0xff, 0xd9]);
    }
}
