//! aPLib, the LZ77 variant MagPack entries are compressed with.
//!
//! The stream interleaves tag bytes (read MSB first, lazily whenever the next bit is needed) with literal
//! and offset bytes. The first byte is always a literal; the stream ends with a short match of offset 0.

use crate::ParserError;

const MAX_WINDOW: usize = 0xFFFF;
const HASH_BITS: u32 = 15;
const MAX_CHAIN: usize = 64;
const NO_POSITION: usize = usize::MAX;

struct BitReader<'a> {
    src: &'a [u8],
    pos: usize,
    tag: u8,
    bit_count: u32,
}

impl BitReader<'_> {
    fn byte(&mut self) -> Result<u8, ParserError> {
        let value = *self.src.get(self.pos).ok_or(ParserError::CorruptStream)?;
        self.pos += 1;
        Ok(value)
    }

    fn bit(&mut self) -> Result<bool, ParserError> {
        if self.bit_count == 0 {
            self.tag = self.byte()?;
            self.bit_count = 8;
        }
        self.bit_count -= 1;
        let bit = self.tag & 0x80 != 0;
        self.tag <<= 1;
        Ok(bit)
    }

    fn gamma(&mut self) -> Result<usize, ParserError> {
        let mut result = 1usize;
        loop {
            if result > (usize::MAX >> 2) {
                return Err(ParserError::CorruptStream);
            }
            result = (result << 1) + self.bit()? as usize;
            if !self.bit()? {
                return Ok(result);
            }
        }
    }
}

fn copy_match(dst: &mut Vec<u8>, offset: usize, len: usize, limit: usize) -> Result<(), ParserError> {
    if offset == 0 || offset > dst.len() {
        return Err(ParserError::CorruptStream);
    }
    if dst.len() + len > limit {
        return Err(ParserError::SizeMismatch {
            expected: limit,
            actual: dst.len() + len,
        });
    }
    for _ in 0..len {
        let value = dst[dst.len() - offset];
        dst.push(value);
    }
    Ok(())
}

fn push_literal(dst: &mut Vec<u8>, value: u8, limit: usize) -> Result<(), ParserError> {
    if dst.len() >= limit {
        return Err(ParserError::SizeMismatch {
            expected: limit,
            actual: dst.len() + 1,
        });
    }
    dst.push(value);
    Ok(())
}

/// Decompresses `src` into `dst` (cleared first, capacity retained) and verifies the result is exactly
/// `expected_len` bytes long.
pub fn depack_into(src: &[u8], dst: &mut Vec<u8>, expected_len: usize) -> Result<(), ParserError> {
    dst.clear();
    if src.is_empty() {
        return match expected_len {
            0 => Ok(()),
            _ => Err(ParserError::SizeMismatch {
                expected: expected_len,
                actual: 0,
            }),
        };
    }

    dst.reserve(expected_len);
    let mut rdr = BitReader {
        src,
        pos: 0,
        tag: 0,
        bit_count: 0,
    };
    let mut last_offset: Option<usize> = None;
    let mut last_was_match = false;

    let first = rdr.byte()?;
    push_literal(dst, first, expected_len)?;

    loop {
        if !rdr.bit()? {
            let value = rdr.byte()?;
            push_literal(dst, value, expected_len)?;
            last_was_match = false;
            continue;
        }

        if !rdr.bit()? {
            let high = rdr.gamma()?;
            if !last_was_match && high == 2 {
                let offset = last_offset.ok_or(ParserError::CorruptStream)?;
                let len = rdr.gamma()?;
                copy_match(dst, offset, len, expected_len)?;
            } else {
                let high = high
                    .checked_sub(if last_was_match { 2 } else { 3 })
                    .ok_or(ParserError::CorruptStream)?;
                let offset = (high << 8) + rdr.byte()? as usize;
                let mut len = rdr.gamma()?;
                if offset >= 32000 {
                    len += 1;
                }
                if offset >= 1280 {
                    len += 1;
                }
                if offset < 128 {
                    len += 2;
                }
                copy_match(dst, offset, len, expected_len)?;
                last_offset = Some(offset);
            }
            last_was_match = true;
            continue;
        }

        if !rdr.bit()? {
            let value = rdr.byte()? as usize;
            let len = 2 + (value & 1);
            let offset = value >> 1;
            if offset == 0 {
                break;
            }
            copy_match(dst, offset, len, expected_len)?;
            last_offset = Some(offset);
            last_was_match = true;
        } else {
            let mut offset = 0usize;
            for _ in 0..4 {
                offset = (offset << 1) + rdr.bit()? as usize;
            }
            if offset == 0 {
                push_literal(dst, 0, expected_len)?;
            } else {
                copy_match(dst, offset, 1, expected_len)?;
            }
            last_was_match = false;
        }
    }

    if dst.len() != expected_len {
        return Err(ParserError::SizeMismatch {
            expected: expected_len,
            actual: dst.len(),
        });
    }
    Ok(())
}

pub fn depack(src: &[u8], expected_len: usize) -> Result<Vec<u8>, ParserError> {
    let mut dst = Vec::with_capacity(expected_len);
    depack_into(src, &mut dst, expected_len)?;
    Ok(dst)
}

#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    tag_pos: usize,
    bits_left: u32,
}

impl BitWriter {
    fn bit(&mut self, bit: bool) {
        if self.bits_left == 0 {
            self.tag_pos = self.out.len();
            self.out.push(0);
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        if bit {
            self.out[self.tag_pos] |= 1 << self.bits_left;
        }
    }

    fn byte(&mut self, value: u8) {
        self.out.push(value);
    }

    fn gamma(&mut self, value: usize) {
        debug_assert!(value >= 2);
        let bits = usize::BITS - value.leading_zeros();
        for i in (0..bits - 1).rev() {
            self.bit((value >> i) & 1 != 0);
            self.bit(i > 0);
        }
    }
}

struct MatchFinder<'a> {
    src: &'a [u8],
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl<'a> MatchFinder<'a> {
    fn new(src: &'a [u8]) -> Self {
        MatchFinder {
            src,
            head: vec![NO_POSITION; 1 << HASH_BITS],
            prev: vec![NO_POSITION; src.len()],
        }
    }

    fn hash(&self, pos: usize) -> Option<usize> {
        let seed = self.src.get(pos..pos + 3)?;
        let value = (seed[0] as u32) << 16 | (seed[1] as u32) << 8 | seed[2] as u32;
        Some((value.wrapping_mul(2654435761) >> (32 - HASH_BITS)) as usize)
    }

    fn insert(&mut self, pos: usize) {
        if let Some(hash) = self.hash(pos) {
            self.prev[pos] = self.head[hash];
            self.head[hash] = pos;
        }
    }

    fn match_len(&self, pos: usize, offset: usize) -> usize {
        let mut len = 0;
        while pos + len < self.src.len() && self.src[pos + len] == self.src[pos + len - offset] {
            len += 1;
        }
        len
    }

    /// Longest match for `pos`, nearest first on ties.
    fn longest(&self, pos: usize) -> Option<(usize, usize)> {
        let mut candidate = self.head[self.hash(pos)?];
        let mut best: Option<(usize, usize)> = None;
        let mut steps = 0;
        while candidate != NO_POSITION && pos - candidate <= MAX_WINDOW && steps < MAX_CHAIN {
            let offset = pos - candidate;
            let len = self.match_len(pos, offset);
            if best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((offset, len));
            }
            candidate = self.prev[candidate];
            steps += 1;
        }
        best
    }
}

fn min_match_len(offset: usize) -> usize {
    match offset {
        0..128 => 4,
        128..1280 => 2,
        1280..32000 => 3,
        _ => 4,
    }
}

/// Greedy aPLib compressor. Output is always accepted by [`depack`].
pub fn pack(src: &[u8]) -> Vec<u8> {
    let mut wtr = BitWriter::default();
    let Some(&first) = src.first() else {
        return Vec::new();
    };
    wtr.byte(first);

    let mut finder = MatchFinder::new(src);
    finder.insert(0);
    let mut pos = 1;
    let mut last_offset: Option<usize> = None;
    let mut last_was_match = false;

    while pos < src.len() {
        let repeat = last_offset
            .filter(|&offset| !last_was_match && offset <= pos)
            .map(|offset| (offset, finder.match_len(pos, offset)))
            .filter(|&(_, len)| len >= 2);
        let found = finder.longest(pos);

        let advance = match (repeat, found) {
            (Some((_, rep_len)), found) if found.is_none_or(|(_, len)| rep_len >= len) => {
                wtr.bit(true);
                wtr.bit(false);
                wtr.gamma(2);
                wtr.gamma(rep_len);
                last_was_match = true;
                rep_len
            }
            (_, Some((offset, len))) if (2..=3).contains(&len) && offset < 128 => {
                wtr.bit(true);
                wtr.bit(true);
                wtr.bit(false);
                wtr.byte(((offset << 1) | (len - 2)) as u8);
                last_offset = Some(offset);
                last_was_match = true;
                len
            }
            (_, Some((offset, len))) if len >= min_match_len(offset) => {
                let mut encoded = len;
                if offset >= 32000 {
                    encoded -= 1;
                }
                if offset >= 1280 {
                    encoded -= 1;
                }
                if offset < 128 {
                    encoded -= 2;
                }
                wtr.bit(true);
                wtr.bit(false);
                wtr.gamma((offset >> 8) + if last_was_match { 2 } else { 3 });
                wtr.byte((offset & 0xFF) as u8);
                wtr.gamma(encoded);
                last_offset = Some(offset);
                last_was_match = true;
                len
            }
            _ => {
                let value = src[pos];
                let near = (1..=15.min(pos)).find(|&offset| src[pos - offset] == value);
                match (value, near) {
                    (0, _) | (_, Some(_)) => {
                        let offset = if value == 0 { 0 } else { near.unwrap_or(0) };
                        wtr.bit(true);
                        wtr.bit(true);
                        wtr.bit(true);
                        for i in (0..4).rev() {
                            wtr.bit((offset >> i) & 1 != 0);
                        }
                    }
                    _ => {
                        wtr.bit(false);
                        wtr.byte(value);
                    }
                }
                last_was_match = false;
                1
            }
        };

        for p in pos..pos + advance {
            finder.insert(p);
        }
        pos += advance;
    }

    wtr.bit(true);
    wtr.bit(true);
    wtr.bit(false);
    wtr.byte(0);
    wtr.out
}
