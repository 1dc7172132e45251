//! Bit strings and the two inbound wire encodings.
//!
//! Trackside content reaches the core as text. Two encodings exist and are
//! kept separate:
//!
//! - [`decode_base64`]: a 6-bit alphabet (`A–Z a–z 0–9 + /`), six bits per
//!   character, most significant bit first. The first `=` ends the scan.
//! - [`decode_binary_digits`]: one `'0'`/`'1'` character per bit, used by the
//!   `etcs::telegram` bus parameter.
//!
//! Fields are read back with a [`BitReader`] which reports truncation as
//! [`DecodeError::Truncated`] instead of reading past the end.
//!
//! # Example
//!
//! ```rust
//! use etcs_evc::bits::{decode_binary_digits, decode_base64};
//!
//! let bits = decode_binary_digits("1010").unwrap();
//! assert_eq!(bits.reader().read("nibble", 4).unwrap(), 0b1010);
//!
//! // "TWFu" is the 24 bits of the ASCII text "Man".
//! let man = decode_base64("TWFu", true).unwrap();
//! assert_eq!(man.len(), 24);
//! assert_eq!(man.reader().read("M", 8).unwrap(), u64::from(b'M'));
//! ```

use crate::error::DecodeError;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// An owned sequence of bits in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BitString {
    bits: Vec<bool>,
}

impl BitString {
    /// An empty bit string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// True when there are no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Bit at `index`, if present.
    #[inline]
    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).copied()
    }

    /// All bits as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    /// Append one bit.
    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// A reader positioned at the first bit.
    pub fn reader(&self) -> BitReader<'_> {
        BitReader::new(&self.bits)
    }

    /// Render as ASCII binary digits, the inverse of [`decode_binary_digits`].
    pub fn to_binary_digits(&self) -> String {
        self.bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }
}

impl From<Vec<bool>> for BitString {
    fn from(bits: Vec<bool>) -> Self {
        Self { bits }
    }
}

impl FromIterator<bool> for BitString {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

fn sextet(byte: u8) -> Option<u8> {
    match byte {
        b'A'..=b'Z' => Some(byte - b'A'),
        b'a'..=b'z' => Some(byte - b'a' + 26),
        b'0'..=b'9' => Some(byte - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decode the 6-bit alphabet into bits.
///
/// With `remove_padding` the result is cut down to the largest multiple of 8
/// bits, dropping the trailing fill bits of the last character.
pub fn decode_base64(input: &str, remove_padding: bool) -> Result<BitString, DecodeError> {
    let mut bits = Vec::with_capacity(input.len() * 6);
    for (index, ch) in input.char_indices() {
        if ch == '=' {
            break;
        }
        let value = u8::try_from(ch)
            .ok()
            .and_then(sextet)
            .ok_or(DecodeError::InvalidCharacter { ch, index })?;
        for shift in (0..6).rev() {
            bits.push((value >> shift) & 1 == 1);
        }
    }
    if remove_padding {
        let keep = bits.len() - bits.len() % 8;
        bits.truncate(keep);
    }
    Ok(BitString { bits })
}

/// Encode bits with the 6-bit alphabet.
///
/// The last group is filled with zero bits and the output is padded with `=`
/// to a multiple of four characters. Whole bytes survive a round trip through
/// [`decode_base64`] with padding removal.
pub fn encode_base64(bits: &BitString) -> String {
    let mut out = String::with_capacity(bits.len().div_ceil(6) + 3);
    for chunk in bits.as_slice().chunks(6) {
        let mut value = 0usize;
        for i in 0..6 {
            value <<= 1;
            if chunk.get(i).copied().unwrap_or(false) {
                value |= 1;
            }
        }
        out.push(char::from(BASE64_ALPHABET[value]));
    }
    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}

/// Decode ASCII binary digits, one character per bit.
pub fn decode_binary_digits(input: &str) -> Result<BitString, DecodeError> {
    input
        .char_indices()
        .map(|(index, ch)| match ch {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(DecodeError::InvalidCharacter { ch, index }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(BitString::from)
}

/// Sequential big-endian field reader over a bit slice.
#[derive(Clone, Debug)]
pub struct BitReader<'a> {
    bits: &'a [bool],
    position: usize,
}

impl<'a> BitReader<'a> {
    /// Reader over `bits`, starting at the first one.
    pub fn new(bits: &'a [bool]) -> Self {
        Self { bits, position: 0 }
    }

    /// Number of bits consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bits left.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.position
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<(), DecodeError> {
        if needed > self.remaining() {
            return Err(DecodeError::Truncated {
                field,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Read an unsigned field of `width` bits (at most 64).
    pub fn read(&mut self, field: &'static str, width: usize) -> Result<u64, DecodeError> {
        debug_assert!(width <= 64, "field {field} wider than 64 bits");
        self.ensure(field, width)?;
        let value = self.bits[self.position..self.position + width]
            .iter()
            .fold(0u64, |acc, &bit| (acc << 1) | u64::from(bit));
        self.position += width;
        Ok(value)
    }

    /// Read a one-bit flag.
    pub fn read_flag(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        Ok(self.read(field, 1)? == 1)
    }

    /// Split off the next `len` bits as their own reader.
    pub fn take(&mut self, field: &'static str, len: usize) -> Result<BitReader<'a>, DecodeError> {
        self.ensure(field, len)?;
        let sub = BitReader::new(&self.bits[self.position..self.position + len]);
        self.position += len;
        Ok(sub)
    }
}

/// Big-endian field writer, the inverse of [`BitReader`].
///
/// Used to build telegrams for the balise simulators feeding the bus.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    /// An empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` as a `width`-bit field, most significant first.
    ///
    /// `value` must fit the field; callers bound their values by type.
    pub fn write(&mut self, value: u64, width: usize) -> &mut Self {
        debug_assert!(
            width >= 64 || value >> width == 0,
            "value {value} does not fit a {width}-bit field"
        );
        for shift in (0..width).rev() {
            self.bits.push((value >> shift) & 1 == 1);
        }
        self
    }

    /// Append a one-bit flag.
    pub fn write_flag(&mut self, flag: bool) -> &mut Self {
        self.bits.push(flag);
        self
    }

    /// Append raw bits.
    pub fn extend(&mut self, bits: &[bool]) -> &mut Self {
        self.bits.extend_from_slice(bits);
        self
    }

    /// Bits written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// True when nothing was written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Finish writing.
    pub fn finish(self) -> BitString {
        BitString { bits: self.bits }
    }
}
