//! Big-endian cursor over class file bytes and modified UTF-8 codec

use crate::error::{Error, Result};

/// Bounds-checked reader; every short read is a class format error
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::class_format(format!(
                "unexpected end of data at offset {} (needed {} bytes, {} left)",
                self.pos,
                len,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn u1(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u2(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u4(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a `u2` count followed by that many `u2` values
    pub fn u2_list(&mut self) -> Result<Vec<u16>> {
        let count = self.u2()? as usize;
        (0..count).map(|_| self.u2()).collect()
    }

    /// Fail unless the whole input was consumed
    pub fn expect_end(&self, what: &str) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::class_format(format!("{} trailing bytes after {}", self.remaining(), what)))
        }
    }
}

pub(crate) fn put_u1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub(crate) fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Decode JVM modified UTF-8 (JVMS 4.4.7)
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            if b == 0 {
                return Err(Error::class_format("NUL byte in modified UTF-8"));
            }
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1).ok_or_else(|| Error::class_format("truncated modified UTF-8"))?;
            units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let (b2, b3) = match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(b2), Some(b3)) => (*b2, *b3),
                _ => return Err(Error::class_format("truncated modified UTF-8")),
            };
            units.push((((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16);
            i += 3;
        } else {
            return Err(Error::class_format(format!("invalid modified UTF-8 lead byte 0x{:02x}", b)));
        }
    }
    String::from_utf16(&units).map_err(|_| Error::class_format("unpaired surrogate in symbolic name"))
}

/// Encode a string as JVM modified UTF-8
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_bounds() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u4().unwrap(), 0xCAFEBABE);
        assert_eq!(r.u1().unwrap(), 0);
        assert!(r.u2().is_err());
        assert!(r.expect_end("header").is_ok());
    }

    #[test]
    fn test_modified_utf8_special_cases() {
        // NUL is encoded as two bytes, supplementary chars as surrogate pairs
        let s = "a\u{0}\u{e9}\u{1F600}";
        let encoded = encode_modified_utf8(s);
        assert_eq!(&encoded[1..3], &[0xC0, 0x80]);
        assert_eq!(encoded.len(), 1 + 2 + 2 + 6);
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), s);
    }

    #[test]
    fn test_plain_ascii_is_unchanged() {
        assert_eq!(encode_modified_utf8("com/example/Foo"), b"com/example/Foo".to_vec());
    }
}
