//! Variable-length integers and the small read/write helpers shared by the
//! stream, stripe footer and file footer codecs.

use bytes::{Buf, BufMut, Bytes};

use crate::{OrcError, Result};

const MAX_VARINT_LEN: usize = 10;

/// Write `v` as an unsigned LEB128 varint
pub fn put_varint<B: BufMut>(buf: &mut B, mut v: u64) {
    while v >= 0x80 {
        buf.put_u8((v as u8) | 0x80);
        v >>= 7;
    }
    buf.put_u8(v as u8);
}

/// Read an unsigned LEB128 varint
pub fn get_varint<B: Buf>(buf: &mut B) -> Result<u64> {
    let mut result = 0u64;
    for idx in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(OrcError::malformed("varint runs past the end of its buffer"));
        }
        let byte = buf.get_u8();
        if idx == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(OrcError::malformed("varint overflows 64 bits"));
        }
        result |= ((byte & 0x7f) as u64) << (7 * idx);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(OrcError::malformed("varint longer than 10 bytes"))
}

pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub fn put_signed_varint<B: BufMut>(buf: &mut B, v: i64) {
    put_varint(buf, zigzag_encode(v));
}

pub fn get_signed_varint<B: Buf>(buf: &mut B) -> Result<i64> {
    get_varint(buf).map(zigzag_decode)
}

/// Read a varint that must fit in `usize`
pub fn get_len<B: Buf>(buf: &mut B) -> Result<usize> {
    let v = get_varint(buf)?;
    usize::try_from(v).map_err(|_| OrcError::malformed(format!("length {} too large", v)))
}

/// Write a length-prefixed byte string
pub fn put_len_prefixed<B: BufMut>(buf: &mut B, bytes: &[u8]) {
    put_varint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

/// Read a length-prefixed byte string without copying
pub fn get_len_prefixed(buf: &mut Bytes) -> Result<Bytes> {
    let len = get_len(buf)?;
    take_bytes(buf, len)
}

/// Read a length-prefixed UTF-8 string
pub fn get_string(buf: &mut Bytes) -> Result<String> {
    let bytes = get_len_prefixed(buf)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| OrcError::malformed(format!("invalid UTF-8 string: {}", e)))
}

/// Split `len` bytes off the front of `buf`
pub fn take_bytes(buf: &mut Bytes, len: usize) -> Result<Bytes> {
    if buf.remaining() < len {
        return Err(OrcError::malformed(format!(
            "needed {} bytes but only {} remain",
            len,
            buf.remaining()
        )));
    }
    Ok(buf.split_to(len))
}

pub fn get_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    if !buf.has_remaining() {
        return Err(OrcError::malformed("unexpected end of buffer"));
    }
    Ok(buf.get_u8())
}

pub fn get_u32_le<B: Buf>(buf: &mut B) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(OrcError::malformed("unexpected end of buffer"));
    }
    Ok(buf.get_u32_le())
}

pub fn get_f64_le<B: Buf>(buf: &mut B) -> Result<f64> {
    if buf.remaining() < 8 {
        return Err(OrcError::malformed("unexpected end of buffer"));
    }
    Ok(buf.get_f64_le())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            put_varint(&mut buf, v);
            assert_eq!(get_varint(&mut buf.as_slice()).unwrap(), v);
        }

        let mut buf = Vec::new();
        put_varint(&mut buf, 300);
        assert_eq!(buf, vec![0xac, 0x02]);
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        for v in [i64::MIN, -5, 0, 5, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }

    #[test]
    fn test_truncated_varint() {
        let data = [0x80u8, 0x80];
        assert!(get_varint(&mut &data[..]).is_err());

        let overlong = [0xffu8; 11];
        assert!(get_varint(&mut &overlong[..]).is_err());
    }

    #[test]
    fn test_len_prefixed() {
        let mut buf = Vec::new();
        put_len_prefixed(&mut buf, b"hello");
        let mut bytes = Bytes::from(buf);
        assert_eq!(get_string(&mut bytes).unwrap(), "hello");
        assert!(bytes.is_empty());

        let mut short = Bytes::from_static(&[5, b'h']);
        assert!(get_len_prefixed(&mut short).is_err());
    }
}
