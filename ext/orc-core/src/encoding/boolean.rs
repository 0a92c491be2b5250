//! Bit-packed booleans, eight per byte, most significant bit first.

use bytes::{BufMut, Bytes};

use super::varint::get_u8;
use crate::{OrcError, Result};

pub fn encode_booleans<B: BufMut>(values: &[bool], out: &mut B) {
    for chunk in values.chunks(8) {
        let mut byte = 0u8;
        for (idx, v) in chunk.iter().enumerate() {
            if *v {
                byte |= 0x80 >> idx;
            }
        }
        out.put_u8(byte);
    }
}

#[derive(Debug)]
pub struct BooleanDecoder {
    buf: Bytes,
    current: u8,
    bits_left: u8,
}

impl BooleanDecoder {
    pub fn new(buf: Bytes) -> Self {
        Self {
            buf,
            current: 0,
            bits_left: 0,
        }
    }

    pub fn next_value(&mut self) -> Result<bool> {
        if self.bits_left == 0 {
            self.current = get_u8(&mut self.buf)
                .map_err(|_| OrcError::malformed("boolean stream exhausted"))?;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok(self.current & (1 << self.bits_left) != 0)
    }

    pub fn decode(buf: Bytes, count: usize) -> Result<Vec<bool>> {
        let mut decoder = Self::new(buf);
        (0..count).map(|_| decoder.next_value()).collect()
    }
}
