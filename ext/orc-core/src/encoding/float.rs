//! Fixed-width little-endian floating point values.

use bytes::{Buf, BufMut, Bytes};

use crate::{OrcError, Result};

pub fn encode_f32<B: BufMut>(values: &[f32], out: &mut B) {
    for v in values {
        out.put_f32_le(*v);
    }
}

pub fn encode_f64<B: BufMut>(values: &[f64], out: &mut B) {
    for v in values {
        out.put_f64_le(*v);
    }
}

#[derive(Debug)]
pub struct FloatDecoder {
    buf: Bytes,
}

impl FloatDecoder {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn next_f32(&mut self) -> Result<f32> {
        if self.buf.remaining() < 4 {
            return Err(OrcError::malformed("float stream exhausted"));
        }
        Ok(self.buf.get_f32_le())
    }

    pub fn next_f64(&mut self) -> Result<f64> {
        if self.buf.remaining() < 8 {
            return Err(OrcError::malformed("double stream exhausted"));
        }
        Ok(self.buf.get_f64_le())
    }
}
