//! Delta + run-length integer encoding.
//!
//! The stream is a sequence of groups, each introduced by a control byte:
//!
//! ```plain
//! run:      | control 0..=127 (len - 3) | delta (zigzag varint) | base (zigzag varint) |
//! literals: | control -1..=-128 (-len)  | value (zigzag varint) | ... |
//! ```
//!
//! A run expands to `base, base + delta, base + 2 * delta, ...` using
//! wrapping arithmetic, so any `i64` sequence round-trips exactly.

use bytes::{BufMut, Bytes};

use super::varint::{get_signed_varint, get_u8, put_signed_varint};
use crate::{OrcError, Result};

const MIN_REPEAT: usize = 3;
const MAX_RUN: usize = 127 + MIN_REPEAT;
const MAX_LITERALS: usize = 128;

/// Encode `values` into `out`
pub fn encode_integers<B: BufMut>(values: &[i64], out: &mut B) {
    let mut literals_start = 0;
    let mut idx = 0;

    while idx < values.len() {
        let run = run_length_at(values, idx);
        if run >= MIN_REPEAT {
            write_literals(&values[literals_start..idx], out);
            let delta = values[idx + 1].wrapping_sub(values[idx]);
            out.put_u8((run - MIN_REPEAT) as u8);
            put_signed_varint(out, delta);
            put_signed_varint(out, values[idx]);
            idx += run;
            literals_start = idx;
        } else {
            idx += 1;
        }
    }

    write_literals(&values[literals_start..], out);
}

/// Length of the constant-delta run starting at `start`, capped at `MAX_RUN`
fn run_length_at(values: &[i64], start: usize) -> usize {
    if start + 1 >= values.len() {
        return values.len() - start;
    }
    let delta = values[start + 1].wrapping_sub(values[start]);
    let mut len = 2;
    while start + len < values.len()
        && len < MAX_RUN
        && values[start + len].wrapping_sub(values[start + len - 1]) == delta
    {
        len += 1;
    }
    len
}

fn write_literals<B: BufMut>(values: &[i64], out: &mut B) {
    for chunk in values.chunks(MAX_LITERALS) {
        out.put_u8(-(chunk.len() as i32) as i8 as u8);
        for v in chunk {
            put_signed_varint(out, *v);
        }
    }
}

#[derive(Debug)]
enum Group {
    Empty,
    Run {
        next: i64,
        delta: i64,
        remaining: usize,
    },
    Literals {
        remaining: usize,
    },
}

/// Streaming decoder over an encoded integer stream
#[derive(Debug)]
pub struct IntegerDecoder {
    buf: Bytes,
    group: Group,
}

impl IntegerDecoder {
    pub fn new(buf: Bytes) -> Self {
        Self {
            buf,
            group: Group::Empty,
        }
    }

    /// Decode the next value
    pub fn next_value(&mut self) -> Result<i64> {
        loop {
            match &mut self.group {
                Group::Run {
                    next,
                    delta,
                    remaining,
                } if *remaining > 0 => {
                    let v = *next;
                    *next = next.wrapping_add(*delta);
                    *remaining -= 1;
                    return Ok(v);
                }
                Group::Literals { remaining } if *remaining > 0 => {
                    *remaining -= 1;
                    return get_signed_varint(&mut self.buf);
                }
                _ => self.read_header()?,
            }
        }
    }

    /// Decode exactly `count` values
    pub fn decode(buf: Bytes, count: usize) -> Result<Vec<i64>> {
        let mut decoder = Self::new(buf);
        (0..count).map(|_| decoder.next_value()).collect()
    }

    /// Decode the next value as a non-negative length
    pub fn next_len(&mut self) -> Result<usize> {
        let v = self.next_value()?;
        usize::try_from(v).map_err(|_| OrcError::malformed(format!("negative length {}", v)))
    }

    fn read_header(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Err(OrcError::malformed("integer stream exhausted"));
        }
        let control = get_u8(&mut self.buf)? as i8;
        self.group = if control >= 0 {
            let delta = get_signed_varint(&mut self.buf)?;
            let base = get_signed_varint(&mut self.buf)?;
            Group::Run {
                next: base,
                delta,
                remaining: control as usize + MIN_REPEAT,
            }
        } else {
            Group::Literals {
                remaining: -(control as i32) as usize,
            }
        };
        Ok(())
    }
}
