//! Decode marshal data into [`Value`] trees.

use super::{code, PyStr, Value, FLAG_REF, LONG_DIGIT_BITS, LONG_DIGIT_MASK};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Nesting limit. A stats dump is at most four levels deep; recursion is
/// capped well below what a default thread stack can hold.
const MAX_DEPTH: usize = 64;

/// Decode exactly one marshal object from `data`.
///
/// Bytes left over after the object are reported as [`Error::TrailingData`].
pub fn decode(data: &[u8]) -> Result<Value> {
    let mut decoder = Decoder::new(data);
    let value = decoder.read_object()?;
    let remaining = decoder.remaining();
    if remaining != 0 {
        return Err(Error::TrailingData { remaining });
    }
    Ok(value)
}

/// Streaming marshal reader over an in-memory buffer.
pub struct Decoder<'a> {
    cursor: Cursor<&'a [u8]>,
    /// Objects flagged with `FLAG_REF`, in pre-order. `None` while the
    /// object is still being read.
    refs: Vec<Option<Value>>,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            refs: Vec::new(),
            depth: 0,
        }
    }

    /// Current byte offset into the input.
    pub fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.offset())
    }

    /// Read the next object.
    pub fn read_object(&mut self) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::Malformed(format!(
                "marshal data nested deeper than {} levels",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        let result = self.read_object_inner();
        self.depth -= 1;
        result
    }

    fn read_object_inner(&mut self) -> Result<Value> {
        let offset = self.offset();
        let byte = self.read_u8()?;
        let type_code = byte & !FLAG_REF;

        // Slots are reserved before children are read so indices follow
        // the writer's pre-order numbering.
        let slot = if byte & FLAG_REF != 0 {
            self.refs.push(None);
            Some(self.refs.len() - 1)
        } else {
            None
        };

        let value = match type_code {
            code::NONE => Value::None,
            code::FALSE => Value::Bool(false),
            code::TRUE => Value::Bool(true),
            code::INT => Value::Int(self.read_i32()? as i64),
            code::INT64 => Value::Int(self.read_i64()?),
            code::LONG => Value::Int(self.read_long()?),
            code::BINARY_FLOAT => Value::Float(self.read_f64()?),
            code::FLOAT => {
                let len = self.read_u8()? as usize;
                let text_offset = self.offset();
                let text = std::str::from_utf8(self.read_bytes(len)?)
                    .map_err(|_| Error::InvalidUtf8 { offset: text_offset })?;
                let parsed = text.trim().parse::<f64>().map_err(|_| {
                    Error::Malformed(format!(
                        "invalid float literal {:?} at offset {}",
                        text, text_offset
                    ))
                })?;
                Value::Float(parsed)
            }
            code::STRING => {
                let len = self.read_len()?;
                Value::Bytes(self.read_bytes(len)?.to_vec())
            }
            code::UNICODE | code::INTERNED | code::ASCII | code::ASCII_INTERNED => {
                let len = self.read_len()?;
                Value::Str(self.read_string(len)?)
            }
            code::SHORT_ASCII | code::SHORT_ASCII_INTERNED => {
                let len = self.read_u8()? as usize;
                Value::Str(self.read_string(len)?)
            }
            code::TUPLE => {
                let len = self.read_len()?;
                Value::Tuple(self.read_items(len)?)
            }
            code::SMALL_TUPLE => {
                let len = self.read_u8()? as usize;
                Value::Tuple(self.read_items(len)?)
            }
            code::LIST => {
                let len = self.read_len()?;
                Value::List(self.read_items(len)?)
            }
            code::DICT => Value::Dict(self.read_dict()?),
            code::REF => {
                let index = self.read_len()?;
                return match self.refs.get(index) {
                    Some(Some(value)) => Ok(value.clone()),
                    _ => Err(Error::InvalidReference { index, offset }),
                };
            }
            other => {
                return Err(Error::UnsupportedType {
                    code: other as char,
                    byte,
                    offset,
                })
            }
        };

        if let Some(slot) = slot {
            self.refs[slot] = Some(value.clone());
        }
        Ok(value)
    }

    fn read_items(&mut self, len: usize) -> Result<Vec<Value>> {
        // Every item takes at least one byte, which bounds the allocation.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.read_object()?);
        }
        Ok(items)
    }

    fn read_dict(&mut self) -> Result<Vec<(Value, Value)>> {
        let mut pairs = Vec::new();
        loop {
            let offset = self.offset();
            match self.cursor.get_ref().get(offset) {
                None => return Err(Error::UnexpectedEof { offset }),
                Some(&code::NULL) => {
                    self.cursor.set_position(offset as u64 + 1);
                    return Ok(pairs);
                }
                Some(_) => {
                    let key = self.read_object()?;
                    let value = self.read_object()?;
                    pairs.push((key, value));
                }
            }
        }
    }

    fn read_long(&mut self) -> Result<i64> {
        let offset = self.offset();
        let size = self.read_i32()?;
        let ndigits = size.unsigned_abs() as usize;

        let mut magnitude: u128 = 0;
        for i in 0..ndigits {
            let digit = self.read_u16()?;
            if digit > LONG_DIGIT_MASK {
                return Err(Error::Malformed(format!(
                    "long digit 0x{:04x} out of range at offset {}",
                    digit, offset
                )));
            }
            if digit == 0 {
                continue;
            }
            let shift = i as u32 * LONG_DIGIT_BITS;
            if shift >= 64 {
                return Err(Error::IntegerOverflow { offset });
            }
            magnitude |= (digit as u128) << shift;
        }

        let signed = if size < 0 {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        i64::try_from(signed).map_err(|_| Error::IntegerOverflow { offset })
    }

    fn read_string(&mut self, len: usize) -> Result<PyStr> {
        let offset = self.offset();
        let bytes = self.read_bytes(len)?;
        PyStr::from_bytes(bytes.to_vec()).ok_or(Error::InvalidUtf8 { offset })
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let offset = self.offset();
        if self.remaining() < len {
            return Err(Error::UnexpectedEof { offset });
        }
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((offset + len) as u64);
        Ok(&data[offset..offset + len])
    }

    /// A non-negative 32-bit length or index.
    fn read_len(&mut self) -> Result<usize> {
        let offset = self.offset();
        let n = self.read_i32()?;
        usize::try_from(n)
            .map_err(|_| Error::Malformed(format!("negative length {} at offset {}", n, offset)))
    }

    fn read_u8(&mut self) -> Result<u8> {
        let offset = self.offset();
        self.cursor
            .read_u8()
            .map_err(|_| Error::UnexpectedEof { offset })
    }

    fn read_u16(&mut self) -> Result<u16> {
        let offset = self.offset();
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::UnexpectedEof { offset })
    }

    fn read_i32(&mut self) -> Result<i32> {
        let offset = self.offset();
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| Error::UnexpectedEof { offset })
    }

    fn read_i64(&mut self) -> Result<i64> {
        let offset = self.offset();
        self.cursor
            .read_i64::<LittleEndian>()
            .map_err(|_| Error::UnexpectedEof { offset })
    }

    fn read_f64(&mut self) -> Result<f64> {
        let offset = self.offset();
        self.cursor
            .read_f64::<LittleEndian>()
            .map_err(|_| Error::UnexpectedEof { offset })
    }
}
