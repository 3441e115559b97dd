//! Encode [`Value`] trees as marshal version 4.

use super::{code, PyStr, Value, FLAG_REF, LONG_DIGIT_BITS, LONG_DIGIT_MASK};
use crate::{Error, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::HashMap;
use std::io::Write;

/// Encode `value` into a new buffer.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_to(&mut buf, value)?;
    Ok(buf)
}

/// Encode `value` into `writer`.
pub fn encode_to<W: Write>(writer: W, value: &Value) -> Result<()> {
    Encoder::new(writer).write_value(value)
}

/// Marshal writer.
///
/// Each distinct string is written once with `FLAG_REF` and then referred
/// to by index, the way CPython shares interned names.
pub struct Encoder<W: Write> {
    writer: W,
    strings: HashMap<PyStr, u32>,
    next_ref: u32,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            strings: HashMap::new(),
            next_ref: 0,
        }
    }

    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::None => self.writer.write_u8(code::NONE)?,
            Value::Bool(true) => self.writer.write_u8(code::TRUE)?,
            Value::Bool(false) => self.writer.write_u8(code::FALSE)?,
            Value::Int(n) => self.write_int(*n)?,
            Value::Float(f) => {
                self.writer.write_u8(code::BINARY_FLOAT)?;
                self.writer.write_f64::<LittleEndian>(*f)?;
            }
            Value::Str(s) => self.write_str(s)?,
            Value::Bytes(bytes) => {
                self.writer.write_u8(code::STRING)?;
                self.write_len(bytes.len())?;
                self.writer.write_all(bytes)?;
            }
            Value::Tuple(items) => {
                if items.len() < 256 {
                    self.writer.write_u8(code::SMALL_TUPLE)?;
                    self.writer.write_u8(items.len() as u8)?;
                } else {
                    self.writer.write_u8(code::TUPLE)?;
                    self.write_len(items.len())?;
                }
                for item in items {
                    self.write_value(item)?;
                }
            }
            Value::List(items) => {
                self.writer.write_u8(code::LIST)?;
                self.write_len(items.len())?;
                for item in items {
                    self.write_value(item)?;
                }
            }
            Value::Dict(pairs) => {
                self.writer.write_u8(code::DICT)?;
                for (key, value) in pairs {
                    self.write_value(key)?;
                    self.write_value(value)?;
                }
                self.writer.write_u8(code::NULL)?;
            }
        }
        Ok(())
    }

    fn write_int(&mut self, n: i64) -> Result<()> {
        if let Ok(small) = i32::try_from(n) {
            self.writer.write_u8(code::INT)?;
            self.writer.write_i32::<LittleEndian>(small)?;
            return Ok(());
        }

        let mut magnitude = n.unsigned_abs();
        let mut digits = Vec::new();
        while magnitude != 0 {
            digits.push((magnitude & LONG_DIGIT_MASK as u64) as u16);
            magnitude >>= LONG_DIGIT_BITS;
        }
        let size = digits.len() as i32;

        self.writer.write_u8(code::LONG)?;
        self.writer
            .write_i32::<LittleEndian>(if n < 0 { -size } else { size })?;
        for digit in digits {
            self.writer.write_u16::<LittleEndian>(digit)?;
        }
        Ok(())
    }

    fn write_str(&mut self, s: &PyStr) -> Result<()> {
        if let Some(&index) = self.strings.get(s) {
            self.writer.write_u8(code::REF)?;
            self.writer.write_u32::<LittleEndian>(index)?;
            return Ok(());
        }
        self.strings.insert(s.clone(), self.next_ref);
        self.next_ref += 1;

        if s.is_ascii() && s.len() < 256 {
            self.writer.write_u8(code::SHORT_ASCII | FLAG_REF)?;
            self.writer.write_u8(s.len() as u8)?;
        } else if s.is_ascii() {
            self.writer.write_u8(code::ASCII | FLAG_REF)?;
            self.write_len(s.len())?;
        } else {
            self.writer.write_u8(code::UNICODE | FLAG_REF)?;
            self.write_len(s.len())?;
        }
        self.writer.write_all(s.as_bytes())?;
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len)
            .map_err(|_| Error::Malformed(format!("length {} too large for marshal", len)))?;
        self.writer.write_i32::<LittleEndian>(len)?;
        Ok(())
    }
}
