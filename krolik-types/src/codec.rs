//! Codecs for the AMQP 0-9-1 domain types
//!
//! Encoding writes into a [`BytesMut`]; decoding reads from a [`Buffer`].
//! Decoders fail with [`DecodeError::Underflow`] without consuming when the
//! buffer runs short; inside a fully-buffered frame payload that means the
//! peer sent malformed bytes.

use bytes::{BufMut, BytesMut};

use crate::{
    error::{BufferUnderflow, DecodeError, EncodeError},
    Buffer, FieldTable, FieldValue, LongString, ShortString,
};

/// Encodes a short string: one length byte then UTF-8 content
pub fn encode_short_string(dst: &mut BytesMut, s: &ShortString) -> Result<(), EncodeError> {
    if s.len() > u8::MAX as usize {
        return Err(EncodeError::ShortStringTooLong(s.len()));
    }
    dst.put_u8(s.len() as u8);
    dst.put_slice(s.as_bytes());
    Ok(())
}

/// Decodes a short string
pub fn decode_short_string(src: &mut Buffer) -> Result<ShortString, DecodeError> {
    let len = src.peek_u8(0)? as usize;
    if src.remaining() < 1 + len {
        return Err(BufferUnderflow.into());
    }
    src.get_u8()?;
    let s = std::str::from_utf8(src.consume(len)?)?;
    Ok(ShortString::from(s))
}

/// Encodes a long string: four length bytes then raw content
pub fn encode_long_string(dst: &mut BytesMut, s: &[u8]) {
    dst.put_u32(s.len() as u32);
    dst.put_slice(s);
}

/// Decodes a long string
pub fn decode_long_string(src: &mut Buffer) -> Result<LongString, DecodeError> {
    let len = src.peek_u32(0)? as usize;
    if src.remaining() < 4 + len {
        return Err(BufferUnderflow.into());
    }
    src.get_u32()?;
    Ok(src.consume(len)?.to_vec())
}

fn encode_field_value(dst: &mut BytesMut, value: &FieldValue) -> Result<(), EncodeError> {
    match value {
        FieldValue::Boolean(v) => {
            dst.put_u8(b't');
            dst.put_u8(*v as u8);
        }
        FieldValue::ShortShortInt(v) => {
            dst.put_u8(b'b');
            dst.put_i8(*v);
        }
        FieldValue::ShortShortUInt(v) => {
            dst.put_u8(b'B');
            dst.put_u8(*v);
        }
        FieldValue::ShortInt(v) => {
            dst.put_u8(b's');
            dst.put_i16(*v);
        }
        FieldValue::ShortUInt(v) => {
            dst.put_u8(b'u');
            dst.put_u16(*v);
        }
        FieldValue::LongInt(v) => {
            dst.put_u8(b'I');
            dst.put_i32(*v);
        }
        FieldValue::LongUInt(v) => {
            dst.put_u8(b'i');
            dst.put_u32(*v);
        }
        FieldValue::LongLongInt(v) => {
            dst.put_u8(b'l');
            dst.put_i64(*v);
        }
        FieldValue::Float(v) => {
            dst.put_u8(b'f');
            dst.put_f32(*v);
        }
        FieldValue::Double(v) => {
            dst.put_u8(b'd');
            dst.put_f64(*v);
        }
        FieldValue::Decimal { scale, value } => {
            dst.put_u8(b'D');
            dst.put_u8(*scale);
            dst.put_u32(*value);
        }
        FieldValue::LongString(v) => {
            dst.put_u8(b'S');
            encode_long_string(dst, v);
        }
        FieldValue::Array(values) => {
            dst.put_u8(b'A');
            write_length_prefixed(dst, |dst| {
                for v in values {
                    encode_field_value(dst, v)?;
                }
                Ok(())
            })?;
        }
        FieldValue::Timestamp(v) => {
            dst.put_u8(b'T');
            dst.put_u64(*v);
        }
        FieldValue::Table(table) => {
            dst.put_u8(b'F');
            encode_field_table(dst, table)?;
        }
        FieldValue::Void => dst.put_u8(b'V'),
        FieldValue::ByteArray(v) => {
            dst.put_u8(b'x');
            dst.put_u32(v.len() as u32);
            dst.put_slice(v);
        }
    }
    Ok(())
}

fn decode_field_value(src: &mut Buffer) -> Result<FieldValue, DecodeError> {
    let tag = src.get_u8()?;
    let value = match tag {
        b't' => FieldValue::Boolean(src.get_u8()? != 0),
        b'b' => FieldValue::ShortShortInt(src.get_i8()?),
        b'B' => FieldValue::ShortShortUInt(src.get_u8()?),
        b's' => FieldValue::ShortInt(src.get_i16()?),
        b'u' => FieldValue::ShortUInt(src.get_u16()?),
        b'I' => FieldValue::LongInt(src.get_i32()?),
        b'i' => FieldValue::LongUInt(src.get_u32()?),
        b'l' => FieldValue::LongLongInt(src.get_i64()?),
        b'f' => FieldValue::Float(src.get_f32()?),
        b'd' => FieldValue::Double(src.get_f64()?),
        b'D' => FieldValue::Decimal {
            scale: src.get_u8()?,
            value: src.get_u32()?,
        },
        b'S' => FieldValue::LongString(decode_long_string(src)?),
        b'A' => {
            let mut values = Vec::new();
            decode_length_prefixed(src, |src| {
                values.push(decode_field_value(src)?);
                Ok(())
            })?;
            FieldValue::Array(values)
        }
        b'T' => FieldValue::Timestamp(src.get_u64()?),
        b'F' => FieldValue::Table(decode_field_table(src)?),
        b'V' => FieldValue::Void,
        b'x' => {
            let len = src.peek_u32(0)? as usize;
            if src.remaining() < 4 + len {
                return Err(BufferUnderflow.into());
            }
            src.get_u32()?;
            FieldValue::ByteArray(src.consume(len)?.to_vec())
        }
        other => return Err(DecodeError::UnknownFieldKind(other)),
    };
    Ok(value)
}

/// Encodes a field table: four length bytes then the entries
pub fn encode_field_table(dst: &mut BytesMut, table: &FieldTable) -> Result<(), EncodeError> {
    write_length_prefixed(dst, |dst| {
        for (key, value) in table.iter() {
            encode_short_string(dst, key)?;
            encode_field_value(dst, value)?;
        }
        Ok(())
    })
}

/// Decodes a field table
pub fn decode_field_table(src: &mut Buffer) -> Result<FieldTable, DecodeError> {
    let mut entries = Vec::new();
    decode_length_prefixed(src, |src| {
        let key = decode_short_string(src)?;
        let value = decode_field_value(src)?;
        entries.push((key, value));
        Ok(())
    })?;
    Ok(entries.into_iter().collect())
}

/// Writes a u32 byte-length placeholder, runs `f`, then patches the length in
fn write_length_prefixed(
    dst: &mut BytesMut,
    f: impl FnOnce(&mut BytesMut) -> Result<(), EncodeError>,
) -> Result<(), EncodeError> {
    let at = dst.len();
    dst.put_u32(0);
    f(dst)?;
    let len = (dst.len() - at - 4) as u32;
    dst[at..at + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Reads a u32 byte length and runs `f` until that many bytes are consumed
fn decode_length_prefixed(
    src: &mut Buffer,
    mut f: impl FnMut(&mut Buffer) -> Result<(), DecodeError>,
) -> Result<(), DecodeError> {
    let len = src.peek_u32(0)? as usize;
    if src.remaining() < 4 + len {
        return Err(BufferUnderflow.into());
    }
    src.get_u32()?;
    let stop_at = src.remaining() - len;
    while src.remaining() > stop_at {
        f(src)?;
    }
    if src.remaining() < stop_at {
        // the last entry ran past the declared length
        return Err(BufferUnderflow.into());
    }
    Ok(())
}
