//! The generic protocol method value
//!
//! A [`Method`] pairs a (class id, method id) with its decoded argument
//! list. The wire layout comes entirely from the [`schema`](crate::schema)
//! table; consecutive `Bit` arguments share octets in both directions.

use bytes::{BufMut, BytesMut};

use crate::{
    codec,
    error::{DecodeError, EncodeError, ValueError},
    schema::{self, FieldKind},
    Buffer, FieldTable, LongString, ShortString,
};

/// One decoded method argument
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// u8
    Octet(u8),
    /// u16
    Short(u16),
    /// u32
    Long(u32),
    /// u64
    LongLong(u64),
    /// Packed bit
    Bit(bool),
    /// Short string
    ShortStr(ShortString),
    /// Long string
    LongStr(LongString),
    /// Field table
    Table(FieldTable),
    /// POSIX seconds
    Timestamp(u64),
}

impl Field {
    fn kind_name(&self) -> &'static str {
        match self {
            Field::Octet(_) => "octet",
            Field::Short(_) => "short",
            Field::Long(_) => "long",
            Field::LongLong(_) => "long-long",
            Field::Bit(_) => "bit",
            Field::ShortStr(_) => "short-string",
            Field::LongStr(_) => "long-string",
            Field::Table(_) => "table",
            Field::Timestamp(_) => "timestamp",
        }
    }

    fn matches(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (Field::Octet(_), FieldKind::Octet)
                | (Field::Short(_), FieldKind::Short)
                | (Field::Long(_), FieldKind::Long)
                | (Field::LongLong(_), FieldKind::LongLong)
                | (Field::Bit(_), FieldKind::Bit)
                | (Field::ShortStr(_), FieldKind::ShortStr)
                | (Field::LongStr(_), FieldKind::LongStr)
                | (Field::Table(_), FieldKind::Table)
                | (Field::Timestamp(_), FieldKind::Timestamp)
        )
    }
}

/// A protocol method: class id, method id and arguments in wire order
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    /// Class id
    pub class_id: u16,
    /// Method id within the class
    pub method_id: u16,
    /// Arguments, one [`Field`] per schema entry
    pub fields: Vec<Field>,
}

impl Method {
    /// Creates a method value; the arguments must follow the schema layout
    pub fn new(class_id: u16, method_id: u16, fields: Vec<Field>) -> Self {
        Self {
            class_id,
            method_id,
            fields,
        }
    }

    /// The dotted method name, or `"unknown"` off-schema
    pub fn name(&self) -> &'static str {
        schema::lookup(self.class_id, self.method_id)
            .map(|s| s.name)
            .unwrap_or("unknown")
    }

    /// Whether this method is the given (class id, method id) pair
    pub fn is(&self, class_id: u16, method_id: u16) -> bool {
        self.class_id == class_id && self.method_id == method_id
    }

    /// Encodes class id, method id and the schema-driven argument payload
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        let spec = schema::lookup(self.class_id, self.method_id).ok_or(
            EncodeError::UnknownMethod {
                class_id: self.class_id,
                method_id: self.method_id,
            },
        )?;
        if spec.fields.len() != self.fields.len() {
            return Err(EncodeError::SchemaMismatch(spec.name));
        }

        dst.put_u16(self.class_id);
        dst.put_u16(self.method_id);

        // index of the octet currently accumulating bits, and the next bit
        let mut bit_at: Option<(usize, u8)> = None;
        for (field, kind) in self.fields.iter().zip(spec.fields) {
            if !field.matches(*kind) {
                return Err(EncodeError::SchemaMismatch(spec.name));
            }
            if let Field::Bit(value) = field {
                let (at, shift) = match bit_at {
                    Some((at, shift)) if shift < 8 => (at, shift),
                    _ => {
                        dst.put_u8(0);
                        (dst.len() - 1, 0)
                    }
                };
                if *value {
                    dst[at] |= 1 << shift;
                }
                bit_at = Some((at, shift + 1));
                continue;
            }
            bit_at = None;
            match field {
                Field::Octet(v) => dst.put_u8(*v),
                Field::Short(v) => dst.put_u16(*v),
                Field::Long(v) => dst.put_u32(*v),
                Field::LongLong(v) => dst.put_u64(*v),
                Field::ShortStr(v) => codec::encode_short_string(dst, v)?,
                Field::LongStr(v) => codec::encode_long_string(dst, v),
                Field::Table(v) => codec::encode_field_table(dst, v)?,
                Field::Timestamp(v) => dst.put_u64(*v),
                Field::Bit(_) => unreachable!("handled above"),
            }
        }
        Ok(())
    }

    /// Decodes a method payload (class id, method id, arguments)
    pub fn decode(src: &mut Buffer) -> Result<Self, DecodeError> {
        let class_id = src.get_u16()?;
        let method_id = src.get_u16()?;
        let spec = schema::lookup(class_id, method_id).ok_or({
            if schema::knows_class(class_id) {
                DecodeError::UnknownMethod {
                    class_id,
                    method_id,
                }
            } else {
                DecodeError::UnknownClass(class_id)
            }
        })?;

        let mut fields = Vec::with_capacity(spec.fields.len());
        // the octet currently being unpacked, and the next bit to take
        let mut bits: Option<(u8, u8)> = None;
        for kind in spec.fields {
            if let FieldKind::Bit = kind {
                let (octet, shift) = match bits {
                    Some((octet, shift)) if shift < 8 => (octet, shift),
                    _ => (src.get_u8()?, 0),
                };
                fields.push(Field::Bit(octet >> shift & 1 == 1));
                bits = Some((octet, shift + 1));
                continue;
            }
            bits = None;
            let field = match kind {
                FieldKind::Octet => Field::Octet(src.get_u8()?),
                FieldKind::Short => Field::Short(src.get_u16()?),
                FieldKind::Long => Field::Long(src.get_u32()?),
                FieldKind::LongLong => Field::LongLong(src.get_u64()?),
                FieldKind::ShortStr => Field::ShortStr(codec::decode_short_string(src)?),
                FieldKind::LongStr => Field::LongStr(codec::decode_long_string(src)?),
                FieldKind::Table => Field::Table(codec::decode_field_table(src)?),
                FieldKind::Timestamp => Field::Timestamp(src.get_u64()?),
                FieldKind::Bit => unreachable!("handled above"),
            };
            fields.push(field);
        }

        Ok(Self {
            class_id,
            method_id,
            fields,
        })
    }

    fn field(&self, index: usize) -> Result<&Field, ValueError> {
        self.fields.get(index).ok_or(ValueError::Index(index))
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> ValueError {
        ValueError::Kind {
            index,
            found: self.fields[index].kind_name(),
            expected,
        }
    }

    /// The octet argument at `index`
    pub fn octet(&self, index: usize) -> Result<u8, ValueError> {
        match self.field(index)? {
            Field::Octet(v) => Ok(*v),
            _ => Err(self.mismatch(index, "octet")),
        }
    }

    /// The short (u16) argument at `index`
    pub fn short(&self, index: usize) -> Result<u16, ValueError> {
        match self.field(index)? {
            Field::Short(v) => Ok(*v),
            _ => Err(self.mismatch(index, "short")),
        }
    }

    /// The long (u32) argument at `index`
    pub fn long(&self, index: usize) -> Result<u32, ValueError> {
        match self.field(index)? {
            Field::Long(v) => Ok(*v),
            _ => Err(self.mismatch(index, "long")),
        }
    }

    /// The long-long (u64) argument at `index`
    pub fn long_long(&self, index: usize) -> Result<u64, ValueError> {
        match self.field(index)? {
            Field::LongLong(v) => Ok(*v),
            _ => Err(self.mismatch(index, "long-long")),
        }
    }

    /// The bit argument at `index`
    pub fn bit(&self, index: usize) -> Result<bool, ValueError> {
        match self.field(index)? {
            Field::Bit(v) => Ok(*v),
            _ => Err(self.mismatch(index, "bit")),
        }
    }

    /// The short-string argument at `index`
    pub fn short_str(&self, index: usize) -> Result<&ShortString, ValueError> {
        match self.field(index)? {
            Field::ShortStr(v) => Ok(v),
            _ => Err(self.mismatch(index, "short-string")),
        }
    }

    /// The long-string argument at `index`
    pub fn long_str(&self, index: usize) -> Result<&[u8], ValueError> {
        match self.field(index)? {
            Field::LongStr(v) => Ok(v),
            _ => Err(self.mismatch(index, "long-string")),
        }
    }

    /// The field-table argument at `index`
    pub fn table(&self, index: usize) -> Result<&FieldTable, ValueError> {
        match self.field(index)? {
            Field::Table(v) => Ok(v),
            _ => Err(self.mismatch(index, "table")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{basic, class, queue, SCHEMA};
    use crate::FieldValue;

    fn sample_field(kind: FieldKind, seed: usize) -> Field {
        match kind {
            FieldKind::Octet => Field::Octet(seed as u8),
            FieldKind::Short => Field::Short(seed as u16 + 300),
            FieldKind::Long => Field::Long(seed as u32 + 70_000),
            FieldKind::LongLong => Field::LongLong(seed as u64 + 5_000_000_000),
            FieldKind::Bit => Field::Bit(seed % 2 == 1),
            FieldKind::ShortStr => Field::ShortStr(format!("s{seed}").into()),
            FieldKind::LongStr => Field::LongStr(vec![seed as u8; seed + 1]),
            FieldKind::Table => {
                let mut t = FieldTable::new();
                t.insert("k", FieldValue::LongInt(seed as i32));
                Field::Table(t)
            }
            FieldKind::Timestamp => Field::Timestamp(1_600_000_000 + seed as u64),
        }
    }

    #[test]
    fn every_schema_entry_round_trips() {
        for spec in SCHEMA {
            let fields = spec
                .fields
                .iter()
                .enumerate()
                .map(|(i, kind)| sample_field(*kind, i))
                .collect();
            let method = Method::new(spec.class_id, spec.method_id, fields);

            let mut dst = BytesMut::new();
            method.encode(&mut dst).unwrap();

            let mut src = Buffer::from(&dst[..]);
            let decoded = Method::decode(&mut src).unwrap();
            assert!(src.is_empty(), "{} left bytes behind", spec.name);
            assert_eq!(decoded, method, "{} did not round-trip", spec.name);
        }
    }

    #[test]
    fn consecutive_bits_share_one_octet() {
        // queue.declare carries five bits between its strings and its table
        let method = Method::new(
            class::QUEUE,
            queue::DECLARE,
            vec![
                Field::Short(0),
                Field::ShortStr("q".into()),
                Field::Bit(true),
                Field::Bit(false),
                Field::Bit(true),
                Field::Bit(false),
                Field::Bit(true),
                Field::Table(FieldTable::new()),
            ],
        );
        let mut dst = BytesMut::new();
        method.encode(&mut dst).unwrap();
        // class + method + ticket + "q" + bits + empty table
        assert_eq!(dst.len(), 2 + 2 + 2 + 2 + 1 + 4);
        assert_eq!(dst[8], 0b0001_0101);
    }

    #[test]
    fn unknown_method_is_distinct_from_unknown_class() {
        let mut src = Buffer::from(&[0x00, 0x3C, 0x00, 0xFF][..]);
        assert!(matches!(
            Method::decode(&mut src),
            Err(DecodeError::UnknownMethod {
                class_id: 60,
                method_id: 255
            })
        ));

        let mut src = Buffer::from(&[0x00, 0x1E, 0x00, 0x0A][..]);
        assert!(matches!(
            Method::decode(&mut src),
            Err(DecodeError::UnknownClass(30))
        ));
    }

    #[test]
    fn typed_accessors_check_kinds() {
        let method = Method::new(
            class::BASIC,
            basic::ACK,
            vec![Field::LongLong(7), Field::Bit(true)],
        );
        assert_eq!(method.long_long(0).unwrap(), 7);
        assert!(method.bit(1).unwrap());
        assert!(matches!(method.short(0), Err(ValueError::Kind { .. })));
        assert!(matches!(method.bit(2), Err(ValueError::Index(2))));
    }
}
