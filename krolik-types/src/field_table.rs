//! AMQP field tables and field values (RabbitMQ dialect)

use indexmap::IndexMap;

use crate::{LongString, ShortString};

/// A value in a field table, tagged on the wire with the RabbitMQ type
/// letters (`t`, `b`, `B`, `s`, `u`, `I`, `i`, `l`, `f`, `d`, `D`, `S`,
/// `A`, `T`, `F`, `V`, `x`).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `t`
    Boolean(bool),
    /// `b`
    ShortShortInt(i8),
    /// `B`
    ShortShortUInt(u8),
    /// `s` — RabbitMQ reads `s` as a signed 16-bit integer, not a short string
    ShortInt(i16),
    /// `u`
    ShortUInt(u16),
    /// `I`
    LongInt(i32),
    /// `i`
    LongUInt(u32),
    /// `l`
    LongLongInt(i64),
    /// `f`
    Float(f32),
    /// `d`
    Double(f64),
    /// `D` — scale then value
    Decimal {
        /// Number of decimal digits after the point
        scale: u8,
        /// Unscaled value
        value: u32,
    },
    /// `S`
    LongString(LongString),
    /// `A`
    Array(Vec<FieldValue>),
    /// `T` — POSIX seconds
    Timestamp(u64),
    /// `F`
    Table(FieldTable),
    /// `V`
    Void,
    /// `x`
    ByteArray(Vec<u8>),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::LongString(s.as_bytes().to_vec())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::LongString(s.into_bytes())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::LongInt(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::LongLongInt(v)
    }
}

impl From<FieldTable> for FieldValue {
    fn from(t: FieldTable) -> Self {
        FieldValue::Table(t)
    }
}

/// An ordered map of short-string keys to [`FieldValue`]s.
///
/// Iteration preserves insertion order, which keeps encode→decode→encode
/// byte-stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTable(IndexMap<ShortString, FieldValue>);

impl FieldTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<ShortString>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Looks up a value by key
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ShortString, &FieldValue)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for FieldTable
where
    K: Into<ShortString>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
