use anyhow::{bail, Context, Result};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde_json::Value;

use crate::schema::ValueType;

/// A single field value as it travels from a dataset into the database
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Real(f) => Some(*f),
            SqlValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to the expected column type. `None` means the value cannot represent it.
    ///
    /// NULL is accepted for every type.
    pub fn coerce(&self, expected: ValueType) -> Option<SqlValue> {
        use SqlValue::*;

        match (expected, self) {
            (_, Null) => Some(Null),
            (ValueType::Any, v) => Some(v.clone()),

            (ValueType::Integer, Integer(i)) => Some(Integer(*i)),
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
            (ValueType::Integer, Real(f))
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Some(Integer(*f as i64))
            }
            (ValueType::Integer, Text(s)) => s.trim().parse().ok().map(Integer),

            (ValueType::Real, Real(f)) => Some(Real(*f)),
            (ValueType::Real, Integer(i)) => Some(Real(*i as f64)),
            (ValueType::Real, Text(s)) => s.trim().parse().ok().map(Real),

            (ValueType::Text, Text(s)) => Some(Text(s.clone())),
            (ValueType::Text, Integer(i)) => Some(Text(i.to_string())),
            (ValueType::Text, Real(f)) => Some(Text(f.to_string())),

            (ValueType::Boolean, Integer(0)) => Some(Integer(0)),
            (ValueType::Boolean, Integer(1)) => Some(Integer(1)),
            (ValueType::Boolean, Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Integer(1)),
                "false" | "0" => Some(Integer(0)),
                _ => None,
            },

            (ValueType::Blob, Blob(b)) => Some(Blob(b.clone())),
            (ValueType::Blob, Text(s)) => Some(Blob(s.as_bytes().to_vec())),

            _ => None,
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        SqlValue::Real(f)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Integer(if b { 1 } else { 0 })
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// An ordered set of named fields presented by a dataset source
pub trait Record {
    fn field_count(&self) -> usize;

    fn field_name(&self, index: usize) -> &str;

    fn value(&self, index: usize) -> &SqlValue;

    /// Look a field up by name (exact match first, then ASCII case-insensitive)
    /// and convert it to `expected`. Returns `None` when the field is missing or
    /// its value cannot be represented as `expected`.
    fn get_value(&self, name: &str, expected: ValueType) -> Option<SqlValue> {
        let count = self.field_count();
        let index = (0..count)
            .find(|&i| self.field_name(i) == name)
            .or_else(|| (0..count).find(|&i| self.field_name(i).eq_ignore_ascii_case(name)))?;
        self.value(index).coerce(expected)
    }
}

/// A row ready for insertion, fields in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRecord {
    fields: Vec<(String, SqlValue)>,
}

impl DataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, replacing any earlier field with the same name
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn fields(&self) -> &[(String, SqlValue)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Record for DataRecord {
    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn field_name(&self, index: usize) -> &str {
        &self.fields[index].0
    }

    fn value(&self, index: usize) -> &SqlValue {
        &self.fields[index].1
    }
}

impl<N: Into<String>, V: Into<SqlValue>> FromIterator<(N, V)> for DataRecord {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut record = DataRecord::new();
        for (name, value) in iter {
            record.push(name, value);
        }
        record
    }
}

/// Parse one JSON object line into a record, keeping the object's key order
pub fn parse_record(line: &str) -> Result<DataRecord> {
    let json: Value = serde_json::from_str(line).context("Failed to parse JSON")?;

    let Value::Object(object) = json else {
        bail!("Expected a JSON object, got: {}", line.trim());
    };

    Ok(object
        .into_iter()
        .map(|(key, value)| (key, json_to_sql(value)))
        .collect())
}

fn json_to_sql(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => b.into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s),
        // Nested structures are stored as JSON text
        v @ (Value::Array(_) | Value::Object(_)) => SqlValue::Text(v.to_string()),
    }
}
